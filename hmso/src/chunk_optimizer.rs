//! Chunk optimizer (§4.8): scores and applies inlining within a chunk,
//! then re-runs the intraprocedural optimizer on every touched function.

use crate::index::GlobalIndex;
use crate::partitioner::OptimizationChunk;
use crate::summary::FunctionSummary;
use fcx_ir::{Function, InstKind, VReg};
use fcx_optimizer::Optimizer;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Callees larger than this are never inlined regardless of benefit (§4.8).
const MAX_INLINE_CALLEE_INSTRUCTIONS: u32 = 200;
/// Upper bound on inlines applied per chunk per pass.
const MAX_INLINES_PER_CHUNK: usize = 32;

#[derive(Debug, Clone)]
pub struct InlineOpportunity {
    pub caller: String,
    pub callee: String,
    pub benefit: i64,
}

/// `+10` per call, `+20` pure, `+30` const, `+15` leaf, a size bonus that
/// favors tiny callees, doubled when the caller is hot, minus a
/// per-call-site cost proportional to how much code gets duplicated
/// (§4.8).
fn benefit_score(call_count: u32, callee: &FunctionSummary, caller_hot: bool) -> i64 {
    let mut score = 10 * call_count as i64;
    if callee.behavior.pure {
        score += 20;
    }
    if callee.behavior.const_ {
        score += 30;
    }
    if callee.behavior.leaf {
        score += 15;
    }
    if callee.instruction_count < 20 {
        score += 50;
    } else if callee.instruction_count < 50 {
        score += 20;
    }
    score -= (call_count as i64 * callee.instruction_count as i64) / 10;
    if caller_hot {
        score *= 2;
    }
    score
}

pub fn find_inline_opportunities(chunk: &OptimizationChunk, index: &GlobalIndex) -> Vec<InlineOpportunity> {
    let mut opportunities = Vec::new();
    for &node_index in &chunk.function_nodes {
        let caller_node = &index.nodes[node_index];
        let caller_summary = &index.summaries[node_index];
        for call_site in &caller_summary.call_sites {
            if call_site.callee_name == caller_node.name {
                continue; // self-recursive callees are never inlined
            }
            let Some(callee_summary) = index.summary_by_name(&call_site.callee_name) else {
                continue;
            };
            if callee_summary.instruction_count > MAX_INLINE_CALLEE_INSTRUCTIONS {
                continue;
            }
            let benefit = benefit_score(call_site.call_count, callee_summary, chunk.hotness >= 0.5);
            opportunities.push(InlineOpportunity {
                caller: caller_node.name.clone(),
                callee: call_site.callee_name.clone(),
                benefit,
            });
        }
    }
    opportunities.sort_by(|a, b| b.benefit.cmp(&a.benefit));
    opportunities.truncate(MAX_INLINES_PER_CHUNK);
    opportunities
}

fn max_vreg_id(func: &Function) -> u32 {
    let mut max_id = 0u32;
    for p in &func.params {
        max_id = max_id.max(p.id);
    }
    for block in &func.blocks {
        for inst in &block.instructions {
            if let Some(d) = inst.defined_vreg() {
                max_id = max_id.max(d.id);
            }
            for u in inst.used_vregs() {
                max_id = max_id.max(u.id);
            }
        }
    }
    max_id
}

fn remap_vreg(v: VReg, map: &FxHashMap<u32, VReg>) -> VReg {
    map.get(&v.id).copied().unwrap_or(v)
}

/// Rewrites every vreg field of `kind` through `map`, used when splicing a
/// callee's instructions into a caller with a fresh id range.
fn remap_inst_kind(kind: &InstKind, map: &FxHashMap<u32, VReg>) -> InstKind {
    use InstKind::*;
    let r = |v: VReg| remap_vreg(v, map);
    let rm = |m: fcx_ir::MemRef| fcx_ir::MemRef { base: r(m.base), offset: m.offset };
    match kind {
        Const { dest, value } => Const { dest: r(*dest), value: *value },
        ConstBigInt { dest, value } => ConstBigInt { dest: r(*dest), value: value.clone() },
        Load { dest, addr } => Load { dest: r(*dest), addr: rm(*addr) },
        Store { addr, value } => Store { addr: rm(*addr), value: r(*value) },
        Mov { dest, src } => Mov { dest: r(*dest), src: r(*src) },
        BinOp { dest, op, lhs, rhs } => BinOp { dest: r(*dest), op: *op, lhs: r(*lhs), rhs: r(*rhs) },
        UnOp { dest, op, src } => UnOp { dest: r(*dest), op: *op, src: r(*src) },
        Cmp { dest, op, signed, lhs, rhs } => {
            Cmp { dest: r(*dest), op: *op, signed: *signed, lhs: r(*lhs), rhs: r(*rhs) }
        }
        Alloc { dest, kind, size, align, scope_or_type } => {
            Alloc { dest: r(*dest), kind: *kind, size: r(*size), align: *align, scope_or_type: *scope_or_type }
        }
        Dealloc { kind, ptr, scope_or_type } => {
            Dealloc { kind: *kind, ptr: ptr.map(r), scope_or_type: *scope_or_type }
        }
        Align { ptr, align } => Align { ptr: r(*ptr), align: *align },
        Prefetch { addr, write } => Prefetch { addr: r(*addr), write: *write },
        AtomicLoad { dest, addr } => AtomicLoad { dest: r(*dest), addr: rm(*addr) },
        AtomicStore { addr, value } => AtomicStore { addr: rm(*addr), value: r(*value) },
        AtomicSwap { dest, addr, value } => AtomicSwap { dest: r(*dest), addr: rm(*addr), value: r(*value) },
        AtomicCas { dest, addr, expected, new } => {
            AtomicCas { dest: r(*dest), addr: rm(*addr), expected: r(*expected), new: r(*new) }
        }
        AtomicFetch { dest, op, addr, value } => {
            AtomicFetch { dest: r(*dest), op: *op, addr: rm(*addr), value: r(*value) }
        }
        Fence { kind } => Fence { kind: *kind },
        Syscall { dest, number, args } => {
            Syscall { dest: dest.map(r), number: r(*number), args: args.iter().map(|&a| r(a)).collect() }
        }
        MmioRead { dest, address } => MmioRead { dest: r(*dest), address: *address },
        MmioWrite { address, value } => MmioWrite { address: *address, value: r(*value) },
        PtrAdd { dest, ptr, offset } => PtrAdd { dest: r(*dest), ptr: r(*ptr), offset: r(*offset) },
        PtrSub { dest, ptr, offset } => PtrSub { dest: r(*dest), ptr: r(*ptr), offset: r(*offset) },
        PtrDiff { dest, lhs, rhs } => PtrDiff { dest: r(*dest), lhs: r(*lhs), rhs: r(*rhs) },
        PtrCast { dest, src } => PtrCast { dest: r(*dest), src: r(*src) },
        PtrToInt { dest, src } => PtrToInt { dest: r(*dest), src: r(*src) },
        IntToPtr { dest, src } => IntToPtr { dest: r(*dest), src: r(*src) },
        FieldOffset { dest, base, offset } => FieldOffset { dest: r(*dest), base: r(*base), offset: *offset },
        Branch { cond, true_block, false_block } => {
            Branch { cond: r(*cond), true_block: *true_block, false_block: *false_block }
        }
        Jump { target } => Jump { target: *target },
        Call { dest, name, args, tail, indirect } => Call {
            dest: dest.map(r),
            name: name.clone(),
            args: args.iter().map(|&a| r(a)).collect(),
            tail: *tail,
            indirect: *indirect,
        },
        Return { value } => Return { value: value.map(r) },
        Phi { dest, incoming } => {
            Phi { dest: r(*dest), incoming: incoming.iter().map(|&(b, v)| (b, r(v))).collect() }
        }
        SimdBinOp { dest, op, lhs, rhs } => SimdBinOp { dest: r(*dest), op: *op, lhs: r(*lhs), rhs: r(*rhs) },
        InlineAsm(payload) => InlineAsm(fcx_ir::InlineAsmPayload {
            template: payload.template.clone(),
            inputs: payload.inputs.iter().map(|(c, v)| (c.clone(), r(*v))).collect(),
            outputs: payload.outputs.iter().map(|(c, v)| (c.clone(), r(*v))).collect(),
            clobbers: payload.clobbers.clone(),
            volatile: payload.volatile,
        }),
    }
}

/// Splices a single-block, single-return callee directly into the
/// caller's block in place of the call, renumbering every callee vreg
/// above the caller's current maximum. Multi-block callees are left as
/// ordinary calls: this pass only takes the cases where no CFG surgery
/// (block splitting, label rewiring) is needed to stay correct.
fn try_inline_call_site(caller: &mut Function, callee: &Function) -> bool {
    if callee.blocks.len() != 1 {
        return false;
    }
    let callee_block = &callee.blocks[0];

    let call_site = caller.blocks.iter().enumerate().find_map(|(bi, block)| {
        block.instructions.iter().enumerate().find_map(|(ii, inst)| match &inst.kind {
            InstKind::Call { name, .. } if name == &callee.name => Some((bi, ii)),
            _ => None,
        })
    });
    let Some((block_idx, inst_idx)) = call_site else {
        return false;
    };

    let (call_dest, call_args) = match &caller.blocks[block_idx].instructions[inst_idx].kind {
        InstKind::Call { dest, args, .. } => (*dest, args.clone()),
        _ => unreachable!(),
    };
    if call_args.len() != callee.params.len() {
        return false;
    }

    let mut next_fresh = max_vreg_id(caller) + 1;
    let mut map: FxHashMap<u32, VReg> = FxHashMap::default();
    for (param, arg) in callee.params.iter().zip(call_args.iter()) {
        map.insert(param.id, *arg);
    }
    for inst in &callee_block.instructions {
        if let Some(d) = inst.defined_vreg() {
            map.entry(d.id).or_insert_with(|| {
                let fresh = VReg::new(next_fresh, d.ty);
                next_fresh += 1;
                fresh
            });
        }
    }

    let mut spliced = Vec::new();
    let mut return_value: Option<VReg> = None;
    for inst in &callee_block.instructions {
        match &inst.kind {
            InstKind::Return { value } => {
                return_value = value.map(|v| remap_vreg(v, &map));
            }
            other => spliced.push(fcx_ir::Instruction::new(remap_inst_kind(other, &map), inst.line)),
        }
    }
    if let (Some(dest), Some(value)) = (call_dest, return_value) {
        spliced.push(fcx_ir::Instruction::new(InstKind::Mov { dest, src: value }, 0));
    }

    caller.blocks[block_idx].instructions.splice(inst_idx..=inst_idx, spliced);
    true
}

#[derive(Debug, Clone, Default)]
pub struct ChunkOptimizationResult {
    pub chunk_id: usize,
    pub inlines_applied: usize,
    pub functions_reoptimized: usize,
}

/// Applies the chunk's inline opportunities, then re-runs
/// `fcx_optimizer::Optimizer` on every function in the chunk.
///
/// The expensive-opts slot is plumbed through but currently a no-op: it's
/// reserved for superoptimization/polyhedral passes that don't exist yet.
pub fn optimize_chunk(
    chunk: &OptimizationChunk,
    index: &GlobalIndex,
    functions: &mut FxHashMap<String, Function>,
) -> ChunkOptimizationResult {
    let opportunities = find_inline_opportunities(chunk, index);
    let mut inlines_applied = 0usize;

    for opportunity in &opportunities {
        let Some(callee) = functions.get(&opportunity.callee).cloned() else {
            continue;
        };
        if let Some(caller) = functions.get_mut(&opportunity.caller) {
            if try_inline_call_site(caller, &callee) {
                inlines_applied += 1;
            }
        }
    }

    let mut functions_reoptimized = 0usize;
    for &node_index in &chunk.function_nodes {
        let name = &index.nodes[node_index].name;
        if let Some(func) = functions.get_mut(name) {
            Optimizer::new(chunk.level).optimize_until_fixpoint(func);
            functions_reoptimized += 1;
        }
    }

    if chunk.enable_expensive_opts && chunk.hotness >= 0.5 {
        debug!(chunk = chunk.id, "expensive optimization slot reserved, no passes registered yet");
    }

    ChunkOptimizationResult { chunk_id: chunk.id, inlines_applied, functions_reoptimized }
}

/// Processes every chunk in parallel, hottest first, over disjoint
/// function subsets (the partitioner guarantees chunks don't share
/// functions, so each rayon task owns its slice outright).
pub fn optimize_chunks_parallel(
    mut chunks: Vec<OptimizationChunk>,
    index: &GlobalIndex,
    functions: &mut FxHashMap<String, Function>,
) -> Vec<ChunkOptimizationResult> {
    chunks.sort_by(|a, b| b.hotness.partial_cmp(&a.hotness).unwrap_or(std::cmp::Ordering::Equal));

    let buckets: Vec<FxHashMap<String, Function>> = chunks
        .iter()
        .map(|chunk| {
            let mut bucket = FxHashMap::default();
            for &node_index in &chunk.function_nodes {
                let name = &index.nodes[node_index].name;
                if let Some(f) = functions.remove(name) {
                    bucket.insert(name.clone(), f);
                }
            }
            bucket
        })
        .collect();

    let jobs: Vec<(OptimizationChunk, FxHashMap<String, Function>)> = chunks.into_iter().zip(buckets).collect();
    let processed: Vec<(ChunkOptimizationResult, FxHashMap<String, Function>)> = jobs
        .into_par_iter()
        .map(|(chunk, mut bucket)| {
            let result = optimize_chunk(&chunk, index, &mut bucket);
            (result, bucket)
        })
        .collect();

    let mut results = Vec::with_capacity(processed.len());
    for (result, bucket) in processed {
        functions.extend(bucket);
        results.push(result);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::ChunkSizeBounds;
    use fcx_ir::{BinOpKind, FunctionBuilder, NumType};

    fn callee_double() -> Function {
        let x = VReg::new(1, NumType::I64);
        let mut f = Function::new("double", vec![x], NumType::I64);
        let mut b = FunctionBuilder::new(&mut f);
        let two = b.const_int(NumType::I64, 2).unwrap();
        let result = b.binop(BinOpKind::Mul, x, two).unwrap();
        b.ret(Some(result)).unwrap();
        drop(b);
        f
    }

    fn caller_quadruple() -> Function {
        let x = VReg::new(1, NumType::I64);
        let mut f = Function::new("quadruple", vec![x], NumType::I64);
        let mut b = FunctionBuilder::new(&mut f);
        let once = b.call(Some(NumType::I64), "double", smallvec::smallvec![x], false, false).unwrap();
        b.ret(once).unwrap();
        drop(b);
        f
    }

    #[test]
    fn inlining_a_single_block_callee_removes_the_call_instruction() {
        let callee = callee_double();
        let mut caller = caller_quadruple();
        assert!(try_inline_call_site(&mut caller, &callee));
        let has_call = caller.blocks[0]
            .instructions
            .iter()
            .any(|i| matches!(i.kind, InstKind::Call { .. }));
        assert!(!has_call);
    }

    #[test]
    fn self_recursive_callees_are_never_proposed() {
        let chunk = OptimizationChunk {
            id: 0,
            function_nodes: vec![0],
            total_instruction_count: 1,
            hotness: 0.0,
            level: fcx_optimizer::OptimizationLevel::O2,
            enable_expensive_opts: false,
            optimized: false,
        };
        let mut index = GlobalIndex::default();
        index.nodes.push(crate::index::CallGraphNode {
            unit_index: 0,
            function_index: 0,
            name: "f".to_string(),
            scc_id: 0,
            reachable: true,
        });
        index.summaries.push(FunctionSummary {
            name: "f".to_string(),
            content_hash: 0,
            instruction_count: 5,
            basic_block_count: 1,
            cyclomatic_complexity: 1,
            loop_depth_max: 0,
            behavior: Default::default(),
            memory_access: Default::default(),
            call_sites: vec![crate::summary::CallSite {
                callee_name: "f".to_string(),
                call_count: 1,
                argument_count: 0,
                indirect: false,
                tail: false,
            }],
            inline_cost: 1,
        });
        let opportunities = find_inline_opportunities(&chunk, &index);
        assert!(opportunities.is_empty());
    }

    #[test]
    fn chunk_size_bounds_cover_every_level() {
        assert_eq!(ChunkSizeBounds::for_level(fcx_optimizer::OptimizationLevel::OMax).min_chunk_size, 5);
    }
}
