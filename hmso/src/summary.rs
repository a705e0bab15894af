//! Per-unit summarizer (§4.5): content hash, cyclomatic complexity,
//! behavior/memory-access flags, inline cost, extracted call sites.

use fcx_ir::{Function, InstKind, Module};
use std::fmt;

/// FNV-1a over the function name followed by its opcode stream, in
/// instruction order. Order-sensitive by construction since FNV-1a folds
/// each byte into the running hash sequentially.
pub fn content_hash(func: &Function) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    let mut feed = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= b as u64;
            hash = hash.wrapping_mul(PRIME);
        }
    };
    feed(func.name.as_bytes());
    for block in &func.blocks {
        for inst in &block.instructions {
            feed(&[opcode_tag(&inst.kind)]);
        }
    }
    hash
}

/// A dense discriminant for the hash feed; stability only matters within
/// one process run, not across versions, so this is not the on-disk format.
fn opcode_tag(kind: &InstKind) -> u8 {
    use InstKind::*;
    match kind {
        Const { .. } => 0,
        ConstBigInt { .. } => 1,
        Load { .. } => 2,
        Store { .. } => 3,
        Mov { .. } => 4,
        BinOp { .. } => 5,
        UnOp { .. } => 6,
        Cmp { .. } => 7,
        Alloc { .. } => 8,
        Dealloc { .. } => 9,
        Align { .. } => 10,
        Prefetch { .. } => 11,
        AtomicLoad { .. } => 12,
        AtomicStore { .. } => 13,
        AtomicSwap { .. } => 14,
        AtomicCas { .. } => 15,
        AtomicFetch { .. } => 16,
        Fence { .. } => 17,
        Syscall { .. } => 18,
        MmioRead { .. } => 19,
        MmioWrite { .. } => 20,
        PtrAdd { .. } => 21,
        PtrSub { .. } => 22,
        PtrDiff { .. } => 23,
        PtrCast { .. } => 24,
        PtrToInt { .. } => 25,
        IntToPtr { .. } => 26,
        FieldOffset { .. } => 27,
        Branch { .. } => 28,
        Jump { .. } => 29,
        Call { .. } => 30,
        Return { .. } => 31,
        Phi { .. } => 32,
        SimdBinOp { .. } => 33,
        InlineAsm(_) => 34,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorFlags {
    pub pure: bool,
    pub const_: bool,
    pub leaf: bool,
    pub norecurse: bool,
    pub noreturn: bool,
    pub inline_hint: bool,
    pub noinline: bool,
    pub hot: bool,
    pub cold: bool,
    pub has_atomics: bool,
    pub has_syscalls: bool,
    pub vectorizable: bool,
}

impl BehaviorFlags {
    const PURE: u32 = 1 << 0;
    const CONST: u32 = 1 << 1;
    const LEAF: u32 = 1 << 2;
    const NORECURSE: u32 = 1 << 3;
    const NORETURN: u32 = 1 << 4;
    const INLINE_HINT: u32 = 1 << 5;
    const NOINLINE: u32 = 1 << 6;
    const HOT: u32 = 1 << 7;
    const COLD: u32 = 1 << 8;
    const HAS_ATOMICS: u32 = 1 << 9;
    const HAS_SYSCALLS: u32 = 1 << 10;
    const VECTORIZABLE: u32 = 1 << 11;

    pub fn to_bits(self) -> u32 {
        let mut bits = 0u32;
        let set = [
            (self.pure, Self::PURE),
            (self.const_, Self::CONST),
            (self.leaf, Self::LEAF),
            (self.norecurse, Self::NORECURSE),
            (self.noreturn, Self::NORETURN),
            (self.inline_hint, Self::INLINE_HINT),
            (self.noinline, Self::NOINLINE),
            (self.hot, Self::HOT),
            (self.cold, Self::COLD),
            (self.has_atomics, Self::HAS_ATOMICS),
            (self.has_syscalls, Self::HAS_SYSCALLS),
            (self.vectorizable, Self::VECTORIZABLE),
        ];
        for (flag, bit) in set {
            if flag {
                bits |= bit;
            }
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            pure: bits & Self::PURE != 0,
            const_: bits & Self::CONST != 0,
            leaf: bits & Self::LEAF != 0,
            norecurse: bits & Self::NORECURSE != 0,
            noreturn: bits & Self::NORETURN != 0,
            inline_hint: bits & Self::INLINE_HINT != 0,
            noinline: bits & Self::NOINLINE != 0,
            hot: bits & Self::HOT != 0,
            cold: bits & Self::COLD != 0,
            has_atomics: bits & Self::HAS_ATOMICS != 0,
            has_syscalls: bits & Self::HAS_SYSCALLS != 0,
            vectorizable: bits & Self::VECTORIZABLE != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryAccessFlags {
    pub read: bool,
    pub write: bool,
    pub alloc: bool,
    pub free: bool,
    pub argmem: bool,
    pub global: bool,
}

impl MemoryAccessFlags {
    const READ: u32 = 1 << 0;
    const WRITE: u32 = 1 << 1;
    const ALLOC: u32 = 1 << 2;
    const FREE: u32 = 1 << 3;
    const ARGMEM: u32 = 1 << 4;
    const GLOBAL: u32 = 1 << 5;

    pub fn to_bits(self) -> u32 {
        let mut bits = 0u32;
        for (flag, bit) in [
            (self.read, Self::READ),
            (self.write, Self::WRITE),
            (self.alloc, Self::ALLOC),
            (self.free, Self::FREE),
            (self.argmem, Self::ARGMEM),
            (self.global, Self::GLOBAL),
        ] {
            if flag {
                bits |= bit;
            }
        }
        bits
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            read: bits & Self::READ != 0,
            write: bits & Self::WRITE != 0,
            alloc: bits & Self::ALLOC != 0,
            free: bits & Self::FREE != 0,
            argmem: bits & Self::ARGMEM != 0,
            global: bits & Self::GLOBAL != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub callee_name: String,
    pub call_count: u32,
    pub argument_count: u32,
    pub indirect: bool,
    pub tail: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSummary {
    pub name: String,
    pub content_hash: u64,
    pub instruction_count: u32,
    pub basic_block_count: u32,
    pub cyclomatic_complexity: u32,
    pub loop_depth_max: u32,
    pub behavior: BehaviorFlags,
    pub memory_access: MemoryAccessFlags,
    pub call_sites: Vec<CallSite>,
    pub inline_cost: u32,
}

impl fmt::Display for FunctionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} insns, {} blocks, cyclomatic {}, cost {}",
            self.name, self.instruction_count, self.basic_block_count, self.cyclomatic_complexity, self.inline_cost
        )?;
        if self.behavior.pure {
            write!(f, ", pure")?;
        }
        if self.behavior.leaf {
            write!(f, ", leaf")?;
        }
        if self.behavior.hot {
            write!(f, ", hot")?;
        }
        write!(f, ", {} call sites]", self.call_sites.len())
    }
}

fn opcode_inline_cost(kind: &InstKind) -> u32 {
    use InstKind::*;
    match kind {
        Const { .. } | ConstBigInt { .. } => 1,
        BinOp { .. } | UnOp { .. } => 2,
        // MUL is charged separately from the rest of the add-class below.
        Load { .. } | Store { .. } | AtomicLoad { .. } | AtomicStore { .. } => 5,
        Call { .. } => 20,
        Syscall { .. } => 50,
        _ => 1,
    }
}

/// MUL is weighted 3 and DIV/MOD 10, both distinct from the generic
/// add-class BinOp weight of 2 (§4.5).
fn binop_inline_cost(op: fcx_ir::BinOpKind) -> u32 {
    use fcx_ir::BinOpKind::*;
    match op {
        Mul => 3,
        Div | Mod => 10,
        Add | Sub | And | Or | Xor | Shl | ShrLogical | ShrArith | Rol | Ror => 2,
    }
}

/// Number of (nodes, edges) in a function's control-flow graph, counting
/// implicit fallthrough to the next block in sequence where a block has
/// no explicit terminator (§3's structural-fallthrough rule).
fn cfg_node_edge_counts(func: &Function) -> (usize, usize) {
    let nodes = func.blocks.len();
    let mut edges = 0usize;
    for (i, block) in func.blocks.iter().enumerate() {
        match block.instructions.last().map(|inst| &inst.kind) {
            Some(InstKind::Branch { .. }) | Some(InstKind::Jump { .. }) => {
                edges += block.instructions.last().unwrap().referenced_labels().len();
            }
            Some(InstKind::Return { .. }) => {}
            _ => {
                if i + 1 < func.blocks.len() {
                    edges += 1;
                }
            }
        }
    }
    (nodes, edges)
}

pub fn summarize_function(func: &Function) -> FunctionSummary {
    let mut instruction_count = 0u32;
    let mut inline_cost = 0u32;
    let mut has_store = false;
    let mut has_call = false;
    let mut has_syscall = false;
    let mut has_return = false;
    let mut has_load = false;
    let mut has_alloc = false;
    let mut has_free = false;
    let mut has_global = false;
    let mut has_argmem = false;
    let mut has_atomics = false;
    let mut call_sites: Vec<CallSite> = Vec::new();
    let mut self_recursive = false;

    for block in &func.blocks {
        for inst in &block.instructions {
            instruction_count += 1;
            inline_cost += match &inst.kind {
                InstKind::BinOp { op, .. } => binop_inline_cost(*op),
                other => opcode_inline_cost(other),
            };
            match &inst.kind {
                InstKind::Store { .. } => has_store = true,
                InstKind::Load { .. } => has_load = true,
                InstKind::Call { name, args, indirect, tail, .. } => {
                    has_call = true;
                    if !args.is_empty() {
                        has_argmem = true;
                    }
                    if name == &func.name {
                        self_recursive = true;
                    }
                    match call_sites.iter_mut().find(|c| &c.callee_name == name) {
                        Some(existing) => existing.call_count += 1,
                        None => call_sites.push(CallSite {
                            callee_name: name.clone(),
                            call_count: 1,
                            argument_count: args.len() as u32,
                            indirect: *indirect,
                            tail: *tail,
                        }),
                    }
                }
                InstKind::Syscall { .. } => has_syscall = true,
                InstKind::Return { .. } => has_return = true,
                InstKind::Alloc { .. } => has_alloc = true,
                InstKind::Dealloc { .. } => has_free = true,
                InstKind::MmioRead { .. } | InstKind::MmioWrite { .. } => has_global = true,
                InstKind::AtomicLoad { .. }
                | InstKind::AtomicStore { .. }
                | InstKind::AtomicSwap { .. }
                | InstKind::AtomicCas { .. }
                | InstKind::AtomicFetch { .. }
                | InstKind::Fence { .. } => has_atomics = true,
                InstKind::SimdBinOp { .. } => {}
                _ => {}
            }
        }
    }

    let (nodes, edges) = cfg_node_edge_counts(func);
    let cyclomatic_complexity = (edges as i64 - nodes as i64 + 2).max(1) as u32;

    let pure = !has_store && !has_call && !has_syscall;
    let behavior = BehaviorFlags {
        pure,
        const_: pure && !has_load,
        leaf: !has_call,
        norecurse: !self_recursive,
        noreturn: !has_return,
        inline_hint: instruction_count < 20,
        noinline: instruction_count > 200,
        hot: false,
        cold: false,
        has_atomics,
        has_syscalls: has_syscall,
        vectorizable: false,
    };
    let memory_access = MemoryAccessFlags {
        read: has_load,
        write: has_store,
        alloc: has_alloc,
        free: has_free,
        argmem: has_argmem,
        global: has_global,
    };

    FunctionSummary {
        name: func.name.clone(),
        content_hash: content_hash(func),
        instruction_count,
        basic_block_count: func.blocks.len() as u32,
        cyclomatic_complexity,
        loop_depth_max: 0,
        behavior,
        memory_access,
        call_sites,
        inline_cost,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleSummary {
    pub functions: Vec<FunctionSummary>,
}

pub fn summarize_module(module: &Module) -> ModuleSummary {
    ModuleSummary { functions: module.functions.iter().map(summarize_function).collect() }
}
