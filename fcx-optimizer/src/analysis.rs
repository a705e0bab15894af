//! Read-only analyses (§4.2): pointer, memory-safety and leak tracking.
//! None of these ever fail the compile; all they produce is diagnostics.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use fcx_ir::{AllocKind, Function, InstKind, NumType};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerTag {
    NonPtr,
    TypedPtr,
    RawPtr,
    BytePtr,
}

impl PointerTag {
    fn of(ty: NumType) -> Self {
        match ty {
            NumType::TypedPtr => PointerTag::TypedPtr,
            NumType::RawPtr => PointerTag::RawPtr,
            NumType::BytePtr => PointerTag::BytePtr,
            _ => PointerTag::NonPtr,
        }
    }
}

/// Tags every VReg by pointer flavor (propagated through MOV/PTR_CAST)
/// and tracks which ones are provably null, warning on any load or
/// store that dereferences a known-null pointer.
pub struct PointerAnalysis;

impl PointerAnalysis {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, func: &Function, diagnostics: &mut Diagnostics) {
        let mut null: FxHashSet<u32> = FxHashSet::default();

        for block in &func.blocks {
            for inst in &block.instructions {
                match &inst.kind {
                    InstKind::Const { dest, value } => {
                        if PointerTag::of(dest.ty) != PointerTag::NonPtr && *value == 0 {
                            null.insert(dest.id);
                        }
                    }
                    InstKind::IntToPtr { dest, src } => {
                        if null.contains(&src.id) {
                            null.insert(dest.id);
                        }
                    }
                    InstKind::Mov { dest, src } => {
                        if null.contains(&src.id) {
                            null.insert(dest.id);
                        }
                    }
                    InstKind::PtrCast { dest, src } => {
                        if null.contains(&src.id) {
                            null.insert(dest.id);
                        }
                    }
                    InstKind::Load { addr, .. } => {
                        if null.contains(&addr.base.id) {
                            diagnostics.push(
                                DiagnosticKind::NullDereference,
                                &func.name,
                                inst.line,
                                format!("load through vreg {} known to be null", addr.base.id),
                            );
                        }
                    }
                    InstKind::Store { addr, .. } => {
                        if null.contains(&addr.base.id) {
                            diagnostics.push(
                                DiagnosticKind::NullDereference,
                                &func.name,
                                inst.line,
                                format!("store through vreg {} known to be null", addr.base.id),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

impl Default for PointerAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllocState {
    Allocated,
    Freed,
}

/// Tracks allocated/freed state per VReg across a function, warning on
/// double-free, use-after-free and freeing a pointer never allocated.
pub struct MemorySafetyAnalysis;

impl MemorySafetyAnalysis {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, func: &Function, diagnostics: &mut Diagnostics) {
        let mut state: FxHashMap<u32, AllocState> = FxHashMap::default();

        for block in &func.blocks {
            for inst in &block.instructions {
                if let InstKind::Alloc { dest, .. } = &inst.kind {
                    state.insert(dest.id, AllocState::Allocated);
                    continue;
                }
                if let InstKind::Dealloc { ptr: Some(ptr), .. } = &inst.kind {
                    match state.get(&ptr.id) {
                        None => diagnostics.push(
                            DiagnosticKind::FreeOfNeverAllocated,
                            &func.name,
                            inst.line,
                            format!("free of vreg {} that was never allocated here", ptr.id),
                        ),
                        Some(AllocState::Freed) => diagnostics.push(
                            DiagnosticKind::DoubleFree,
                            &func.name,
                            inst.line,
                            format!("double free of vreg {}", ptr.id),
                        ),
                        Some(AllocState::Allocated) => {}
                    }
                    state.insert(ptr.id, AllocState::Freed);
                    continue;
                }

                for used in inst.used_vregs() {
                    if state.get(&used.id) == Some(&AllocState::Freed) {
                        diagnostics.push(
                            DiagnosticKind::UseAfterFree,
                            &func.name,
                            inst.line,
                            format!("use of vreg {} after it was freed", used.id),
                        );
                    }
                }
            }
        }
    }
}

impl Default for MemorySafetyAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

/// Flags heap allocations that are neither freed nor escaped (returned or
/// passed as a call argument) by function exit.
pub struct LeakAnalysis;

impl LeakAnalysis {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, func: &Function, diagnostics: &mut Diagnostics) {
        let mut allocated: FxHashMap<u32, u32> = FxHashMap::default(); // id -> defining line
        let mut escaped_or_freed: FxHashSet<u32> = FxHashSet::default();

        for block in &func.blocks {
            for inst in &block.instructions {
                match &inst.kind {
                    InstKind::Alloc { dest, kind: AllocKind::Heap, .. } => {
                        allocated.insert(dest.id, inst.line);
                    }
                    InstKind::Dealloc { ptr: Some(ptr), .. } => {
                        escaped_or_freed.insert(ptr.id);
                    }
                    InstKind::Return { value: Some(v) } => {
                        escaped_or_freed.insert(v.id);
                    }
                    InstKind::Call { args, .. } => {
                        escaped_or_freed.extend(args.iter().map(|a| a.id));
                    }
                    _ => {}
                }
            }
        }

        let mut leaked: Vec<(u32, u32)> = allocated
            .into_iter()
            .filter(|(id, _)| !escaped_or_freed.contains(id))
            .collect();
        leaked.sort_by_key(|(id, _)| *id);

        for (id, line) in leaked {
            diagnostics.push(
                DiagnosticKind::MemoryLeak,
                &func.name,
                line,
                format!("vreg {id} allocated on the heap but never freed or escaped"),
            );
        }
    }
}

impl Default for LeakAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcx_ir::{AllocKind, DeallocKind, FunctionBuilder, MemRef};

    #[test]
    fn null_store_is_flagged() {
        let mut f = Function::new("f", vec![], NumType::Void);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let null_ptr = b.const_int(NumType::TypedPtr, 0).unwrap();
            let value = b.const_int(NumType::I64, 1).unwrap();
            b.store(MemRef { base: null_ptr, offset: 0 }, value).unwrap();
            b.ret(None).unwrap();
        }
        let mut diags = Diagnostics::default();
        PointerAnalysis::new().run(&f, &mut diags);
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::NullDereference));
    }

    #[test]
    fn double_free_is_flagged() {
        let mut f = Function::new("f", vec![], NumType::Void);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let size = b.const_int(NumType::I64, 8).unwrap();
            let p = b.alloc(NumType::TypedPtr, AllocKind::Heap, size, 8, None).unwrap();
            b.dealloc(DeallocKind::Heap, Some(p), None).unwrap();
            b.dealloc(DeallocKind::Heap, Some(p), None).unwrap();
            b.ret(None).unwrap();
        }
        let mut diags = Diagnostics::default();
        MemorySafetyAnalysis::new().run(&f, &mut diags);
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::DoubleFree));
    }

    #[test]
    fn leaked_allocation_is_flagged() {
        let mut f = Function::new("f", vec![], NumType::Void);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let size = b.const_int(NumType::I64, 8).unwrap();
            let _p = b.alloc(NumType::TypedPtr, AllocKind::Heap, size, 8, None).unwrap();
            b.ret(None).unwrap();
        }
        let mut diags = Diagnostics::default();
        LeakAnalysis::new().run(&f, &mut diags);
        assert!(diags.iter().any(|d| d.kind == DiagnosticKind::MemoryLeak));
    }

    #[test]
    fn freed_allocation_is_not_leaked() {
        let mut f = Function::new("f", vec![], NumType::Void);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let size = b.const_int(NumType::I64, 8).unwrap();
            let p = b.alloc(NumType::TypedPtr, AllocKind::Heap, size, 8, None).unwrap();
            b.dealloc(DeallocKind::Heap, Some(p), None).unwrap();
            b.ret(None).unwrap();
        }
        let mut diags = Diagnostics::default();
        LeakAnalysis::new().run(&f, &mut diags);
        assert!(!diags.iter().any(|d| d.kind == DiagnosticKind::MemoryLeak));
    }
}
