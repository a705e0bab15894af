//! Dead-code elimination (§4.2): a whole-function mark-and-sweep over the
//! def/use graph. Side-effecting instructions are always live; everything
//! else survives only if some live instruction uses its result.

use fcx_ir::{Function, Instruction};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct DeadCodeEliminator;

impl DeadCodeEliminator {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, func: &mut Function) -> bool {
        let def_index = Self::build_def_index(func);
        let live = Self::mark(func, &def_index);

        let mut changed = false;
        for block in &mut func.blocks {
            let before = block.instructions.len();
            block.instructions.retain(|inst| {
                if inst.has_side_effect() {
                    return true;
                }
                match inst.defined_vreg() {
                    Some(dest) => live.contains(&dest.id),
                    None => true,
                }
            });
            if block.instructions.len() != before {
                changed = true;
            }
        }
        changed
    }

    fn build_def_index(func: &Function) -> FxHashMap<u32, Instruction> {
        let mut index = FxHashMap::default();
        for block in &func.blocks {
            for inst in &block.instructions {
                if let Some(dest) = inst.defined_vreg() {
                    index.insert(dest.id, inst.clone());
                }
            }
        }
        index
    }

    fn mark(func: &Function, def_index: &FxHashMap<u32, Instruction>) -> FxHashSet<u32> {
        let mut live: FxHashSet<u32> = FxHashSet::default();
        let mut worklist: Vec<u32> = Vec::new();

        for block in &func.blocks {
            for inst in &block.instructions {
                if inst.has_side_effect() {
                    worklist.extend(inst.used_vregs().into_iter().map(|v| v.id));
                }
            }
        }

        while let Some(id) = worklist.pop() {
            if !live.insert(id) {
                continue;
            }
            if let Some(def) = def_index.get(&id) {
                worklist.extend(def.used_vregs().into_iter().map(|v| v.id));
            }
        }
        live
    }
}

impl Default for DeadCodeEliminator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcx_ir::{BinOpKind, FunctionBuilder, InstKind, MemRef, NumType};

    #[test]
    fn unused_constant_is_removed() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let x = b.const_int(NumType::I64, 1).unwrap();
            let _unused = b.const_int(NumType::I64, 99).unwrap();
            b.ret(Some(x)).unwrap();
        }
        let before = f.blocks[0].instructions.len();
        DeadCodeEliminator::new().run(&mut f);
        assert_eq!(f.blocks[0].instructions.len(), before - 1);
    }

    #[test]
    fn store_is_never_removed_even_if_result_unused() {
        let mut f = Function::new("f", vec![], NumType::Void);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let base = b.const_int(NumType::TypedPtr, 0x1000).unwrap();
            let value = b.const_int(NumType::I64, 7).unwrap();
            b.store(MemRef { base, offset: 0 }, value).unwrap();
            b.ret(None).unwrap();
        }
        DeadCodeEliminator::new().run(&mut f);
        assert!(f.blocks[0]
            .instructions
            .iter()
            .any(|i| matches!(i.kind, InstKind::Store { .. })));
    }

    #[test]
    fn transitive_dead_chain_is_removed() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let a = b.const_int(NumType::I64, 1).unwrap();
            let c = b.const_int(NumType::I64, 2).unwrap();
            let _dead = b.binop(BinOpKind::Add, a, c).unwrap();
            let live = b.const_int(NumType::I64, 5).unwrap();
            b.ret(Some(live)).unwrap();
        }
        let before = f.blocks[0].instructions.len();
        DeadCodeEliminator::new().run(&mut f);
        // a, c, and the dead add are all reaped; only the live const and
        // return instruction remain.
        assert_eq!(f.blocks[0].instructions.len(), before - 3);
    }
}
