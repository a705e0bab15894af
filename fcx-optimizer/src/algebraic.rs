//! Algebraic simplification (§4.2): identity, annihilator and self-op
//! rewrites, plus a linear back-scan for double negation/complement.

use fcx_ir::{BinOpKind, Function, InstKind, UnOpKind, VReg};
use rustc_hash::FxHashMap;

pub struct AlgebraicSimplifier;

impl AlgebraicSimplifier {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, func: &mut Function) -> bool {
        let mut changed = false;
        for block in &mut func.blocks {
            // Map from vreg id to the index of its single defining
            // instruction within this block, used for the double
            // negation/complement back-scan.
            let mut def_in_block: FxHashMap<u32, usize> = FxHashMap::default();

            for idx in 0..block.instructions.len() {
                let kind = block.instructions[idx].kind.clone();
                let rewritten = match kind {
                    InstKind::BinOp { dest, op, lhs, rhs } => {
                        Self::simplify_binop(dest, op, lhs, rhs).or_else(|| {
                            Self::simplify_binop_with_def_lookup(dest, op, lhs, rhs, &def_in_block, &block.instructions)
                        })
                    }
                    InstKind::UnOp { dest, op, src } => {
                        let prev = def_in_block.get(&src.id).copied();
                        Self::simplify_unop(dest, op, src, prev.map(|i| &block.instructions[i].kind))
                    }
                    _ => None,
                };

                if let Some(new_kind) = rewritten {
                    block.instructions[idx].kind = new_kind;
                    changed = true;
                }

                if let Some(dest) = block.instructions[idx].defined_vreg() {
                    def_in_block.insert(dest.id, idx);
                }
            }
        }
        changed
    }

    fn simplify_binop(dest: VReg, op: BinOpKind, lhs: VReg, rhs: VReg) -> Option<InstKind> {
        match op {
            // Self-op: x^x, x-x -> CONST 0
            BinOpKind::Xor | BinOpKind::Sub if lhs.id == rhs.id => {
                Some(InstKind::Const { dest, value: 0 })
            }
            // Self-op: x|x, x&x -> MOV
            BinOpKind::Or | BinOpKind::And if lhs.id == rhs.id => {
                Some(InstKind::Mov { dest, src: lhs })
            }
            _ => None,
        }
    }

    fn simplify_binop_with_def_lookup(
        dest: VReg,
        op: BinOpKind,
        lhs: VReg,
        rhs: VReg,
        def_in_block: &FxHashMap<u32, usize>,
        instructions: &[fcx_ir::Instruction],
    ) -> Option<InstKind> {
        let const_value_of = |v: VReg| -> Option<i64> {
            match def_in_block.get(&v.id).map(|&i| &instructions[i].kind) {
                Some(InstKind::Const { value, .. }) => Some(*value),
                _ => None,
            }
        };
        if let Some(v) = const_value_of(rhs) {
            if let Some(k) = Self::simplify_against_constant(dest, op, lhs, true, v) {
                return Some(k);
            }
        }
        if let Some(v) = const_value_of(lhs) {
            if let Some(k) = Self::simplify_against_constant(dest, op, rhs, false, v) {
                return Some(k);
            }
        }
        None
    }

    /// Applies the identity/annihilator table for a binop against a
    /// known-constant operand, found via a same-block backscan. Kept
    /// separate from `simplify_binop` because it needs the constant's
    /// value, not just structural equality of operands.
    fn simplify_against_constant(
        dest: VReg,
        op: BinOpKind,
        other: VReg,
        const_operand_is_rhs: bool,
        const_value: i64,
    ) -> Option<InstKind> {
        match (op, const_value) {
            (BinOpKind::Add, 0) | (BinOpKind::Or, 0) | (BinOpKind::Xor, 0) => {
                Some(InstKind::Mov { dest, src: other })
            }
            (BinOpKind::Mul, 1) => Some(InstKind::Mov { dest, src: other }),
            (BinOpKind::And, -1) => Some(InstKind::Mov { dest, src: other }),
            (BinOpKind::Div, 1) if const_operand_is_rhs => Some(InstKind::Mov { dest, src: other }),
            (BinOpKind::Mul, 0) | (BinOpKind::And, 0) => Some(InstKind::Const { dest, value: 0 }),
            (BinOpKind::Sub, 0) if const_operand_is_rhs => Some(InstKind::Mov { dest, src: other }),
            _ => None,
        }
    }

    fn simplify_unop(dest: VReg, op: UnOpKind, src: VReg, producer: Option<&InstKind>) -> Option<InstKind> {
        if let Some(InstKind::UnOp { op: inner_op, src: inner_src, .. }) = producer {
            if *inner_op == op {
                return Some(InstKind::Mov { dest, src: *inner_src });
            }
        }
        let _ = src;
        None
    }
}

impl Default for AlgebraicSimplifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcx_ir::{FunctionBuilder, NumType};

    #[test]
    fn self_xor_becomes_zero() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let x = b.const_int(NumType::I64, 5).unwrap();
            let r = b.binop(BinOpKind::Xor, x, x).unwrap();
            b.ret(Some(r)).unwrap();
        }
        AlgebraicSimplifier::new().run(&mut f);
        let inst = &f.blocks[0].instructions[1];
        assert!(matches!(inst.kind, InstKind::Const { value: 0, .. }));
    }

    #[test]
    fn double_negation_becomes_mov() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let x = b.const_int(NumType::I64, 5).unwrap();
            let neg1 = b.unop(UnOpKind::Neg, x).unwrap();
            let neg2 = b.unop(UnOpKind::Neg, neg1).unwrap();
            b.ret(Some(neg2)).unwrap();
        }
        AlgebraicSimplifier::new().run(&mut f);
        let inst = &f.blocks[0].instructions[2];
        assert!(matches!(inst.kind, InstKind::Mov { .. }));
    }
}
