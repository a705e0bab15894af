//! Constant folding (§4.2): rewrites binary/unary instructions whose
//! inputs are both known compile-time values into `CONST`/`CONST_BIGINT`.

use fcx_ir::{BigInt, BinOpKind, CmpKind, Function, InstKind, UnOpKind};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
enum AnyConst {
    Word(i64),
    Big(BigInt),
}

pub struct ConstantFolder {
    values: FxHashMap<u32, AnyConst>,
}

impl ConstantFolder {
    pub fn new() -> Self {
        Self { values: FxHashMap::default() }
    }

    /// Runs one pass over `func`, returning whether anything changed.
    pub fn run(&mut self, func: &mut Function) -> bool {
        self.values.clear();
        let mut changed = false;

        for block in &mut func.blocks {
            for inst in &mut block.instructions {
                match &inst.kind {
                    InstKind::Const { dest, value } => {
                        self.values.insert(dest.id, AnyConst::Word(*value));
                    }
                    InstKind::ConstBigInt { dest, value } => {
                        self.values.insert(dest.id, AnyConst::Big(*value));
                    }
                    InstKind::BinOp { dest, op, lhs, rhs } => {
                        if let Some(folded) = self.try_fold_binop(*op, lhs.id, rhs.id) {
                            let dest = *dest;
                            inst.kind = InstKind::Const { dest, value: folded };
                            self.values.insert(dest.id, AnyConst::Word(folded));
                            changed = true;
                        } else if let Some(folded) = self.try_fold_binop_bigint(*op, lhs.id, rhs.id) {
                            let dest = *dest;
                            inst.kind = InstKind::ConstBigInt { dest, value: folded };
                            self.values.insert(dest.id, AnyConst::Big(folded));
                            changed = true;
                        }
                    }
                    InstKind::UnOp { dest, op, src } => {
                        if let Some(folded) = self.try_fold_unop(*op, src.id) {
                            let dest = *dest;
                            inst.kind = InstKind::Const { dest, value: folded };
                            self.values.insert(dest.id, AnyConst::Word(folded));
                            changed = true;
                        }
                    }
                    InstKind::Cmp { dest, op, lhs, rhs, .. } => {
                        if let Some(folded) = self.try_fold_cmp(*op, lhs.id, rhs.id) {
                            let dest = *dest;
                            inst.kind = InstKind::Const { dest, value: folded };
                            self.values.insert(dest.id, AnyConst::Word(folded));
                            changed = true;
                        }
                    }
                    _ => {}
                }
            }
        }
        changed
    }

    fn word(&self, id: u32) -> Option<i64> {
        match self.values.get(&id) {
            Some(AnyConst::Word(v)) => Some(*v),
            _ => None,
        }
    }

    fn big(&self, id: u32) -> Option<BigInt> {
        match self.values.get(&id) {
            Some(AnyConst::Big(v)) => Some(*v),
            Some(AnyConst::Word(v)) => Some(BigInt::from_u64(*v as u64)),
            None => None,
        }
    }

    /// Big-integer add/sub, limb-wise with carry/borrow. Only reached
    /// when `try_fold_binop` already failed, i.e. at least one operand
    /// is wider than a machine word.
    fn try_fold_binop_bigint(&self, op: BinOpKind, lhs: u32, rhs: u32) -> Option<BigInt> {
        let a = self.big(lhs)?;
        let b = self.big(rhs)?;
        match op {
            BinOpKind::Add => a.checked_add(&b),
            BinOpKind::Sub => a.checked_sub(&b),
            _ => None,
        }
    }

    fn try_fold_cmp(&self, op: CmpKind, lhs: u32, rhs: u32) -> Option<i64> {
        let a = self.word(lhs)?;
        let b = self.word(rhs)?;
        Some(op.eval_signed(a, b) as i64)
    }

    fn try_fold_unop(&self, op: UnOpKind, src: u32) -> Option<i64> {
        let v = self.word(src)?;
        Some(match op {
            UnOpKind::Neg => v.wrapping_neg(),
            UnOpKind::Not => !v,
        })
    }

    /// Binary folding semantics, exhaustively per §4.2:
    /// - div/mod by zero are not folded.
    /// - shifts are defined only for a right operand in `[0, 64)`.
    /// - arithmetic right shift sign-extends; logical zero-extends;
    ///   rotates mask the count to bit width.
    fn try_fold_binop(&self, op: BinOpKind, lhs: u32, rhs: u32) -> Option<i64> {
        let a = self.word(lhs)?;
        let b = self.word(rhs)?;
        match op {
            BinOpKind::Add => Some(a.wrapping_add(b)),
            BinOpKind::Sub => Some(a.wrapping_sub(b)),
            BinOpKind::Mul => Some(a.wrapping_mul(b)),
            BinOpKind::And => Some(a & b),
            BinOpKind::Or => Some(a | b),
            BinOpKind::Xor => Some(a ^ b),
            BinOpKind::Div => {
                if b == 0 {
                    None
                } else if a == i64::MIN && b == -1 {
                    // Would overflow i64::MAX by one; leave unfolded (§8).
                    None
                } else {
                    Some(a / b)
                }
            }
            BinOpKind::Mod => {
                if b == 0 {
                    None
                } else if a == i64::MIN && b == -1 {
                    None
                } else {
                    Some(a % b)
                }
            }
            BinOpKind::Shl => {
                if (0..64).contains(&b) {
                    Some(((a as u64) << b) as i64)
                } else {
                    None
                }
            }
            BinOpKind::ShrArith => {
                if (0..64).contains(&b) {
                    Some(a >> b)
                } else {
                    None
                }
            }
            BinOpKind::ShrLogical => {
                if (0..64).contains(&b) {
                    Some(((a as u64) >> b) as i64)
                } else {
                    None
                }
            }
            BinOpKind::Rol => {
                let count = (b as u32) & 63;
                Some((a as u64).rotate_left(count) as i64)
            }
            BinOpKind::Ror => {
                let count = (b as u32) & 63;
                Some((a as u64).rotate_right(count) as i64)
            }
        }
    }
}

impl Default for ConstantFolder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcx_ir::{FunctionBuilder, NumType};

    #[test]
    fn shift_by_64_is_not_folded() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let x = b.const_int(NumType::I64, 1).unwrap();
            let amt = b.const_int(NumType::I64, 64).unwrap();
            let shifted = b.binop(BinOpKind::Shl, x, amt).unwrap();
            b.ret(Some(shifted)).unwrap();
        }
        let mut folder = ConstantFolder::new();
        folder.run(&mut f);
        let last = &f.blocks[0].instructions[2];
        assert!(matches!(last.kind, InstKind::BinOp { .. }));
    }

    #[test]
    fn shift_by_63_is_folded() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let x = b.const_int(NumType::I64, 1).unwrap();
            let amt = b.const_int(NumType::I64, 63).unwrap();
            let shifted = b.binop(BinOpKind::Shl, x, amt).unwrap();
            b.ret(Some(shifted)).unwrap();
        }
        let mut folder = ConstantFolder::new();
        folder.run(&mut f);
        let last = &f.blocks[0].instructions[2];
        assert!(matches!(last.kind, InstKind::Const { value, .. } if value == 1i64 << 63));
    }

    #[test]
    fn div_by_zero_is_not_folded() {
        let mut f = Function::new("f", vec![], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let x = b.const_int(NumType::I64, 10).unwrap();
            let zero = b.const_int(NumType::I64, 0).unwrap();
            let divided = b.binop(BinOpKind::Div, x, zero).unwrap();
            b.ret(Some(divided)).unwrap();
        }
        let mut folder = ConstantFolder::new();
        folder.run(&mut f);
        let last = &f.blocks[0].instructions[2];
        assert!(matches!(last.kind, InstKind::BinOp { .. }));
    }

    #[test]
    fn scenario_one_folds_to_the_expected_constant() {
        let x = fcx_ir::VReg::new(1, NumType::I64);
        let mut f = Function::new("scenario_one", vec![x], NumType::I64);
        {
            let mut b = FunctionBuilder::new(&mut f);
            let two = b.const_int(NumType::I64, 2).unwrap();
            let three = b.const_int(NumType::I64, 3).unwrap();
            let shifted = b.binop(BinOpKind::Shl, two, three).unwrap();
            let ten = b.const_int(NumType::I64, 10).unwrap();
            let divisor = b.const_int(NumType::I64, 2).unwrap();
            let divided = b.binop(BinOpKind::Div, ten, divisor).unwrap();
            let sum = b.binop(BinOpKind::Add, shifted, divided).unwrap();
            b.ret(Some(sum)).unwrap();
        }
        let mut folder = ConstantFolder::new();
        loop {
            if !folder.run(&mut f) {
                break;
            }
        }
        let sum_inst = f.blocks[0].instructions.last().unwrap();
        // sum_inst is RETURN; the value it returns was rewritten to CONST 21.
        let InstKind::Return { value } = &sum_inst.kind else {
            panic!("expected return")
        };
        let producing = f.blocks[0]
            .instructions
            .iter()
            .find(|i| i.defined_vreg() == *value)
            .unwrap();
        assert!(matches!(producing.kind, InstKind::Const { value: 21, .. }));
    }
}
