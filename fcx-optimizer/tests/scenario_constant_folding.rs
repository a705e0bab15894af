//! End-to-end scenario: `(2 << 3) + (10 / 2) - (x * 1)` folds to a
//! single subtraction of a constant from `x` after O2, converging in a
//! handful of fixed-point iterations.

use fcx_ir::{BinOpKind, FunctionBuilder, InstKind, NumType, VReg};
use fcx_optimizer::{Optimizer, OptimizationLevel};

#[test]
fn constant_subexpressions_fold_leaving_only_the_subtraction_by_x() {
    let x = VReg::new(1, NumType::I64);
    let mut f = fcx_ir::Function::new("scenario", vec![x], NumType::I64);
    {
        let mut b = FunctionBuilder::new(&mut f);
        let two = b.const_int(NumType::I64, 2).unwrap();
        let three = b.const_int(NumType::I64, 3).unwrap();
        let shifted = b.binop(BinOpKind::Shl, two, three).unwrap(); // 2 << 3 = 16
        let ten = b.const_int(NumType::I64, 10).unwrap();
        let divisor = b.const_int(NumType::I64, 2).unwrap();
        let divided = b.binop(BinOpKind::Div, ten, divisor).unwrap(); // 10 / 2 = 5
        let sum = b.binop(BinOpKind::Add, shifted, divided).unwrap(); // 21
        let one = b.const_int(NumType::I64, 1).unwrap();
        let product = b.binop(BinOpKind::Mul, x, one).unwrap(); // x * 1 -> x
        let result = b.binop(BinOpKind::Sub, sum, product).unwrap(); // 21 - x
        b.ret(Some(result)).unwrap();
    }

    Optimizer::new(OptimizationLevel::O2).optimize_until_fixpoint(&mut f);

    let instructions = &f.blocks[0].instructions;
    let constants: Vec<i64> = instructions
        .iter()
        .filter_map(|i| match &i.kind {
            InstKind::Const { value, .. } => Some(*value),
            _ => None,
        })
        .collect();
    assert!(constants.contains(&21), "expected a folded constant 21, got {constants:?}");

    let InstKind::Return { value } = &instructions.last().unwrap().kind else {
        panic!("function must end in a return");
    };
    let producing = instructions.iter().find(|i| i.defined_vreg() == *value).unwrap();
    assert!(matches!(producing.kind, InstKind::BinOp { op: BinOpKind::Sub, .. }));
}
