//! FCx IR — the high-level, operator-centric intermediate representation
//! produced by IR generation from the AST (C1).
//!
//! This crate owns the data model (virtual registers, instructions,
//! basic blocks, functions, modules) and the builder API used to
//! construct it. It does not parse source or run optimization passes —
//! see `fcx-optimizer` for the rewrite passes and analyses that consume
//! this model.

pub mod bigint;
pub mod block;
pub mod builder;
pub mod error;
pub mod function;
pub mod inst;
pub mod module;
pub mod ty;
pub mod vreg;

pub use bigint::BigInt;
pub use block::BasicBlock;
pub use builder::FunctionBuilder;
pub use error::{IrError, Result};
pub use function::Function;
pub use inst::{
    AllocKind, AtomicRmwOp, BinOpKind, CmpKind, DeallocKind, FenceKind, InlineAsmPayload,
    InstKind, Instruction, MemRef, SimdOpKind, UnOpKind,
};
pub use module::{Global, Module, StringLiteral};
pub use ty::NumType;
pub use vreg::{PhysReg, VReg, PRECOLORED_MAX, PRECOLORED_MIN};

#[cfg(test)]
mod tests {
    use super::*;

    /// End-to-end scenario 1 setup (§8): a function computing
    /// `(2 << 3) + (10 / 2) - (x * 1)` where `x` is parameter VReg 1.
    /// This only exercises construction; folding is `fcx-optimizer`'s job.
    #[test]
    fn builds_the_scenario_one_function() {
        let x = VReg::new(1, NumType::I64);
        let mut f = Function::new("scenario_one", vec![x], NumType::I64);
        let mut b = FunctionBuilder::new(&mut f);

        let two = b.const_int(NumType::I64, 2).unwrap();
        let three = b.const_int(NumType::I64, 3).unwrap();
        let shifted = b.binop(BinOpKind::Shl, two, three).unwrap();

        let ten = b.const_int(NumType::I64, 10).unwrap();
        let divisor = b.const_int(NumType::I64, 2).unwrap();
        let divided = b.binop(BinOpKind::Div, ten, divisor).unwrap();

        let sum = b.binop(BinOpKind::Add, shifted, divided).unwrap();

        let one = b.const_int(NumType::I64, 1).unwrap();
        let product = b.binop(BinOpKind::Mul, x, one).unwrap();

        let result = b.binop(BinOpKind::Sub, sum, product).unwrap();
        b.ret(Some(result)).unwrap();

        assert!(f.verify_single_definition().is_ok());
        assert!(f.verify_label_consistency().is_ok());
        assert!(f.verify_single_entry().is_ok());
    }
}
