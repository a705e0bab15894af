//! Strength reduction (§4.2): multiplication/division/modulo by a power
//! of two becomes a shift or mask. The constant that supplied the power
//! of two is rewritten in place to the shift amount or mask, so dead-code
//! elimination reaps no extra work — this is also the mechanism behind
//! the open question in §9: if that CONST's result is used elsewhere,
//! those other uses silently observe the rewritten value too. We
//! preserve that behavior rather than guess a fix (see DESIGN.md).

use fcx_ir::{BinOpKind, Function, InstKind, VReg};
use rustc_hash::FxHashMap;

pub struct StrengthReducer;

impl StrengthReducer {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, func: &mut Function) -> bool {
        let mut changed = false;
        for block in &mut func.blocks {
            let mut def_in_block: FxHashMap<u32, usize> = FxHashMap::default();

            for idx in 0..block.instructions.len() {
                if let InstKind::BinOp { dest, op, lhs, rhs } = block.instructions[idx].kind {
                    if let Some((op_idx, new_binop, new_const_value)) =
                        Self::reduce(op, lhs, rhs, &def_in_block, &block.instructions)
                    {
                        block.instructions[idx].kind = InstKind::BinOp {
                            dest,
                            op: new_binop,
                            lhs,
                            rhs,
                        };
                        if let InstKind::Const { value, .. } = &mut block.instructions[op_idx].kind {
                            *value = new_const_value;
                        }
                        changed = true;
                    }
                }

                if let Some(dest) = block.instructions[idx].defined_vreg() {
                    def_in_block.insert(dest.id, idx);
                }
            }
        }
        changed
    }

    /// Returns `(index of the CONST instruction to rewrite, new BinOp
    /// kind, new constant value)` when `lhs op rhs` is reducible.
    fn reduce(
        op: BinOpKind,
        lhs: VReg,
        rhs: VReg,
        def_in_block: &FxHashMap<u32, usize>,
        instructions: &[fcx_ir::Instruction],
    ) -> Option<(usize, BinOpKind, i64)> {
        let const_idx_and_value = |v: VReg| -> Option<(usize, i64)> {
            let idx = *def_in_block.get(&v.id)?;
            match instructions[idx].kind {
                InstKind::Const { value, .. } => Some((idx, value)),
                _ => None,
            }
        };

        match op {
            BinOpKind::Mul => {
                if let Some((idx, v)) = const_idx_and_value(rhs) {
                    if let Some(shift) = power_of_two_shift(v) {
                        return Some((idx, BinOpKind::Shl, shift));
                    }
                } else if let Some((idx, v)) = const_idx_and_value(lhs) {
                    if let Some(shift) = power_of_two_shift(v) {
                        return Some((idx, BinOpKind::Shl, shift));
                    }
                }
                None
            }
            BinOpKind::Div => {
                let (idx, v) = const_idx_and_value(rhs)?;
                let shift = power_of_two_shift(v)?;
                Some((idx, BinOpKind::ShrArith, shift))
            }
            BinOpKind::Mod => {
                let (idx, v) = const_idx_and_value(rhs)?;
                if v <= 0 {
                    return None;
                }
                if v.count_ones() != 1 {
                    return None;
                }
                Some((idx, BinOpKind::And, v - 1))
            }
            _ => None,
        }
    }
}

/// Returns `log2(v)` if `v` is a strictly positive power of two.
fn power_of_two_shift(v: i64) -> Option<i64> {
    if v > 0 && v.count_ones() == 1 {
        Some(v.trailing_zeros() as i64)
    } else {
        None
    }
}

impl Default for StrengthReducer {
    fn default() -> Self {
        Self::new()
    }
}
