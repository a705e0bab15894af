//! FC IR operands (§3): the sum type every FC instruction's non-opcode
//! fields are drawn from.

use fcx_ir::{BigInt, VReg};

pub type BlockId = u32;

/// `[base + index*scale + disp]`. `index`/`scale` are absent for the
/// common unscaled `[base+disp]` form most lowerings produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FcMemRef {
    pub base: VReg,
    pub index: Option<VReg>,
    pub disp: i64,
    pub scale: u8,
}

impl FcMemRef {
    pub fn simple(base: VReg, disp: i64) -> Self {
        Self { base, index: None, disp, scale: 1 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FcOperand {
    Reg(VReg),
    Imm(i64),
    BigImm(BigInt),
    ExternFn(u32),
    Label(BlockId),
    Mem(FcMemRef),
    StackSlot(u32),
}

impl From<VReg> for FcOperand {
    fn from(v: VReg) -> Self {
        FcOperand::Reg(v)
    }
}
