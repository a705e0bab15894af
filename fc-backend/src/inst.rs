//! FC IR (§3, §4.3): the x86-64-shaped instruction set FCx IR lowers into.
//! Two-operand arithmetic mirrors the real ISA: a MOV seeds the
//! destination, then the ALU op mutates it in place.

use crate::operand::{BlockId, FcMemRef, FcOperand};
use fcx_ir::{AtomicRmwOp, BinOpKind, CmpKind, InlineAsmPayload, SimdOpKind, VReg};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq)]
pub struct CallTarget {
    pub name: String,
    pub tail: bool,
    pub indirect: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FcInst {
    Mov { dest: FcOperand, src: FcOperand },

    /// Two-operand ALU op: `dest op= src`. Covers the integer/bitwise
    /// table row and is also how shifts and rotates lower, since those
    /// are two-operand forms on this ISA too.
    Alu { op: BinOpKind, dest: VReg, src: FcOperand },

    /// `IDIV divisor` against the implicit RAX:RDX dividend pair.
    /// `quotient`/`remainder` record which FC vreg each half of the
    /// result is copied into.
    Idiv { divisor: FcOperand, quotient: VReg, remainder: VReg },

    Neg { dest: VReg },
    Not { dest: VReg },

    Cmp { left: FcOperand, right: FcOperand },
    Jcc { cond: CmpKind, target: BlockId },
    Jmp { target: BlockId },

    Call(CallTarget),
    Ret,

    Push(VReg),
    Pop(VReg),
    Syscall,

    /// Implicitly LOCK-prefixed: the CPU treats XCHG with memory as
    /// atomic regardless of an explicit prefix.
    Xchg { addr: FcMemRef, value: VReg },
    LockCmpxchg { addr: FcMemRef, new: VReg },
    LockXadd { op: AtomicRmwOp, addr: FcMemRef, value: VReg },

    Mfence,
    Lfence,
    Sfence,

    Prefetcht0 { addr: FcMemRef },
    Prefetchw { addr: FcMemRef },

    /// External ABI call (`_fcx_*` runtime entry points, or anything
    /// named `_external_*`): arguments already placed per System V,
    /// result (if any) left in RAX by the callee.
    ExternCall { name: String, args: SmallVec<[VReg; 6]> },

    /// Two-operand SIMD op, same in-place shape as `Alu`.
    SimdAlu { op: SimdOpKind, dest: VReg, src: FcOperand },

    InlineAsm(InlineAsmPayload),
}

#[derive(Debug, Clone)]
pub struct FcBlock {
    pub id: BlockId,
    pub instructions: Vec<FcInst>,
}

impl FcBlock {
    pub fn new(id: BlockId) -> Self {
        Self { id, instructions: Vec::new() }
    }
}

#[derive(Debug, Clone)]
pub struct FcFunction {
    pub name: String,
    pub blocks: Vec<FcBlock>,
}

impl FcFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), blocks: Vec::new() }
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut FcBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FcModule {
    pub functions: Vec<FcFunction>,
}
