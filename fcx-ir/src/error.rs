//! Construction-time error taxonomy (§7, kind 1).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("virtual register allocation failed: id space exhausted")]
    AllocationFailed,

    #[error("opcode {opcode} expects {expected} operands, got {got}")]
    OperandMismatch {
        opcode: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("label {0} referenced before any block reserved that id")]
    UnknownLabel(u32),

    #[error("instruction appended to a block that is not owned by the current function")]
    DetachedBlock,

    #[error("function {0} has more than one entry block")]
    MultipleEntryBlocks(String),

    #[error("VReg {0} is defined by more than one CONST/MOV/binary/unary/load/call instruction")]
    DuplicateDefinition(u32),
}

pub type Result<T> = std::result::Result<T, IrError>;
