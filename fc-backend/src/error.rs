//! Lowering errors (§4.3, §8): raw-pointer arithmetic is the one
//! operation lowering is allowed to refuse outright.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Invalid pointer type for arithmetic")]
    InvalidPointerArithmetic,

    #[error("unknown block {0} referenced during lowering")]
    UnknownBlock(u32),

    #[error("function has no blocks to lower")]
    EmptyFunction,
}

pub type Result<T> = std::result::Result<T, BackendError>;
