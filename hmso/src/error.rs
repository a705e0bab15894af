//! Error taxonomy for the object-file/global-index/build-cache stages
//! (§7): format and cache errors degrade gracefully, never abort the
//! whole pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HmsoError {
    #[error("object file magic mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("unsupported object file version {0}")]
    UnsupportedVersion(u32),

    #[error("truncated object file: {0}")]
    Truncated(&'static str),

    #[error("build-cache index corrupt: {0}")]
    CorruptCache(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HmsoError>;
