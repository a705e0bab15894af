//! Top-level error taxonomy: wraps the per-crate errors of the pipeline
//! stages this crate drives (C2-C10) plus the I/O this crate itself does.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read input {0}: {1}")]
    IoError(std::path::PathBuf, std::io::Error),

    #[error("lowering failed: {0}")]
    Backend(#[from] fc_backend::BackendError),

    #[error("object file error: {0}")]
    ObjectFormat(#[from] hmso::HmsoError),

    #[error("no functions to compile")]
    EmptyModule,
}

pub type Result<T> = std::result::Result<T, CompileError>;
