//! FC IR: the x86-64-shaped data model FCx IR lowers into, and the
//! lowering pass itself. Actual machine-code emission (register
//! allocation, encoding, linking) lives downstream of this crate.

pub mod error;
pub mod inst;
pub mod lowering;
pub mod operand;
pub mod sentinel;

pub use error::{BackendError, Result};
pub use inst::{CallTarget, FcBlock, FcFunction, FcInst, FcModule};
pub use lowering::lower_function;
pub use operand::{FcMemRef, FcOperand};
