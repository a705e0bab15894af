//! Runtime allocator contract consumed by lowered IR (C11, §4.11, §6): a
//! segregated-fit heap, scope-indexed arenas, and type-hashed slabs,
//! exposed as the fixed `extern "C"` symbols generated code links against.

pub mod arena;
pub mod ffi;
pub mod heap;
pub mod slab;

pub use arena::ArenaTable;
pub use heap::Heap;
pub use slab::SlabTable;
