//! The ABI surface generated code actually links against (§6). Global
//! state lives behind `OnceLock<Mutex<_>>` rather than `static mut`;
//! the mutex is a formality since every allocator here is single-threaded
//! by contract (§4.11, §5) but it keeps these symbols `Sync` without unsafe
//! statics.

use crate::arena::ArenaTable;
use crate::heap::Heap;
use crate::slab::SlabTable;
use fcx_ir::BigInt;
use std::sync::{Mutex, OnceLock};
use tracing::error;

fn heap() -> &'static Mutex<Heap> {
    static HEAP: OnceLock<Mutex<Heap>> = OnceLock::new();
    HEAP.get_or_init(|| Mutex::new(Heap::new()))
}

fn arenas() -> &'static Mutex<ArenaTable> {
    static ARENAS: OnceLock<Mutex<ArenaTable>> = OnceLock::new();
    ARENAS.get_or_init(|| Mutex::new(ArenaTable::new()))
}

fn slabs() -> &'static Mutex<SlabTable> {
    static SLABS: OnceLock<Mutex<SlabTable>> = OnceLock::new();
    SLABS.get_or_init(|| Mutex::new(SlabTable::new()))
}

#[no_mangle]
pub extern "C" fn _fcx_alloc(size: u64, align: u64) -> *mut u8 {
    heap().lock().unwrap().alloc(size, align)
}

#[no_mangle]
pub extern "C" fn _fcx_free(ptr: *mut u8) {
    heap().lock().unwrap().free(ptr);
}

#[no_mangle]
pub extern "C" fn _fcx_arena_alloc(size: u64, align: u64, scope_id: u32) -> *mut u8 {
    arenas().lock().unwrap().alloc(scope_id, size, align)
}

#[no_mangle]
pub extern "C" fn _fcx_arena_reset(scope_id: u32) {
    arenas().lock().unwrap().reset(scope_id);
}

#[no_mangle]
pub extern "C" fn _fcx_slab_alloc(size: u64, type_hash: u32) -> *mut u8 {
    slabs().lock().unwrap().alloc(type_hash, size)
}

#[no_mangle]
pub extern "C" fn _fcx_slab_free(ptr: *mut u8, type_hash: u32) {
    slabs().lock().unwrap().free(type_hash, ptr);
}

/// Logs `msg` (a nul-terminated C string) and aborts. Lowered `PANIC`
/// paths and failed runtime contract checks (e.g. an unrecoverable OOM)
/// call through here rather than unwinding, since generated code has no
/// Rust landing pads (§4.11).
///
/// # Safety
/// `msg` must be a valid pointer to a nul-terminated byte string, or null.
#[no_mangle]
pub unsafe extern "C" fn _fcx_panic(msg: *const u8) -> ! {
    if msg.is_null() {
        error!("runtime panic with no message");
    } else {
        let message = std::ffi::CStr::from_ptr(msg as *const std::os::raw::c_char).to_string_lossy();
        error!(%message, "runtime panic");
    }
    std::process::abort();
}

fn print_bigint(value: &BigInt) {
    if let Some(small) = value.as_u64() {
        println!("{small}");
        return;
    }
    let hex: String = value.active_limbs().iter().rev().map(|limb| format!("{limb:016x}")).collect();
    println!("0x{hex}");
}

/// Prints a 128-bit value passed by value (two limbs), per the ABI fixed
/// in §6.
#[no_mangle]
pub extern "C" fn _fcx_print_i128(value: i128) {
    println!("{value}");
}

#[no_mangle]
pub extern "C" fn _fcx_print_u128(value: u128) {
    println!("{value}");
}

/// Prints a 256-bit value passed by pointer to 4 little-endian `u64` limbs.
///
/// # Safety
/// `ptr` must point to at least 4 valid, initialized `u64` limbs.
#[no_mangle]
pub unsafe extern "C" fn _fcx_print_bigint256(ptr: *const u64) {
    let limbs = std::slice::from_raw_parts(ptr, 4);
    print_bigint(&BigInt::from_limbs(limbs));
}

/// Prints a 512-bit value passed by pointer to 8 little-endian `u64` limbs.
///
/// # Safety
/// `ptr` must point to at least 8 valid, initialized `u64` limbs.
#[no_mangle]
pub unsafe extern "C" fn _fcx_print_bigint512(ptr: *const u64) {
    let limbs = std::slice::from_raw_parts(ptr, 8);
    print_bigint(&BigInt::from_limbs(limbs));
}

/// Prints a 1024-bit value passed by pointer to 16 little-endian `u64`
/// limbs, `fcx_ir::bigint::MAX_LIMBS`.
///
/// # Safety
/// `ptr` must point to at least 16 valid, initialized `u64` limbs.
#[no_mangle]
pub unsafe extern "C" fn _fcx_print_bigint1024(ptr: *const u64) {
    let limbs = std::slice::from_raw_parts(ptr, 16);
    print_bigint(&BigInt::from_limbs(limbs));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_roundtrip_through_the_ffi_surface() {
        let ptr = _fcx_alloc(64, 8);
        assert!(!ptr.is_null());
        _fcx_free(ptr);
    }

    #[test]
    fn arena_alloc_then_reset_through_the_ffi_surface() {
        let ptr = _fcx_arena_alloc(32, 8, 1);
        assert!(!ptr.is_null());
        _fcx_arena_reset(1);
    }

    #[test]
    fn slab_alloc_then_free_through_the_ffi_surface() {
        let ptr = _fcx_slab_alloc(16, 7);
        assert!(!ptr.is_null());
        _fcx_slab_free(ptr, 7);
    }
}
