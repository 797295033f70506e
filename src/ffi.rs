//! C-ABI exports mirroring the runtime's `Sys*` entry points.
//!
//! Gated behind `features = ["ffi"]`. The C side of the runtime calls these
//! instead of the per-OS `mem_*.c` implementations. The platform bootstrap
//! builds one [`FlatMemory`] over the linker-provided pool and registers it
//! with [`install`] before the first allocation.
//!
//! `stat` arguments are [`MemClass`] indices; unknown indices are charged to
//! [`MemClass::Other`].

use crate::accounting::MemClass;
use crate::fatal::{self, Primitive, Violation, ViolationKind};
use crate::flat::FlatMemory;
use crate::primitives::MemoryPrimitives;
use crate::range::AddrRange;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

static INSTANCE: AtomicPtr<FlatMemory<'static>> = AtomicPtr::new(ptr::null_mut());

/// Register the instance the exports operate on. Only the first call wins;
/// returns false if an instance was already installed.
pub fn install(mem: &'static FlatMemory<'static>) -> bool {
    INSTANCE
        .compare_exchange(
            ptr::null_mut(),
            mem as *const FlatMemory<'static> as *mut FlatMemory<'static>,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok()
}

fn instance(primitive: Primitive, range: AddrRange) -> &'static FlatMemory<'static> {
    let mem = INSTANCE.load(Ordering::Acquire);
    if mem.is_null() {
        fatal::contract_violation(Violation::new(primitive, range, ViolationKind::NoPool));
    }
    // SAFETY: only ever set from a `&'static FlatMemory` in `install`.
    unsafe { &*mem }
}

#[inline]
fn class(stat: usize) -> MemClass {
    MemClass::from_index(stat).unwrap_or(MemClass::Other)
}

/// Returns null when the pool is exhausted.
#[unsafe(no_mangle)]
pub extern "C" fn rtsysmem_sys_alloc(n: usize, stat: usize) -> *mut u8 {
    let mem = instance(Primitive::Alloc, AddrRange::new(0, n));
    match mem.alloc(n, class(stat)) {
        Ok(p) => p.as_ptr(),
        Err(_) => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rtsysmem_sys_free(v: *mut u8, n: usize, stat: usize) {
    instance(Primitive::Free, AddrRange::from_ptr(v, n)).free(v, n, class(stat));
}

/// Returns null when the pool is exhausted; `*reserved` is written on success.
///
/// # Safety
/// `reserved` must be valid for a write of one `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rtsysmem_sys_reserve(v: *mut u8, n: usize, reserved: *mut bool) -> *mut u8 {
    let mem = instance(Primitive::Reserve, AddrRange::from_ptr(v, n));
    match mem.reserve(v, n) {
        Ok(r) => {
            unsafe { reserved.write(r.reserved) };
            r.base.as_ptr()
        }
        Err(_) => ptr::null_mut(),
    }
}

/// Returns false when bookkeeping is exhausted.
#[unsafe(no_mangle)]
pub extern "C" fn rtsysmem_sys_map(v: *mut u8, n: usize, reserved: bool, stat: usize) -> bool {
    instance(Primitive::Map, AddrRange::from_ptr(v, n))
        .map(v, n, reserved, class(stat))
        .is_ok()
}

#[unsafe(no_mangle)]
pub extern "C" fn rtsysmem_sys_unused(v: *mut u8, n: usize) {
    instance(Primitive::Unused, AddrRange::from_ptr(v, n)).unused(v, n);
}

#[unsafe(no_mangle)]
pub extern "C" fn rtsysmem_sys_used(v: *mut u8, n: usize) {
    instance(Primitive::Used, AddrRange::from_ptr(v, n)).used(v, n);
}

#[unsafe(no_mangle)]
pub extern "C" fn rtsysmem_sys_fault(v: *mut u8, n: usize) {
    instance(Primitive::Fault, AddrRange::from_ptr(v, n)).fault(v, n);
}
