//! Bare-metal targets: no OS to ask. Pools must come from a linker region.

pub const AVAILABLE: bool = false;

pub unsafe fn page_alloc(_size: usize) -> *mut u8 {
    core::ptr::null_mut()
}

pub unsafe fn page_dealloc(_ptr: *mut u8, _size: usize) {}
