//! Host backing for a pool.
//!
//! On an MMU-less target the pool is a linker-provided region and this module
//! is never consulted. Hosted builds (development machines, CI, Miri) get
//! their pool from the OS instead: `mmap` on Unix, `VirtualAlloc` on Windows,
//! `std::alloc` under Miri. Targets with none of these get a backend that
//! always reports failure.

cfg_if::cfg_if! {
    if #[cfg(miri)] {
        mod miri;
        use miri as imp;
    } else if #[cfg(windows)] {
        mod windows;
        use windows as imp;
    } else if #[cfg(unix)] {
        mod unix;
        use unix as imp;
    } else {
        mod none;
        use none as imp;
    }
}

use crate::config::PAGE_SIZE;
use crate::range::align_up;

/// Whether this target can back a pool from the OS at all.
pub const HAS_OS_BACKING: bool = imp::AVAILABLE;

/// Obtain `size` bytes of zeroed, page-aligned memory from the OS.
/// `size` is rounded up to `PAGE_SIZE`. Returns null on failure.
///
/// # Safety
/// The caller must release the block with [`page_dealloc`] passing the same
/// `size`, and must not use it afterwards.
#[inline]
pub unsafe fn page_alloc(size: usize) -> *mut u8 {
    match align_up(size, PAGE_SIZE) {
        Some(rounded) if rounded > 0 => unsafe { imp::page_alloc(rounded) },
        _ => core::ptr::null_mut(),
    }
}

/// Return memory obtained from [`page_alloc`] to the OS.
///
/// # Safety
/// `ptr` must have been returned by `page_alloc(size)` and not released yet.
#[inline]
pub unsafe fn page_dealloc(ptr: *mut u8, size: usize) {
    if let Some(rounded) = align_up(size, PAGE_SIZE) {
        unsafe { imp::page_dealloc(ptr, rounded) }
    }
}

#[cfg(all(test, any(unix, windows, miri)))]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_zeroed_and_writable() {
        unsafe {
            let ptr = page_alloc(PAGE_SIZE);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % PAGE_SIZE, 0);
            for i in 0..PAGE_SIZE {
                assert_eq!(*ptr.add(i), 0);
            }
            for i in 0..PAGE_SIZE {
                *ptr.add(i) = (i & 0xFF) as u8;
            }
            for i in 0..PAGE_SIZE {
                assert_eq!(*ptr.add(i), (i & 0xFF) as u8);
            }
            page_dealloc(ptr, PAGE_SIZE);
        }
    }

    #[test]
    fn test_odd_size_rounds_up() {
        unsafe {
            let size = PAGE_SIZE + 1;
            let ptr = page_alloc(size);
            assert!(!ptr.is_null());
            *ptr.add(2 * PAGE_SIZE - 1) = 0xBB;
            page_dealloc(ptr, size);
        }
    }

    #[test]
    fn test_zero_size_fails() {
        assert!(unsafe { page_alloc(0) }.is_null());
    }
}
