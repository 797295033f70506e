//! Miri pool backing using `alloc::alloc`.
//!
//! Miri can't execute mmap/VirtualAlloc, so the pool comes from the global
//! allocator. That still lets Miri check every pointer the layer hands out.

extern crate alloc;

use core::alloc::Layout;

pub const AVAILABLE: bool = true;

fn layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size, crate::config::PAGE_SIZE).ok()
}

pub unsafe fn page_alloc(size: usize) -> *mut u8 {
    match layout(size) {
        Some(layout) => unsafe { alloc::alloc::alloc_zeroed(layout) },
        None => core::ptr::null_mut(),
    }
}

pub unsafe fn page_dealloc(ptr: *mut u8, size: usize) {
    if let Some(layout) = layout(size) {
        unsafe { alloc::alloc::dealloc(ptr, layout) };
    }
}
