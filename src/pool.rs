//! The fixed physical memory pool a [`FlatMemory`](crate::FlatMemory) manages.
//!
//! Exactly one pool is handed to each instance at start-up by the platform
//! bootstrap code, and its extent never changes afterwards. The pool records
//! where its memory came from so hosted backing can be returned on drop.

use crate::config::{DEFAULT_POOL_SIZE, MIN_ALIGN};
use crate::platform;
use crate::range::{AddrRange, align_down, align_up};

enum Backing {
    /// Memory owned by someone else (linker region, static buffer).
    Borrowed,
    /// Memory obtained from the host OS; released on drop.
    Hosted { ptr: *mut u8, size: usize },
}

pub struct Pool {
    /// Usable extent, trimmed to `MIN_ALIGN` at both ends.
    range: AddrRange,
    backing: Backing,
}

// SAFETY: a Pool is the unique owner of its extent; the raw pointer in
// `Backing::Hosted` is only used to release that extent on drop.
unsafe impl Send for Pool {}
unsafe impl Sync for Pool {}

impl Pool {
    /// Adopt a static buffer as the pool.
    ///
    /// The head is trimmed up to the first `MIN_ALIGN` boundary and the tail
    /// down to a whole multiple of `MIN_ALIGN`; [`Pool::range`] reports the
    /// result.
    pub fn from_static(mem: &'static mut [u8]) -> Pool {
        Self::trimmed(mem.as_mut_ptr() as usize, mem.len(), Backing::Borrowed)
    }

    /// Adopt `[base, base + len)` as the pool, e.g. a linker-defined region.
    ///
    /// # Safety
    /// The range must be valid for reads and writes for the life of the
    /// process, and nothing else may access it except through the layer.
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Pool {
        Self::trimmed(base as usize, len, Backing::Borrowed)
    }

    /// Obtain a `size`-byte pool from the host OS.
    ///
    /// Returns `None` if the OS refuses or the target has no OS backing.
    pub fn hosted(size: usize) -> Option<Pool> {
        if !platform::HAS_OS_BACKING || size == 0 {
            return None;
        }
        // SAFETY: released exactly once in Drop with the same size.
        let ptr = unsafe { platform::page_alloc(size) };
        if ptr.is_null() {
            return None;
        }
        Some(Self::trimmed(
            ptr as usize,
            size,
            Backing::Hosted { ptr, size },
        ))
    }

    /// Hosted pool of the configured default size.
    pub fn hosted_default() -> Option<Pool> {
        Self::hosted(DEFAULT_POOL_SIZE)
    }

    fn trimmed(base: usize, len: usize, backing: Backing) -> Pool {
        let end = base.saturating_add(len);
        // Address zero is never handed out.
        let range = match align_up(base.max(1), MIN_ALIGN) {
            Some(start) if start < end => {
                AddrRange::new(start, align_down(end - start, MIN_ALIGN))
            }
            _ => AddrRange::new(base, 0),
        };
        Pool { range, backing }
    }

    /// Usable extent of the pool.
    #[inline]
    pub fn range(&self) -> AddrRange {
        self.range
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.range.len
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self.backing, Backing::Hosted { .. })
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        if let Backing::Hosted { ptr, size } = self.backing {
            // SAFETY: obtained from page_alloc(size) in `hosted`.
            unsafe { platform::page_dealloc(ptr, size) };
        }
    }
}

impl core::fmt::Debug for Pool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("range", &self.range)
            .field("hosted", &self.is_hosted())
            .finish()
    }
}
