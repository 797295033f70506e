//! Address ranges: a base address plus a length in bytes.

use core::fmt;

/// A contiguous span of memory `[base, base + len)`.
///
/// Addresses are plain `usize` values. The range is half-open, so an empty
/// range (`len == 0`) contains no addresses and overlaps nothing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddrRange {
    pub base: usize,
    pub len: usize,
}

impl AddrRange {
    #[inline]
    pub const fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    /// Range for a pointer/length pair as handed over by the runtime.
    #[inline]
    pub fn from_ptr(ptr: *const u8, len: usize) -> Self {
        Self::new(ptr as usize, len)
    }

    /// One past the last address, or `None` if the range wraps the address space.
    #[inline]
    pub const fn checked_end(&self) -> Option<usize> {
        self.base.checked_add(self.len)
    }

    /// One past the last address. Saturates on overflow.
    #[inline]
    pub const fn end(&self) -> usize {
        self.base.saturating_add(self.len)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.base as *mut u8
    }

    /// True if `other` lies entirely within `self`.
    #[inline]
    pub const fn contains(&self, other: &AddrRange) -> bool {
        match other.checked_end() {
            Some(end) => other.base >= self.base && end <= self.end(),
            None => false,
        }
    }

    /// True if the two ranges share at least one address.
    #[inline]
    pub const fn overlaps(&self, other: &AddrRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.base < other.end() && other.base < self.end()
    }
}

impl fmt::Debug for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x}) ({} bytes)", self.base, self.end(), self.len)
    }
}

/// Round `value` up to the next multiple of `align` (a power of two).
/// Returns `None` on overflow.
#[inline]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Round `value` down to a multiple of `align` (a power of two).
#[inline]
pub const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}
