//! The seven memory primitives the runtime's arena manager calls.
//!
//! Every backend, with or without virtual memory, provides the same
//! contracts; only the cost of each call differs. Resource exhaustion comes
//! back as a [`SysError`](crate::SysError). Invalid caller state (double
//! free, size mismatch, map of an unreserved range, ...) never returns: the
//! backend terminates the process with a diagnostic naming the primitive and
//! range.

use crate::accounting::MemClass;
use crate::error::Result;
use crate::range::AddrRange;
use core::ptr::NonNull;

/// Result of a successful [`MemoryPrimitives::reserve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub base: NonNull<u8>,
    pub len: usize,
    /// Pass this as `reserved` to [`MemoryPrimitives::map`]. On backends
    /// without lazy commit it is always `true` and means the range is
    /// already committed, so `map` only has to do the accounting.
    pub reserved: bool,
}

impl Reservation {
    #[inline]
    pub fn range(&self) -> AddrRange {
        AddrRange::from_ptr(self.base.as_ptr(), self.len)
    }
}

pub trait MemoryPrimitives {
    /// `size` bytes of zeroed, immediately usable memory, charged to `class`.
    fn alloc(&self, size: usize, class: MemClass) -> Result<NonNull<u8>>;

    /// Return a range obtained from `alloc` or `map` and uncharge `class`.
    fn free(&self, ptr: *mut u8, size: usize, class: MemClass);

    /// Claim address space, preferably at `hint` (null for no preference).
    fn reserve(&self, hint: *mut u8, size: usize) -> Result<Reservation>;

    /// Commit a range and charge `class`. With `reserved` the range must lie
    /// inside an earlier reservation; without it the exact range is claimed.
    fn map(&self, ptr: *mut u8, size: usize, reserved: bool, class: MemClass) -> Result<()>;

    /// The contents of the range are no longer needed.
    fn unused(&self, ptr: *mut u8, size: usize);

    /// The contents of the range are needed again.
    fn used(&self, ptr: *mut u8, size: usize);

    /// Commit a reserved range now rather than on first touch.
    fn fault(&self, ptr: *mut u8, size: usize);
}
