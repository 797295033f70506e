//! Recoverable failures reported to the caller.
//!
//! Only resource exhaustion is recoverable. Invalid caller state never comes
//! back as an error; it terminates through [`crate::fatal`].

use thiserror::Error;

/// The pool could not satisfy a request.
///
/// The caller decides what happens next: grow the pool if it can, run a
/// collection and retry, or escalate to a fatal error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SysError {
    /// No free gap in the pool is large enough.
    #[error("out of memory: requested {requested} bytes, largest free block {largest_free} bytes")]
    OutOfMemory {
        /// Bytes the caller asked for.
        requested: usize,
        /// Largest contiguous free block at the time of the request.
        largest_free: usize,
    },
    /// The region table has no room to record another claimed range.
    #[error("region table full: {capacity} regions already tracked")]
    BookkeepingFull {
        /// Fixed capacity of the table (`config::MAX_REGIONS`).
        capacity: usize,
    },
}

pub type Result<T> = core::result::Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display() {
        let e = SysError::OutOfMemory {
            requested: 2048,
            largest_free: 1024,
        };
        assert_eq!(
            e.to_string(),
            "out of memory: requested 2048 bytes, largest free block 1024 bytes"
        );
        let e = SysError::BookkeepingFull { capacity: 4 };
        assert_eq!(e.to_string(), "region table full: 4 regions already tracked");
    }
}
