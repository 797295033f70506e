//! Contract violations: the unrecoverable half of the error model.
//!
//! A double free, a size mismatch, a map of an unreserved range and the like
//! mean the caller's memory model is already inconsistent with the pool. There
//! is no local recovery. [`contract_violation`] logs the diagnostic, then
//! terminates the whole process in every build: `std::process::abort` with
//! the `std` feature. Without it, a panic whose unwinding runs into a second
//! panic, which the runtime turns into an abort, so neither a dying worker
//! thread nor `catch_unwind` can absorb it. Under `panic = "abort"` the first
//! panic already ends the process.

use crate::accounting::MemClass;
use crate::range::AddrRange;
use core::fmt;

/// The primitive that detected the violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Alloc,
    Free,
    Reserve,
    Map,
    Unused,
    Used,
    Fault,
}

impl Primitive {
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Alloc => "SysAlloc",
            Primitive::Free => "SysFree",
            Primitive::Reserve => "SysReserve",
            Primitive::Map => "SysMap",
            Primitive::Unused => "SysUnused",
            Primitive::Used => "SysUsed",
            Primitive::Fault => "SysFault",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What exactly was wrong with the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    /// Zero-length request.
    ZeroSize,
    /// `base + len` overflows the address space.
    Wraps,
    /// The range is not entirely inside the pool.
    OutsidePool { pool: AddrRange },
    /// A fixed-address request whose base is not on the pool's alignment.
    Misaligned { align: usize },
    /// No claimed region starts at this address.
    NotAllocated,
    /// A region starts here, but was claimed with a different size.
    SizeMismatch { recorded: usize },
    /// A region starts here, but was charged to a different class.
    ClassMismatch { recorded: MemClass },
    /// A reserved-flagged map that does not fall inside one reservation.
    NotReserved,
    /// The range overlaps a mapping already made inside the reservation.
    AlreadyMapped,
    /// An unreserved map over a range that is already claimed.
    RangeInUse,
    /// A hint or fault over memory that nobody has claimed.
    Unclaimed,
    /// The class counter holds fewer bytes than are being released.
    AccountingUnderflow { class: MemClass },
    /// Called through the C ABI before a pool was installed.
    NoPool,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroSize => f.write_str("zero-length range"),
            Self::Wraps => f.write_str("range wraps the address space"),
            Self::OutsidePool { pool } => write!(f, "range lies outside the pool {pool}"),
            Self::Misaligned { align } => write!(f, "base is not {align}-byte aligned"),
            Self::NotAllocated => f.write_str("range was never allocated or is already freed"),
            Self::SizeMismatch { recorded } => {
                write!(f, "size does not match the original allocation of {recorded} bytes")
            }
            Self::ClassMismatch { recorded } => {
                write!(f, "accounting class does not match the original class {recorded}")
            }
            Self::NotReserved => f.write_str("range is not inside a reservation"),
            Self::AlreadyMapped => f.write_str("range overlaps an existing mapping"),
            Self::RangeInUse => f.write_str("range overlaps memory that is already claimed"),
            Self::Unclaimed => f.write_str("range covers unclaimed memory"),
            Self::AccountingUnderflow { class } => {
                write!(f, "{class} counter would go negative")
            }
            Self::NoPool => f.write_str("no memory pool installed"),
        }
    }
}

/// A contract violation: which primitive, which range, and why.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Violation {
    pub primitive: Primitive,
    pub range: AddrRange,
    pub kind: ViolationKind,
}

impl Violation {
    pub const fn new(primitive: Primitive, range: AddrRange, kind: ViolationKind) -> Self {
        Self {
            primitive,
            range,
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runtime: {} {}: {}",
            self.primitive, self.range, self.kind
        )
    }
}

/// Panics when dropped. Dropped only while unwinding from a violation, which
/// makes that unwind a double panic.
#[cfg(not(feature = "std"))]
struct AbortOnUnwind;

#[cfg(not(feature = "std"))]
impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        panic!("memory contract violated, aborting");
    }
}

/// Report `v` and terminate the process. Never returns.
#[cold]
#[inline(never)]
pub fn contract_violation(v: Violation) -> ! {
    tracing::error!(
        primitive = v.primitive.name(),
        range = %v.range,
        "memory contract violation: {}",
        v.kind
    );

    cfg_if::cfg_if! {
        if #[cfg(feature = "std")] {
            std::eprintln!("fatal error: {v}");
            std::process::abort()
        } else {
            let _abort = AbortOnUnwind;
            panic!("fatal error: {v}")
        }
    }
}
