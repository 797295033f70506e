//! Operation counters for a [`FlatMemory`](crate::FlatMemory) instance.
//!
//! All counters use `Relaxed` ordering. They are observational only; the pool
//! lock provides the ordering guarantees for correctness. Counters are bumped
//! through [`stat_inc!`](crate::stat_inc) / [`stat_add!`](crate::stat_add),
//! which compile to nothing without the `stats` feature, so a build without it
//! always reports zeros.
//!
//! Individual counter loads are atomic but a [`StatsSnapshot`] as a whole is
//! not globally consistent with concurrent callers.

use core::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct OpStats {
    /// Successful `alloc` calls.
    pub alloc_count: AtomicU64,
    /// Successful `free` calls.
    pub free_count: AtomicU64,
    /// Successful `reserve` calls.
    pub reserve_count: AtomicU64,
    /// Successful `map` calls.
    pub map_count: AtomicU64,
    /// `unused` hints.
    pub unused_count: AtomicU64,
    /// `used` hints.
    pub used_count: AtomicU64,
    /// `fault` calls.
    pub fault_count: AtomicU64,
    /// Requests refused with a resource-exhaustion error.
    pub oom_count: AtomicU64,
    /// Bytes zero-filled when claiming free space.
    pub zeroed_bytes: AtomicU64,
}

impl OpStats {
    pub const fn new() -> Self {
        Self {
            alloc_count: AtomicU64::new(0),
            free_count: AtomicU64::new(0),
            reserve_count: AtomicU64::new(0),
            map_count: AtomicU64::new(0),
            unused_count: AtomicU64::new(0),
            used_count: AtomicU64::new(0),
            fault_count: AtomicU64::new(0),
            oom_count: AtomicU64::new(0),
            zeroed_bytes: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            alloc_count: self.alloc_count.load(Ordering::Relaxed),
            free_count: self.free_count.load(Ordering::Relaxed),
            reserve_count: self.reserve_count.load(Ordering::Relaxed),
            map_count: self.map_count.load(Ordering::Relaxed),
            unused_count: self.unused_count.load(Ordering::Relaxed),
            used_count: self.used_count.load(Ordering::Relaxed),
            fault_count: self.fault_count.load(Ordering::Relaxed),
            oom_count: self.oom_count.load(Ordering::Relaxed),
            zeroed_bytes: self.zeroed_bytes.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of an instance's operation counters.
///
/// Obtain one with [`FlatMemory::stats`](crate::FlatMemory::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub alloc_count: u64,
    pub free_count: u64,
    pub reserve_count: u64,
    pub map_count: u64,
    pub unused_count: u64,
    pub used_count: u64,
    pub fault_count: u64,
    /// Requests refused with a resource-exhaustion error.
    pub oom_count: u64,
    /// Bytes zero-filled when claiming free space.
    pub zeroed_bytes: u64,
}
