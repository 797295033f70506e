//! Per-class byte accounting for memory obtained through the primitives.
//!
//! An [`Accounting`] is owned by whoever bootstraps the runtime and handed to
//! [`FlatMemory`](crate::FlatMemory) by reference, so independent instances
//! can coexist (tests, several pools). Updates happen while the pool lock is
//! held; reads are lock-free `Relaxed` loads and may lag concurrent writers.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Which counter a primitive call charges.
///
/// Mirrors the memory statistics a runtime keeps for memory it obtains from
/// the system: heap arenas, goroutine stacks, span/cache metadata, profiling
/// buckets, GC metadata, and everything else.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum MemClass {
    Heap = 0,
    Stack = 1,
    SpanMeta = 2,
    CacheMeta = 3,
    ProfBuckets = 4,
    GcMeta = 5,
    Other = 6,
}

/// Number of accounting classes.
pub const NUM_CLASSES: usize = 7;

impl MemClass {
    pub const ALL: [MemClass; NUM_CLASSES] = [
        MemClass::Heap,
        MemClass::Stack,
        MemClass::SpanMeta,
        MemClass::CacheMeta,
        MemClass::ProfBuckets,
        MemClass::GcMeta,
        MemClass::Other,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Class for a raw selector, as passed across the C ABI.
    pub const fn from_index(idx: usize) -> Option<MemClass> {
        if idx < NUM_CLASSES {
            Some(Self::ALL[idx])
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MemClass::Heap => "heap",
            MemClass::Stack => "stack",
            MemClass::SpanMeta => "span-meta",
            MemClass::CacheMeta => "cache-meta",
            MemClass::ProfBuckets => "prof-buckets",
            MemClass::GcMeta => "gc-meta",
            MemClass::Other => "other",
        }
    }
}

impl fmt::Display for MemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bytes currently held from the pool, one counter per [`MemClass`].
///
/// Starts at zero and is never reset. Incremented on `alloc`/`map`,
/// decremented on `free`.
pub struct Accounting {
    counters: [AtomicU64; NUM_CLASSES],
}

impl Default for Accounting {
    fn default() -> Self {
        Self::new()
    }
}

impl Accounting {
    pub const fn new() -> Self {
        Self {
            counters: [const { AtomicU64::new(0) }; NUM_CLASSES],
        }
    }

    /// Current byte count for `class`.
    #[inline]
    pub fn get(&self, class: MemClass) -> u64 {
        self.counters[class.index()].load(Ordering::Relaxed)
    }

    /// Sum over all classes. Not globally consistent under concurrent updates.
    pub fn total(&self) -> u64 {
        self.counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    #[inline]
    pub(crate) fn charge(&self, class: MemClass, bytes: usize) {
        self.counters[class.index()].fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Returns false if the counter held fewer than `bytes`; the counter is
    /// left untouched in that case.
    #[inline]
    pub(crate) fn discharge(&self, class: MemClass, bytes: usize) -> bool {
        self.counters[class.index()]
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                cur.checked_sub(bytes as u64)
            })
            .is_ok()
    }

    /// Load every counter and return a [`Snapshot`].
    pub fn snapshot(&self) -> Snapshot {
        let mut bytes = [0u64; NUM_CLASSES];
        for (slot, counter) in bytes.iter_mut().zip(self.counters.iter()) {
            *slot = counter.load(Ordering::Relaxed);
        }
        Snapshot { bytes }
    }
}

impl fmt::Debug for Accounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of an [`Accounting`].
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub bytes: [u64; NUM_CLASSES],
}

impl Snapshot {
    #[inline]
    pub fn get(&self, class: MemClass) -> u64 {
        self.bytes[class.index()]
    }

    pub fn total(&self) -> u64 {
        self.bytes.iter().sum()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for class in MemClass::ALL {
            map.entry(&class.name(), &self.get(class));
        }
        map.finish()
    }
}
