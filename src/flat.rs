//! Memory primitives for targets without virtual memory.
//!
//! One flat physical pool, no page tables, no lazy commit. The primitives map
//! onto pool bookkeeping as follows:
//!
//! - `alloc`: address-ordered first-fit over the free gaps; the footprint is
//!   zeroed and the class is charged the requested size.
//! - `reserve`: eager. Claims and zeroes the range immediately (at the hint
//!   if that exact range is free) and reports `reserved = true`, meaning
//!   "already committed". Nothing is charged until the range is mapped.
//! - `map` with `reserved`: accounting only. The range must sit inside one
//!   reservation and not overlap an earlier mapping of it.
//! - `map` without `reserved`: `alloc` at exactly the given address, which
//!   must be free.
//! - `free`: the exact block from `alloc`/`map` (same base, size, class), or
//!   an unmapped reservation piece. The footprint rejoins the free gaps.
//! - `unused`, `used`, `fault`: nothing to reclaim or commit, so they never
//!   touch the range. Unlike a plain no-op they still validate it: a hint
//!   or fault over memory outside the pool or not entirely claimed is a
//!   contract violation and terminates the process. Size 0 is accepted.
//!
//! Region footprints are `MIN_ALIGN`-aligned and rounded up to a multiple of
//! it; callers always see and repeat their requested sizes.

use crate::accounting::{Accounting, MemClass};
use crate::config::{MAX_REGIONS, MIN_ALIGN};
use crate::error::{Result, SysError};
use crate::fatal::{self, Primitive, Violation, ViolationKind};
use crate::pool::Pool;
use crate::primitives::{MemoryPrimitives, Reservation};
use crate::range::{AddrRange, align_up};
use crate::region::{Region, RegionKind, RegionTable};
use crate::stats::{OpStats, StatsSnapshot};
use crate::sync::SpinMutex;
use crate::{stat_add, stat_inc};
use core::fmt;
use core::ptr::{self, NonNull};
use tracing::{debug, trace, warn};

/// Why a locked operation could not complete.
enum Failure {
    Exhausted(SysError),
    Violated(ViolationKind),
}

impl From<SysError> for Failure {
    fn from(e: SysError) -> Self {
        Failure::Exhausted(e)
    }
}

impl From<ViolationKind> for Failure {
    fn from(kind: ViolationKind) -> Self {
        Failure::Violated(kind)
    }
}

/// Pool usage computed under the lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolUsage {
    /// Usable bytes in the pool.
    pub capacity: usize,
    /// Bytes covered by claimed region footprints.
    pub claimed: usize,
    /// Bytes in free gaps.
    pub free: usize,
    /// Largest single free gap.
    pub largest_free: usize,
    /// Claimed regions currently tracked.
    pub regions: usize,
    /// Bytes reserved but not yet mapped.
    pub reserved_unmapped: usize,
}

/// The memory primitive layer over one fixed pool.
pub struct FlatMemory<'a> {
    pool: Pool,
    regions: SpinMutex<RegionTable>,
    accounting: &'a Accounting,
    stats: OpStats,
}

impl<'a> FlatMemory<'a> {
    /// Take ownership of `pool` and charge successful requests to `accounting`.
    pub fn new(pool: Pool, accounting: &'a Accounting) -> Self {
        let range = pool.range();
        tracing::info!(
            pool = %range,
            align = MIN_ALIGN,
            max_regions = MAX_REGIONS,
            hosted = pool.is_hosted(),
            "memory pool ready"
        );
        Self {
            regions: SpinMutex::new(RegionTable::new(range)),
            pool,
            accounting,
            stats: OpStats::new(),
        }
    }

    #[inline]
    pub fn pool_range(&self) -> AddrRange {
        self.pool.range()
    }

    #[inline]
    pub fn accounting(&self) -> &'a Accounting {
        self.accounting
    }

    /// Operation counters. All zero unless built with the `stats` feature.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Times a caller had to spin for the bookkeeping lock.
    pub fn lock_contention(&self) -> u64 {
        self.regions.contended()
    }

    pub fn usage(&self) -> PoolUsage {
        let table = self.regions.lock();
        let reserved_unmapped = table
            .regions()
            .iter()
            .filter(|r| matches!(r.kind, RegionKind::Reserved { .. }))
            .map(|r| r.footprint.len)
            .sum();
        PoolUsage {
            capacity: table.pool().len,
            claimed: table.claimed_bytes(),
            free: table.free_bytes(),
            largest_free: table.largest_gap(),
            regions: table.len(),
            reserved_unmapped,
        }
    }

    fn out_of_memory(table: &RegionTable, size: usize) -> SysError {
        SysError::OutOfMemory {
            requested: size,
            largest_free: table.largest_gap(),
        }
    }

    /// Pick a base for `len` bytes: the hint if that exact range is free,
    /// otherwise the first fit.
    fn place(table: &RegionTable, hint: Option<usize>, len: usize) -> Option<usize> {
        let hinted = hint.filter(|&h| {
            h % MIN_ALIGN == 0
                && AddrRange::new(h, len).checked_end().is_some()
                && table.is_free(&AddrRange::new(h, len))
        });
        hinted.or_else(|| table.find_gap(len))
    }

    /// Claim a fresh region out of free space. Returns its footprint.
    fn claim(
        table: &mut RegionTable,
        hint: Option<usize>,
        size: usize,
        kind: impl FnOnce(usize) -> RegionKind,
    ) -> Result<AddrRange> {
        let len = align_up(size, MIN_ALIGN).ok_or_else(|| Self::out_of_memory(table, size))?;
        let base = Self::place(table, hint, len).ok_or_else(|| Self::out_of_memory(table, size))?;
        let footprint = AddrRange::new(base, len);
        table.insert(Region {
            footprint,
            size,
            kind: kind(base),
        })?;
        Ok(footprint)
    }

    fn release(
        &self,
        table: &mut RegionTable,
        range: AddrRange,
        class: MemClass,
    ) -> core::result::Result<Region, ViolationKind> {
        if range.is_empty() {
            return Err(ViolationKind::ZeroSize);
        }
        if range.checked_end().is_none() {
            return Err(ViolationKind::Wraps);
        }
        let Some(idx) = table.find_exact(range.base) else {
            let pool = table.pool();
            return Err(if pool.contains(&range) {
                ViolationKind::NotAllocated
            } else {
                ViolationKind::OutsidePool { pool }
            });
        };

        let region = *table.get(idx);
        if region.size != range.len {
            return Err(ViolationKind::SizeMismatch {
                recorded: region.size,
            });
        }
        if let Some(recorded) = region.class() {
            if recorded != class {
                return Err(ViolationKind::ClassMismatch { recorded });
            }
            if !self.accounting.discharge(class, range.len) {
                return Err(ViolationKind::AccountingUnderflow { class });
            }
        }
        Ok(table.remove(idx))
    }

    /// Returns the footprint to zero when the map claimed fresh space.
    fn map_locked(
        &self,
        table: &mut RegionTable,
        range: AddrRange,
        reserved: bool,
        class: MemClass,
    ) -> core::result::Result<Option<AddrRange>, Failure> {
        if range.is_empty() {
            return Err(ViolationKind::ZeroSize.into());
        }
        if range.checked_end().is_none() {
            return Err(ViolationKind::Wraps.into());
        }
        if range.base % MIN_ALIGN != 0 {
            return Err(ViolationKind::Misaligned { align: MIN_ALIGN }.into());
        }
        let len = align_up(range.len, MIN_ALIGN).ok_or(ViolationKind::Wraps)?;
        let footprint = AddrRange::new(range.base, len);
        let pool = table.pool();
        if !pool.contains(&footprint) {
            return Err(ViolationKind::OutsidePool { pool }.into());
        }

        if reserved {
            let covering = table.find_covering(&footprint);
            let origin = covering.and_then(|idx| match table.get(idx).kind {
                RegionKind::Reserved { origin } => Some(origin),
                _ => None,
            });
            let (Some(idx), Some(origin)) = (covering, origin) else {
                let mapped = table
                    .overlapping(&footprint)
                    .any(|r| matches!(r.kind, RegionKind::Mapped { .. }));
                return Err(if mapped {
                    ViolationKind::AlreadyMapped
                } else {
                    ViolationKind::NotReserved
                }
                .into());
            };
            table.split_reserved(
                idx,
                Region {
                    footprint,
                    size: range.len,
                    kind: RegionKind::Mapped { origin, class },
                },
            )?;
            self.accounting.charge(class, range.len);
            Ok(None)
        } else {
            if !table.is_free(&footprint) {
                return Err(ViolationKind::RangeInUse.into());
            }
            table.insert(Region {
                footprint,
                size: range.len,
                kind: RegionKind::Allocated { class },
            })?;
            self.accounting.charge(class, range.len);
            Ok(Some(footprint))
        }
    }

    /// Shared body of the three hints: validate, count, do nothing.
    fn hint(&self, primitive: Primitive, ptr: *mut u8, size: usize) {
        if size == 0 {
            return;
        }
        let range = AddrRange::from_ptr(ptr, size);
        let outcome = {
            let table = self.regions.lock();
            let pool = table.pool();
            if range.checked_end().is_none() {
                Err(ViolationKind::Wraps)
            } else if !pool.contains(&range) {
                Err(ViolationKind::OutsidePool { pool })
            } else if !table.is_covered(&range) {
                Err(ViolationKind::Unclaimed)
            } else {
                Ok(())
            }
        };
        if let Err(kind) = outcome {
            fatal::contract_violation(Violation::new(primitive, range, kind));
        }
        trace!(primitive = primitive.name(), range = %range, "hint ignored, no reclaim on this target");
    }

    fn zero(&self, footprint: AddrRange) {
        // SAFETY: the footprint was free pool memory a moment ago and is now
        // claimed for the caller, who has not seen it yet.
        unsafe { ptr::write_bytes(footprint.as_mut_ptr(), 0, footprint.len) };
        stat_add!(self.stats, zeroed_bytes, footprint.len);
    }

    fn refused(&self, primitive: Primitive, size: usize, e: SysError) -> SysError {
        stat_inc!(self.stats, oom_count);
        warn!(primitive = primitive.name(), requested = size, error = %e, "memory request refused");
        e
    }
}

#[inline]
fn block_ptr(base: usize) -> NonNull<u8> {
    // SAFETY: pools never start at address zero (see `Pool`), so no region
    // base is null.
    unsafe { NonNull::new_unchecked(base as *mut u8) }
}

impl MemoryPrimitives for FlatMemory<'_> {
    fn alloc(&self, size: usize, class: MemClass) -> Result<NonNull<u8>> {
        if size == 0 {
            fatal::contract_violation(Violation::new(
                Primitive::Alloc,
                AddrRange::new(0, 0),
                ViolationKind::ZeroSize,
            ));
        }
        let claimed = {
            let mut table = self.regions.lock();
            let claimed = Self::claim(&mut table, None, size, |_| RegionKind::Allocated { class });
            if claimed.is_ok() {
                self.accounting.charge(class, size);
            }
            claimed
        };
        let footprint = claimed.map_err(|e| self.refused(Primitive::Alloc, size, e))?;
        self.zero(footprint);
        stat_inc!(self.stats, alloc_count);
        debug!(range = %footprint, size, class = class.name(), "alloc");
        Ok(block_ptr(footprint.base))
    }

    fn free(&self, ptr: *mut u8, size: usize, class: MemClass) {
        let range = AddrRange::from_ptr(ptr, size);
        let outcome = {
            let mut table = self.regions.lock();
            self.release(&mut table, range, class)
        };
        match outcome {
            Ok(region) => {
                stat_inc!(self.stats, free_count);
                debug!(range = %region.footprint, size, class = class.name(), "free");
            }
            Err(kind) => fatal::contract_violation(Violation::new(Primitive::Free, range, kind)),
        }
    }

    fn reserve(&self, hint: *mut u8, size: usize) -> Result<Reservation> {
        if size == 0 {
            fatal::contract_violation(Violation::new(
                Primitive::Reserve,
                AddrRange::from_ptr(hint, 0),
                ViolationKind::ZeroSize,
            ));
        }
        let hint = (!hint.is_null()).then_some(hint as usize);
        let claimed = {
            let mut table = self.regions.lock();
            Self::claim(&mut table, hint, size, |origin| RegionKind::Reserved { origin })
        };
        let footprint = claimed.map_err(|e| self.refused(Primitive::Reserve, size, e))?;
        self.zero(footprint);
        stat_inc!(self.stats, reserve_count);
        debug!(
            range = %footprint,
            size,
            hint_honoured = hint == Some(footprint.base),
            "reserve (committed eagerly)"
        );
        Ok(Reservation {
            base: block_ptr(footprint.base),
            len: size,
            reserved: true,
        })
    }

    fn map(&self, ptr: *mut u8, size: usize, reserved: bool, class: MemClass) -> Result<()> {
        let range = AddrRange::from_ptr(ptr, size);
        let outcome = {
            let mut table = self.regions.lock();
            self.map_locked(&mut table, range, reserved, class)
        };
        match outcome {
            Ok(fresh) => {
                if let Some(footprint) = fresh {
                    self.zero(footprint);
                }
                stat_inc!(self.stats, map_count);
                debug!(range = %range, reserved, class = class.name(), "map");
                Ok(())
            }
            Err(Failure::Exhausted(e)) => Err(self.refused(Primitive::Map, size, e)),
            Err(Failure::Violated(kind)) => {
                fatal::contract_violation(Violation::new(Primitive::Map, range, kind))
            }
        }
    }

    fn unused(&self, ptr: *mut u8, size: usize) {
        self.hint(Primitive::Unused, ptr, size);
        stat_inc!(self.stats, unused_count);
    }

    fn used(&self, ptr: *mut u8, size: usize) {
        self.hint(Primitive::Used, ptr, size);
        stat_inc!(self.stats, used_count);
    }

    fn fault(&self, ptr: *mut u8, size: usize) {
        self.hint(Primitive::Fault, ptr, size);
        stat_inc!(self.stats, fault_count);
    }
}

impl fmt::Debug for FlatMemory<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMemory")
            .field("pool", &self.pool)
            .field("accounting", self.accounting)
            .finish_non_exhaustive()
    }
}
