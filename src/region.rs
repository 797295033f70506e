//! Bookkeeping of claimed pool regions.
//!
//! The table holds every claimed region in address order. Free space is never
//! stored: it is the gaps between consecutive regions (and the pool edges), so
//! releasing a region coalesces it with its free neighbours for free.
//!
//! Placement is address-ordered first-fit: the lowest gap large enough wins.
//! Every region footprint is `MIN_ALIGN`-aligned and a multiple of
//! `MIN_ALIGN`, so every gap is too.
//!
//! The table is a fixed-capacity sorted array. It lives inside the pool
//! handle rather than inside pool memory, so a stray write into a returned
//! block can never corrupt it. The array must be protected by the owner's
//! lock; nothing here synchronises.

use crate::accounting::MemClass;
use crate::config::MAX_REGIONS;
use crate::error::{Result, SysError};
use crate::range::AddrRange;

/// What a claimed region is currently used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    /// Claimed by `alloc` or an unreserved `map`; charged to `class`.
    Allocated { class: MemClass },
    /// An unmapped piece of the reservation that started at `origin`.
    Reserved { origin: usize },
    /// Mapped out of the reservation that started at `origin`; charged to `class`.
    Mapped { origin: usize, class: MemClass },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// Aligned extent the region occupies in the pool.
    pub footprint: AddrRange,
    /// Size the caller asked for; `free` must repeat it exactly.
    pub size: usize,
    pub kind: RegionKind,
}

impl Region {
    const EMPTY: Region = Region {
        footprint: AddrRange::new(0, 0),
        size: 0,
        kind: RegionKind::Reserved { origin: 0 },
    };

    #[inline]
    pub fn base(&self) -> usize {
        self.footprint.base
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.footprint.end()
    }

    /// Class charged for this region, if any.
    pub fn class(&self) -> Option<MemClass> {
        match self.kind {
            RegionKind::Allocated { class } | RegionKind::Mapped { class, .. } => Some(class),
            RegionKind::Reserved { .. } => None,
        }
    }
}

pub struct RegionTable {
    pool: AddrRange,
    len: usize,
    slots: [Region; MAX_REGIONS],
}

impl RegionTable {
    pub const fn new(pool: AddrRange) -> Self {
        Self {
            pool,
            len: 0,
            slots: [Region::EMPTY; MAX_REGIONS],
        }
    }

    #[inline]
    pub fn pool(&self) -> AddrRange {
        self.pool
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, idx: usize) -> &Region {
        &self.regions()[idx]
    }

    #[inline]
    pub fn regions(&self) -> &[Region] {
        &self.slots[..self.len]
    }

    /// Index of the first region whose base is >= `addr`.
    #[inline]
    fn lower_bound(&self, addr: usize) -> usize {
        self.regions().partition_point(|r| r.base() < addr)
    }

    /// Free gaps in address order, as `(base, len)` ranges.
    pub fn gaps(&self) -> impl Iterator<Item = AddrRange> + '_ {
        let pool_end = self.pool.end();
        let mut cursor = self.pool.base;
        let mut idx = 0;
        core::iter::from_fn(move || {
            while idx <= self.len {
                let next_start = if idx < self.len {
                    self.slots[idx].base()
                } else {
                    pool_end
                };
                let next_cursor = if idx < self.len {
                    self.slots[idx].end()
                } else {
                    pool_end
                };
                let gap = AddrRange::new(cursor, next_start - cursor);
                cursor = next_cursor;
                idx += 1;
                if !gap.is_empty() {
                    return Some(gap);
                }
            }
            None
        })
    }

    /// First-fit: base of the lowest gap with room for `footprint` bytes.
    pub fn find_gap(&self, footprint: usize) -> Option<usize> {
        self.gaps().find(|g| g.len >= footprint).map(|g| g.base)
    }

    pub fn largest_gap(&self) -> usize {
        self.gaps().map(|g| g.len).max().unwrap_or(0)
    }

    pub fn free_bytes(&self) -> usize {
        self.gaps().map(|g| g.len).sum()
    }

    /// True if `range` lies in the pool and touches no claimed region.
    pub fn is_free(&self, range: &AddrRange) -> bool {
        if !self.pool.contains(range) {
            return false;
        }
        let idx = self.lower_bound(range.base);
        let left_ok = idx == 0 || self.slots[idx - 1].end() <= range.base;
        let right_ok = idx == self.len || self.slots[idx].base() >= range.end();
        left_ok && right_ok
    }

    /// Index of the region starting exactly at `base`.
    pub fn find_exact(&self, base: usize) -> Option<usize> {
        let idx = self.lower_bound(base);
        (idx < self.len && self.slots[idx].base() == base).then_some(idx)
    }

    /// Index of the single region whose footprint contains all of `range`.
    pub fn find_covering(&self, range: &AddrRange) -> Option<usize> {
        let idx = self.regions().partition_point(|r| r.base() <= range.base);
        if idx == 0 {
            return None;
        }
        let idx = idx - 1;
        self.slots[idx].footprint.contains(range).then_some(idx)
    }

    /// Regions sharing at least one address with `range`.
    pub fn overlapping<'a>(&'a self, range: &'a AddrRange) -> impl Iterator<Item = &'a Region> + 'a {
        let start = self.lower_bound(range.base).saturating_sub(1);
        self.regions()[start..]
            .iter()
            .take_while(move |r| r.base() < range.end())
            .filter(move |r| r.footprint.overlaps(range))
    }

    /// True if every address of `range` belongs to some claimed region.
    pub fn is_covered(&self, range: &AddrRange) -> bool {
        let mut cursor = range.base;
        for r in self.overlapping(range) {
            if r.base() > cursor {
                return false;
            }
            cursor = cursor.max(r.end());
        }
        cursor >= range.end()
    }

    /// Record a new region. The caller guarantees its footprint is free.
    pub fn insert(&mut self, region: Region) -> Result<usize> {
        self.ensure_room(1)?;
        let idx = self.lower_bound(region.base());
        debug_assert!(self.is_free(&region.footprint));
        self.slots.copy_within(idx..self.len, idx + 1);
        self.slots[idx] = region;
        self.len += 1;
        Ok(idx)
    }

    /// Drop the region at `idx`; its footprint becomes part of a gap.
    pub fn remove(&mut self, idx: usize) -> Region {
        let region = self.slots[idx];
        self.slots.copy_within(idx + 1..self.len, idx);
        self.len -= 1;
        region
    }

    /// Carve `mapped` out of the reserved piece at `idx`, leaving the
    /// unmapped remainder on either side as reserved pieces.
    ///
    /// Fails without touching the table if there is no room for the pieces.
    pub fn split_reserved(&mut self, idx: usize, mapped: Region) -> Result<()> {
        let piece = self.slots[idx];
        let RegionKind::Reserved { origin } = piece.kind else {
            unreachable!("split_reserved on a non-reserved region");
        };
        debug_assert!(piece.footprint.contains(&mapped.footprint));

        let left_len = mapped.base() - piece.base();
        let right_len = piece.end() - mapped.end();
        let extra = usize::from(left_len > 0) + usize::from(right_len > 0);
        self.ensure_room(extra)?;

        let mut pieces = [Region::EMPTY; 3];
        let mut n = 0;
        if left_len > 0 {
            pieces[n] = Region {
                footprint: AddrRange::new(piece.base(), left_len),
                size: left_len,
                kind: RegionKind::Reserved { origin },
            };
            n += 1;
        }
        pieces[n] = mapped;
        n += 1;
        if right_len > 0 {
            let offset = mapped.end() - piece.base();
            pieces[n] = Region {
                footprint: AddrRange::new(mapped.end(), right_len),
                // The tail keeps whatever part of the requested size it covered.
                size: piece.size.checked_sub(offset).unwrap_or(right_len),
                kind: RegionKind::Reserved { origin },
            };
            n += 1;
        }

        self.slots.copy_within(idx + 1..self.len, idx + n);
        self.slots[idx..idx + n].copy_from_slice(&pieces[..n]);
        self.len += n - 1;
        Ok(())
    }

    /// Sum of all region footprints.
    pub fn claimed_bytes(&self) -> usize {
        self.regions().iter().map(|r| r.footprint.len).sum()
    }

    fn ensure_room(&self, extra: usize) -> Result<()> {
        if self.len + extra > MAX_REGIONS {
            return Err(SysError::BookkeepingFull {
                capacity: MAX_REGIONS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    const POOL: AddrRange = AddrRange::new(0x10_0000, 0x1000);

    fn allocated(base: usize, len: usize) -> Region {
        Region {
            footprint: AddrRange::new(base, len),
            size: len,
            kind: RegionKind::Allocated {
                class: MemClass::Heap,
            },
        }
    }

    fn reserved(base: usize, len: usize) -> Region {
        Region {
            footprint: AddrRange::new(base, len),
            size: len,
            kind: RegionKind::Reserved { origin: base },
        }
    }

    #[test]
    fn test_empty_table_is_one_gap() {
        let table = RegionTable::new(POOL);
        let gaps: Vec<_> = table.gaps().collect();
        assert_eq!(gaps, [POOL]);
        assert_eq!(table.find_gap(0x1000), Some(POOL.base));
        assert_eq!(table.find_gap(0x1001), None);
        assert_eq!(table.largest_gap(), 0x1000);
    }

    #[test]
    fn test_first_fit_picks_lowest_gap() {
        let mut table = RegionTable::new(POOL);
        table.insert(allocated(POOL.base + 0x100, 0x100)).unwrap();
        table.insert(allocated(POOL.base + 0x400, 0x100)).unwrap();

        // Gaps: [0, 0x100), [0x200, 0x400), [0x500, 0x1000)
        assert_eq!(table.find_gap(0x100), Some(POOL.base));
        assert_eq!(table.find_gap(0x180), Some(POOL.base + 0x200));
        assert_eq!(table.find_gap(0x300), Some(POOL.base + 0x500));
        assert_eq!(table.largest_gap(), 0xb00);
        assert_eq!(table.free_bytes(), 0x1000 - 0x200);
    }

    #[test]
    fn test_insert_keeps_address_order() {
        let mut table = RegionTable::new(POOL);
        for off in [0x800, 0x100, 0x400, 0x0] {
            table.insert(allocated(POOL.base + off, 0x40)).unwrap();
        }
        let bases: Vec<_> = table.regions().iter().map(|r| r.base() - POOL.base).collect();
        assert_eq!(bases, [0x0, 0x100, 0x400, 0x800]);
    }

    #[test]
    fn test_remove_coalesces_gap() {
        let mut table = RegionTable::new(POOL);
        table.insert(allocated(POOL.base, 0x100)).unwrap();
        let mid = table.insert(allocated(POOL.base + 0x100, 0x100)).unwrap();
        table.insert(allocated(POOL.base + 0x200, 0x100)).unwrap();

        table.remove(mid);
        assert_eq!(table.find_gap(0x100), Some(POOL.base + 0x100));
        table.remove(0);
        assert_eq!(table.find_gap(0x200), Some(POOL.base));
    }

    #[test]
    fn test_is_free_and_is_covered() {
        let mut table = RegionTable::new(POOL);
        table.insert(allocated(POOL.base + 0x100, 0x100)).unwrap();
        table.insert(allocated(POOL.base + 0x200, 0x100)).unwrap();

        assert!(table.is_free(&AddrRange::new(POOL.base, 0x100)));
        assert!(!table.is_free(&AddrRange::new(POOL.base, 0x110)));
        assert!(!table.is_free(&AddrRange::new(POOL.base + 0xff0, 0x20)));

        assert!(table.is_covered(&AddrRange::new(POOL.base + 0x180, 0x100)));
        assert!(!table.is_covered(&AddrRange::new(POOL.base + 0x280, 0x100)));
        assert!(!table.is_covered(&AddrRange::new(POOL.base + 0xf0, 0x20)));
    }

    #[test]
    fn test_find_exact_and_covering() {
        let mut table = RegionTable::new(POOL);
        table.insert(reserved(POOL.base + 0x200, 0x400)).unwrap();

        assert_eq!(table.find_exact(POOL.base + 0x200), Some(0));
        assert_eq!(table.find_exact(POOL.base + 0x210), None);
        assert_eq!(
            table.find_covering(&AddrRange::new(POOL.base + 0x300, 0x100)),
            Some(0)
        );
        assert_eq!(
            table.find_covering(&AddrRange::new(POOL.base + 0x500, 0x200)),
            None
        );
    }

    #[test]
    fn test_split_reserved_middle() {
        let mut table = RegionTable::new(POOL);
        table.insert(reserved(POOL.base, 0x400)).unwrap();

        let mapped = Region {
            footprint: AddrRange::new(POOL.base + 0x100, 0x100),
            size: 0xf8,
            kind: RegionKind::Mapped {
                origin: POOL.base,
                class: MemClass::Heap,
            },
        };
        table.split_reserved(0, mapped).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0).footprint, AddrRange::new(POOL.base, 0x100));
        assert_eq!(*table.get(1), mapped);
        assert_eq!(
            table.get(2).footprint,
            AddrRange::new(POOL.base + 0x200, 0x200)
        );
        assert_eq!(table.claimed_bytes(), 0x400);
    }

    #[test]
    fn test_split_reserved_exact_leaves_no_pieces() {
        let mut table = RegionTable::new(POOL);
        table.insert(reserved(POOL.base, 0x100)).unwrap();
        let mapped = Region {
            footprint: AddrRange::new(POOL.base, 0x100),
            size: 0x100,
            kind: RegionKind::Mapped {
                origin: POOL.base,
                class: MemClass::Stack,
            },
        };
        table.split_reserved(0, mapped).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).class(), Some(MemClass::Stack));
    }

    #[test]
    fn test_full_table_refuses_insert() {
        let mut table = RegionTable::new(AddrRange::new(0, MAX_REGIONS * 0x20));
        for i in 0..MAX_REGIONS {
            table.insert(allocated(i * 0x20, 0x10)).unwrap();
        }
        let err = table.insert(allocated(0x10, 0x10)).unwrap_err();
        assert_eq!(
            err,
            SysError::BookkeepingFull {
                capacity: MAX_REGIONS
            }
        );
        assert_eq!(table.len(), MAX_REGIONS);
    }
}
