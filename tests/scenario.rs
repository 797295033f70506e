//! End-to-end behaviour of the primitives on a small pool.

use rtsysmem::{Accounting, AddrRange, FlatMemory, MemClass, MemoryPrimitives, Pool, SysError};
use std::ptr;

fn pool(size: usize) -> Pool {
    Pool::hosted(size).unwrap()
}

#[test]
fn four_kib_pool_walkthrough() {
    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(4096), &acct);
    assert_eq!(mem.pool_range().len, 4096);

    let a = mem.alloc(1024, MemClass::Heap).unwrap();
    assert_eq!(acct.get(MemClass::Heap), 1024);

    let b = mem.alloc(2048, MemClass::Heap).unwrap();
    assert!(!AddrRange::from_ptr(a.as_ptr(), 1024).overlaps(&AddrRange::from_ptr(b.as_ptr(), 2048)));
    assert_eq!(acct.get(MemClass::Heap), 3072);

    let err = mem.alloc(2048, MemClass::Heap).unwrap_err();
    assert_eq!(
        err,
        SysError::OutOfMemory {
            requested: 2048,
            largest_free: 1024
        }
    );
    assert_eq!(acct.get(MemClass::Heap), 3072);

    mem.free(b.as_ptr(), 2048, MemClass::Heap);
    assert_eq!(acct.get(MemClass::Heap), 1024);

    let c = mem.alloc(2048, MemClass::Heap).unwrap();
    assert_eq!(c, b, "freed space is reused");
    assert_eq!(acct.get(MemClass::Heap), 3072);
}

#[test]
fn free_of_alloc_restores_capacity() {
    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(64 * 1024), &acct);
    for n in [1, 15, 16, 17, 4096, 64 * 1024] {
        let p = mem.alloc(n, MemClass::Other).unwrap();
        mem.free(p.as_ptr(), n, MemClass::Other);
        let q = mem.alloc(n, MemClass::Other).unwrap();
        assert_eq!(p, q);
        mem.free(q.as_ptr(), n, MemClass::Other);
    }
    assert_eq!(acct.total(), 0);
}

#[test]
fn whole_pool_allocation_after_fragmenting() {
    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(16 * 1024), &acct);
    let blocks: Vec<_> = (0..16)
        .map(|_| mem.alloc(1024, MemClass::Heap).unwrap())
        .collect();
    assert!(mem.alloc(1, MemClass::Heap).is_err());

    // Free in an order that leaves holes until the very end.
    for p in blocks.iter().step_by(2) {
        mem.free(p.as_ptr(), 1024, MemClass::Heap);
    }
    assert_eq!(mem.usage().largest_free, 1024);
    for p in blocks.iter().skip(1).step_by(2) {
        mem.free(p.as_ptr(), 1024, MemClass::Heap);
    }

    let all = mem.alloc(16 * 1024, MemClass::Heap).unwrap();
    assert_eq!(all.as_ptr() as usize, mem.pool_range().base);
}

#[test]
fn reserve_then_map_keeps_base() {
    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(64 * 1024), &acct);

    let r = mem.reserve(ptr::null_mut(), 32 * 1024).unwrap();
    assert!(r.reserved, "no lazy commit here: reservations come back committed");
    assert_eq!(r.len, 32 * 1024);
    assert_eq!(acct.total(), 0, "reserving charges nothing");

    mem.map(r.base.as_ptr(), 32 * 1024, r.reserved, MemClass::Heap)
        .unwrap();
    assert_eq!(acct.get(MemClass::Heap), 32 * 1024);

    // Reserved memory is zeroed and writable right away.
    let bytes = unsafe { std::slice::from_raw_parts_mut(r.base.as_ptr(), r.len) };
    assert!(bytes.iter().all(|&b| b == 0));
    bytes.fill(0x11);

    mem.free(r.base.as_ptr(), 32 * 1024, MemClass::Heap);
    assert_eq!(acct.total(), 0);
}

#[test]
fn unreserved_map_lands_at_requested_address() {
    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(64 * 1024), &acct);
    let at = (mem.pool_range().base + 8192) as *mut u8;

    mem.map(at, 4096, false, MemClass::SpanMeta).unwrap();
    assert_eq!(acct.get(MemClass::SpanMeta), 4096);
    let bytes = unsafe { std::slice::from_raw_parts(at, 4096) };
    assert!(bytes.iter().all(|&b| b == 0));

    mem.free(at, 4096, MemClass::SpanMeta);
    assert_eq!(acct.total(), 0);
}

#[test]
fn unused_then_used_preserves_contents() {
    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(64 * 1024), &acct);
    let p = mem.alloc(8192, MemClass::Heap).unwrap().as_ptr();
    for i in 0..8192 {
        unsafe { *p.add(i) = (i % 251) as u8 };
    }

    mem.unused(p, 8192);
    mem.used(p, 8192);
    mem.fault(p, 8192);

    for i in 0..8192 {
        assert_eq!(unsafe { *p.add(i) }, (i % 251) as u8);
    }
    assert_eq!(acct.get(MemClass::Heap), 8192);
    assert_eq!(mem.usage().regions, 1);
}

#[test]
fn independent_instances_do_not_share_accounting() {
    let acct_a = Accounting::new();
    let acct_b = Accounting::new();
    let a = FlatMemory::new(pool(8192), &acct_a);
    let b = FlatMemory::new(pool(8192), &acct_b);

    a.alloc(100, MemClass::Heap).unwrap();
    b.alloc(300, MemClass::Stack).unwrap();

    assert_eq!(acct_a.snapshot().total(), 100);
    assert_eq!(acct_b.get(MemClass::Stack), 300);
    assert_eq!(acct_b.get(MemClass::Heap), 0);
}

#[test]
fn generic_caller_over_trait() {
    fn grow_arena<M: MemoryPrimitives>(m: &M, chunk: usize, n: usize) -> usize {
        let r = m.reserve(ptr::null_mut(), chunk * n).unwrap();
        let mut mapped = 0;
        for k in 0..n {
            let p = unsafe { r.base.as_ptr().add(k * chunk) };
            if m.map(p, chunk, r.reserved, MemClass::Heap).is_ok() {
                mapped += chunk;
            }
        }
        mapped
    }

    let acct = Accounting::new();
    let mem = FlatMemory::new(pool(64 * 1024), &acct);
    assert_eq!(grow_arena(&mem, 4096, 8), 32 * 1024);
    assert_eq!(acct.get(MemClass::Heap), 32 * 1024);
    assert_eq!(mem.usage().reserved_unmapped, 0);
}
