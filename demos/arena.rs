//! Grow a heap arena the way a runtime would on an MMU-less target: reserve
//! one large range up front, map it in chunks as the heap grows, and watch
//! the per-class accounting.
//!
//! `cargo run --example arena`. Every primitive logs at debug level.

use rtsysmem::{Accounting, FlatMemory, MemClass, MemoryPrimitives, Pool};
use std::ptr;
use tracing::Level;

static ACCOUNTING: Accounting = Accounting::new();

const ARENA_CHUNK: usize = 64 * 1024;
const ARENA_CHUNKS: usize = 8;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .init();

    let Some(pool) = Pool::hosted_default() else {
        eprintln!("no OS backing available for a hosted pool");
        std::process::exit(1);
    };
    let mem = FlatMemory::new(pool, &ACCOUNTING);

    // Metadata that lives outside the arena.
    let spans = mem
        .alloc(4096, MemClass::SpanMeta)
        .expect("span metadata fits in a fresh pool");

    let arena = mem
        .reserve(ptr::null_mut(), ARENA_CHUNK * ARENA_CHUNKS)
        .expect("arena reservation fits in a fresh pool");
    println!(
        "reserved {} bytes at {:p} (reserved = {})",
        arena.len,
        arena.base.as_ptr(),
        arena.reserved
    );

    for k in 0..ARENA_CHUNKS / 2 {
        let chunk = unsafe { arena.base.as_ptr().add(k * ARENA_CHUNK) };
        mem.map(chunk, ARENA_CHUNK, arena.reserved, MemClass::Heap)
            .expect("mapping inside a reservation only fails on bookkeeping exhaustion");
    }

    // The scavenger hands a chunk back and the allocator picks it up again.
    let second = unsafe { arena.base.as_ptr().add(ARENA_CHUNK) };
    mem.unused(second, ARENA_CHUNK);
    mem.used(second, ARENA_CHUNK);

    println!("accounting: {:?}", ACCOUNTING.snapshot());
    println!("usage:      {:?}", mem.usage());
    println!("lock spins: {}", mem.lock_contention());

    match mem.alloc(mem.pool_range().len, MemClass::Other) {
        Ok(_) => unreachable!("the pool is partly claimed"),
        Err(e) => println!("oversized request refused: {e}"),
    }

    for k in 0..ARENA_CHUNKS / 2 {
        let chunk = unsafe { arena.base.as_ptr().add(k * ARENA_CHUNK) };
        mem.free(chunk, ARENA_CHUNK, MemClass::Heap);
    }
    let tail = unsafe { arena.base.as_ptr().add(ARENA_CHUNKS / 2 * ARENA_CHUNK) };
    mem.free(tail, ARENA_CHUNKS / 2 * ARENA_CHUNK, MemClass::Heap);
    mem.free(spans.as_ptr(), 4096, MemClass::SpanMeta);

    println!("after teardown: {:?}", mem.usage());
    assert_eq!(ACCOUNTING.total(), 0);
}
