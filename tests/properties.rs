//! Property tests: accounting always matches live bytes, live ranges never
//! overlap, and freeing everything leaves one whole free pool.

use proptest::prelude::*;
use rtsysmem::{Accounting, AddrRange, FlatMemory, MemClass, MemoryPrimitives, Pool};

const POOL_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
enum Op {
    Alloc { size: usize, class: usize },
    Free { pick: usize },
    Hint { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..6000, 0usize..MemClass::ALL.len())
            .prop_map(|(size, class)| Op::Alloc { size, class }),
        2 => any::<usize>().prop_map(|pick| Op::Free { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Hint { pick }),
    ]
}

struct Block {
    ptr: *mut u8,
    size: usize,
    class: MemClass,
}

fn check_invariants(acct: &Accounting, live: &[Block]) -> Result<(), TestCaseError> {
    for class in MemClass::ALL {
        let expected: usize = live.iter().filter(|b| b.class == class).map(|b| b.size).sum();
        prop_assert_eq!(acct.get(class), expected as u64, "class {}", class);
    }
    for (i, a) in live.iter().enumerate() {
        let ra = AddrRange::from_ptr(a.ptr, a.size);
        for b in &live[i + 1..] {
            let rb = AddrRange::from_ptr(b.ptr, b.size);
            prop_assert!(!ra.overlaps(&rb), "{} overlaps {}", ra, rb);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn accounting_matches_live_blocks(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let acct = Accounting::new();
        let mem = FlatMemory::new(Pool::hosted(POOL_SIZE).unwrap(), &acct);
        let mut live: Vec<Block> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc { size, class } => {
                    let class = MemClass::ALL[class];
                    if let Ok(p) = mem.alloc(size, class) {
                        live.push(Block { ptr: p.as_ptr(), size, class });
                    }
                }
                Op::Free { pick } if !live.is_empty() => {
                    let b = live.swap_remove(pick % live.len());
                    mem.free(b.ptr, b.size, b.class);
                }
                Op::Hint { pick } if !live.is_empty() => {
                    let b = &live[pick % live.len()];
                    mem.unused(b.ptr, b.size);
                    mem.used(b.ptr, b.size);
                }
                _ => {}
            }
            check_invariants(&acct, &live)?;
        }

        for b in live.drain(..) {
            mem.free(b.ptr, b.size, b.class);
        }
        prop_assert_eq!(acct.total(), 0);
        prop_assert_eq!(mem.usage().largest_free, POOL_SIZE);
    }

    #[test]
    fn failed_alloc_changes_nothing(sizes in prop::collection::vec(1usize..20_000, 1..40)) {
        let acct = Accounting::new();
        let mem = FlatMemory::new(Pool::hosted(POOL_SIZE).unwrap(), &acct);
        for size in sizes {
            let before = (acct.snapshot(), mem.usage());
            match mem.alloc(size, MemClass::Heap) {
                Ok(_) => prop_assert_eq!(acct.get(MemClass::Heap), before.0.get(MemClass::Heap) + size as u64),
                Err(_) => {
                    prop_assert_eq!(acct.snapshot(), before.0);
                    prop_assert_eq!(mem.usage(), before.1);
                }
            }
        }
    }

    #[test]
    fn mapped_pieces_of_a_reservation_stay_disjoint(
        chunks in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        let acct = Accounting::new();
        let mem = FlatMemory::new(Pool::hosted(POOL_SIZE).unwrap(), &acct);
        let chunk = 1024;
        let r = mem.reserve(std::ptr::null_mut(), chunks.len() * chunk).unwrap();

        let mut mapped = 0u64;
        for (k, &map_it) in chunks.iter().enumerate() {
            if map_it {
                let p = unsafe { r.base.as_ptr().add(k * chunk) };
                mem.map(p, chunk, r.reserved, MemClass::Heap).unwrap();
                mapped += chunk as u64;
            }
        }
        prop_assert_eq!(acct.get(MemClass::Heap), mapped);
        let usage = mem.usage();
        prop_assert_eq!(usage.reserved_unmapped as u64, (chunks.len() * chunk) as u64 - mapped);
        prop_assert_eq!(usage.claimed, chunks.len() * chunk);
    }
}
