#![no_std]

//! rtsysmem: the OS memory primitives a managed runtime's heap sits on,
//! implemented for targets without virtual memory.
//!
//! The runtime's arena manager talks to the system only through seven calls:
//! `alloc`, `free`, `reserve`, `map`, `unused`, `used`, `fault`
//! ([`MemoryPrimitives`]). [`FlatMemory`] provides them over one fixed
//! physical [`Pool`]: there is no MMU, so reserving commits eagerly and the
//! reclaim hints do nothing, but every contract (zeroed memory, per-class
//! accounting, no overlapping live ranges, fatal diagnostics on misuse) holds.
//!
//! # Usage
//!
//! ```ignore
//! static ACCOUNTING: rtsysmem::Accounting = rtsysmem::Accounting::new();
//!
//! let pool = unsafe { rtsysmem::Pool::from_raw_parts(HEAP_START, HEAP_LEN) };
//! let mem = rtsysmem::FlatMemory::new(pool, &ACCOUNTING);
//! let p = mem.alloc(64 * 1024, rtsysmem::MemClass::Heap)?;
//! ```

#[cfg(test)]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

mod macros;

pub mod accounting;
pub mod config;
pub mod error;
pub mod fatal;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod flat;
pub mod platform;
pub mod pool;
pub mod primitives;
pub mod range;
pub mod region;
pub mod stats;
pub mod sync;

pub use accounting::{Accounting, MemClass, Snapshot};
pub use config::{MIN_ALIGN, PAGE_SIZE};
pub use error::SysError;
pub use fatal::{Primitive, Violation, ViolationKind};
pub use flat::{FlatMemory, PoolUsage};
pub use pool::Pool;
pub use primitives::{MemoryPrimitives, Reservation};
pub use range::AddrRange;
pub use stats::StatsSnapshot;
