//! ## mellanlager-core::alloc
//! **Fixed-size free-pool allocators**
//!
//! Hot-path allocations (I/O buffers, protocol objects, scheduling records)
//! are served from per-size free pools that recycle blocks instead of
//! returning them to the system allocator.
//!
//! ### Key Submodules:
//! - `freelist`: per-size-class block pool with bulk chunk growth
//! - `allocator`: `Allocator`, `ClassAllocator`, `SparseClassAllocator`
//! - `stats`: per-pool allocation counters

pub mod allocator;
pub mod freelist;
pub mod stats;

pub use allocator::{Allocator, ClassAllocator, PoolPtr, SparseClassAllocator};
pub use freelist::FreeList;
pub use stats::{PoolStats, PoolStatsSnapshot};
