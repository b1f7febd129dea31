//! # mellanlager-core
//!
//! Execution core of the mellanlager proxy/cache: a thread-pool event
//! scheduler paired with fixed-size free-pool allocators that back all
//! hot-path allocations.
//!
//! ### Expectations (Production):
//! - No general-purpose allocator calls on the steady-state request path
//! - Scheduling calls are non-blocking from any thread
//! - Worker threads block with a bounded wait when idle, never spin
//!
//! ### Key Submodules:
//! - `alloc`: per-size freelists and the prototype-copy allocator family
//! - `buffer`: power-of-two I/O buffer size classes and their pools
//! - `events`: continuations, events, and the worker-thread event processor
//! - `bootstrap`: one-time process-wide initialization and version check

pub mod alloc;
pub mod bootstrap;
pub mod buffer;
pub mod events;

pub mod prelude {
    pub use crate::alloc::allocator::{
        Allocator, ClassAllocator, PoolPtr, SparseClassAllocator,
    };
    pub use crate::bootstrap::{
        init_event_system, EventSystem, ModuleVersion, EVENT_SYSTEM_MODULE_VERSION,
    };
    pub use crate::buffer::{BufferPool, IoBuffer};
    pub use crate::events::{
        Affinity, Continuation, EventCode, EventError, EventHandle, EventProcessor, HandlerStatus,
    };
}
