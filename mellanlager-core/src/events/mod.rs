//! ## mellanlager-core::events
//! **Continuations, events, and the worker-thread event processor**
//!
//! Units of deferred work ("events") bind a callback-bearing handler
//! ("continuation") to a fire time and cancellation state, and are
//! dispatched across a fixed pool of worker threads with optional
//! affinity.
//!
//! ### Key Submodules:
//! - `continuation`: the dispatch trait and event/status codes
//! - `event`: the scheduled invocation record and its cancellable handle
//! - `processor`: worker threads, ready queues, and timed dispatch

pub mod continuation;
pub mod event;
pub mod processor;

pub use continuation::{Continuation, EventCode, HandlerStatus};
pub use event::{Affinity, EventHandle};
pub use processor::{EventError, EventProcessor};
