//! ## mellanlager-core::events::event
//! **The scheduled invocation record**

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::continuation::{Continuation, EventCode};

/// Where an event may be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Assigned at schedule time by the load-spreading policy, never
    /// migrated afterwards.
    Any,
    /// Only ever dispatched on the given worker.
    Worker(usize),
}

/// A scheduled invocation record: continuation, fire time, optional
/// period, cancellation state, assigned worker.
pub(crate) struct Event {
    pub(crate) continuation: Arc<dyn Continuation>,
    /// Fire deadline in nanoseconds since the processor epoch. Rewritten
    /// only by the owning worker when a periodic event re-arms.
    pub(crate) deadline_ns: AtomicU64,
    pub(crate) period: Option<Duration>,
    pub(crate) code: EventCode,
    pub(crate) worker: usize,
    cancelled: AtomicBool,
}

impl Event {
    pub(crate) fn new(
        continuation: Arc<dyn Continuation>,
        deadline_ns: u64,
        period: Option<Duration>,
        code: EventCode,
        worker: usize,
    ) -> Self {
        Self {
            continuation,
            deadline_ns: AtomicU64::new(deadline_ns),
            period,
            code,
            worker,
            cancelled: AtomicBool::new(false),
        }
    }
}

/// Shared, cancellable handle to a scheduled event.
///
/// The record is reclaimed when the last handle drops: after a one-shot
/// firing, a skipped cancelled firing, or processor shutdown.
#[derive(Clone)]
pub struct EventHandle {
    pub(crate) inner: Arc<Event>,
}

impl std::fmt::Debug for EventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandle")
            .field("code", &self.inner.code)
            .field("worker", &self.inner.worker)
            .finish_non_exhaustive()
    }
}

impl EventHandle {
    /// Requests cancellation. Idempotent; safe to call concurrently with
    /// an in-flight firing. If the continuation is already executing,
    /// the current dispatch completes but a periodic event will not
    /// re-arm and a pending firing is skipped.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// The worker this event is bound to.
    pub fn worker(&self) -> usize {
        self.inner.worker
    }

    /// The period for a periodic event, if any.
    pub fn period(&self) -> Option<Duration> {
        self.inner.period
    }
}
