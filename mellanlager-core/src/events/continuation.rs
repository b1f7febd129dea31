//! ## mellanlager-core::events::continuation
//! **The unit of "what to run"**

use super::event::EventHandle;

/// Why a continuation is being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    /// Scheduled for dispatch as soon as a worker was free.
    Immediate,
    /// A one-shot delay elapsed.
    Timeout,
    /// A periodic interval elapsed.
    Interval,
}

/// Advisory status returned from dispatch. The scheduler takes no action
/// on it at this layer; semantics belong to each continuation
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    Done,
    Continue,
}

/// A polymorphic handler dispatched by the event processor.
///
/// The processor calls `handle_event` from exactly one worker thread at a
/// time for any given event, but different events sharing one
/// continuation may dispatch concurrently on different workers:
/// protecting per-continuation state is the implementor's concern, and
/// the core adds no implicit locking around dispatch.
///
/// `handle_event` must not panic. A panic escaping dispatch takes down
/// its worker thread, and worker threads are never restarted; the process
/// cannot continue on a partial scheduler.
pub trait Continuation: Send + Sync {
    /// Handles one firing. `event` is the record being dispatched; it can
    /// be used to cancel a periodic event from inside its own handler.
    fn handle_event(&self, code: EventCode, event: &EventHandle) -> HandlerStatus;
}

impl<F> Continuation for F
where
    F: Fn(EventCode, &EventHandle) -> HandlerStatus + Send + Sync,
{
    fn handle_event(&self, code: EventCode, event: &EventHandle) -> HandlerStatus {
        self(code, event)
    }
}
