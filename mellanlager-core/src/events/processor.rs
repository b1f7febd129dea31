//! ## mellanlager-core::events::processor
//! **Worker threads, ready queues, and timed dispatch**
//!
//! A fixed pool of OS worker threads is started once at process
//! initialization. Each worker owns a FIFO ready queue (its channel
//! inbox) and a time-ordered heap of not-yet-due events, and runs an
//! independent dispatch loop; no global lock serializes dispatch.
//! Scheduling calls are non-blocking from any thread. Idle workers block
//! with a bounded wait, never spin.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace};

use mellanlager_telemetry::MetricsRecorder;

use super::continuation::{Continuation, EventCode};
use super::event::{Affinity, Event, EventHandle};

/// Scheduling error conditions.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event processor is shut down")]
    Shutdown,
    #[error("worker {worker} out of range ({count} workers)")]
    InvalidWorker { worker: usize, count: usize },
}

/// Upper bound on how long an idle worker sleeps before re-checking its
/// inbox, when no timed event bounds the wait sooner.
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(10);

enum Task {
    Run(EventHandle),
    Stop,
}

/// Heap entry ordering not-yet-due events by deadline snapshot; `seq`
/// breaks ties so equal deadlines dispatch in arrival order.
struct PendingEntry {
    due_ns: u64,
    seq: u64,
    event: EventHandle,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due_ns == other.due_ns && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest due.
        other
            .due_ns
            .cmp(&self.due_ns)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// The worker-thread pool accepting scheduling requests from any thread.
///
/// Guarantees an event fires on or after its requested time, on a thread
/// consistent with its affinity. Best-effort: under load the actual fire
/// time may be later; there is no deadline guarantee.
pub struct EventProcessor {
    senders: Vec<Sender<Task>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    next_worker: AtomicUsize,
    epoch: Instant,
    running: AtomicBool,
    metrics: Arc<MetricsRecorder>,
}

impl EventProcessor {
    /// Starts `worker_count` dispatch threads. Threads live until
    /// [`shutdown`](Self::shutdown); they are never individually
    /// restarted.
    ///
    /// # Panics
    /// If `worker_count` is zero or a thread cannot be spawned (startup
    /// is the only place this runs; a partial pool is unusable).
    pub fn start(
        worker_count: usize,
        idle_wait: Duration,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        assert!(worker_count > 0, "event processor needs at least one worker");
        info!(worker_count, "starting event processor");

        let epoch = Instant::now();
        let mut senders = Vec::with_capacity(worker_count);
        let mut threads = Vec::with_capacity(worker_count);

        for worker in 0..worker_count {
            let (tx, rx) = channel::unbounded();
            let metrics = metrics.clone();
            let handle = std::thread::Builder::new()
                .name(format!("mell-worker-{worker}"))
                .spawn(move || worker_loop(worker, rx, epoch, idle_wait, metrics))
                .expect("failed to spawn event worker");
            senders.push(tx);
            threads.push(handle);
        }

        Self {
            senders,
            threads: Mutex::new(threads),
            next_worker: AtomicUsize::new(0),
            epoch,
            running: AtomicBool::new(true),
            metrics,
        }
    }

    /// Schedules a continuation for dispatch as soon as its worker is
    /// free.
    pub fn schedule_immediate(
        &self,
        continuation: Arc<dyn Continuation>,
        affinity: Affinity,
    ) -> Result<EventHandle, EventError> {
        self.submit(continuation, Duration::ZERO, None, EventCode::Immediate, affinity)
    }

    /// Schedules a continuation to fire no earlier than now + `delay`.
    pub fn schedule_after(
        &self,
        continuation: Arc<dyn Continuation>,
        delay: Duration,
        affinity: Affinity,
    ) -> Result<EventHandle, EventError> {
        self.submit(continuation, delay, None, EventCode::Timeout, affinity)
    }

    /// Schedules a continuation to fire after `interval` and then
    /// repeatedly re-arm with the same interval until cancelled.
    /// Successive firings on the worker never overlap.
    pub fn schedule_every(
        &self,
        continuation: Arc<dyn Continuation>,
        interval: Duration,
        affinity: Affinity,
    ) -> Result<EventHandle, EventError> {
        self.submit(
            continuation,
            interval,
            Some(interval),
            EventCode::Interval,
            affinity,
        )
    }

    fn submit(
        &self,
        continuation: Arc<dyn Continuation>,
        delay: Duration,
        period: Option<Duration>,
        code: EventCode,
        affinity: Affinity,
    ) -> Result<EventHandle, EventError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(EventError::Shutdown);
        }
        let worker = self.assign(affinity)?;
        let deadline_ns = (self.epoch.elapsed() + delay).as_nanos() as u64;
        let event = EventHandle {
            inner: Arc::new(Event::new(continuation, deadline_ns, period, code, worker)),
        };
        self.senders[worker]
            .send(Task::Run(event.clone()))
            .map_err(|_| EventError::Shutdown)?;
        Ok(event)
    }

    /// Picks the worker an event is bound to for its whole lifetime:
    /// the requested one, or the round-robin cursor for `Affinity::Any`.
    fn assign(&self, affinity: Affinity) -> Result<usize, EventError> {
        let count = self.senders.len();
        match affinity {
            Affinity::Worker(worker) if worker < count => Ok(worker),
            Affinity::Worker(worker) => Err(EventError::InvalidWorker { worker, count }),
            Affinity::Any => Ok(self.next_worker.fetch_add(1, Ordering::Relaxed) % count),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Stops all workers and joins them. Idempotent. Pending events that
    /// have not fired are dropped; scheduling afterwards returns
    /// [`EventError::Shutdown`].
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        debug!("shutting down event processor");
        for tx in &self.senders {
            // A worker that already exited has dropped its receiver.
            let _ = tx.send(Task::Stop);
        }
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for EventProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    worker: usize,
    rx: Receiver<Task>,
    epoch: Instant,
    idle_wait: Duration,
    metrics: Arc<MetricsRecorder>,
) {
    trace!(worker, "event worker started");
    let mut pending: BinaryHeap<PendingEntry> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        // Dispatch everything already due.
        loop {
            let now_ns = epoch.elapsed().as_nanos() as u64;
            match pending.peek() {
                Some(entry) if entry.due_ns <= now_ns => {
                    let entry = pending.pop().expect("peeked entry");
                    dispatch(&entry.event, &mut pending, &mut seq, &metrics);
                }
                _ => break,
            }
        }

        // Block until the next deadline or new work, bounded.
        let now_ns = epoch.elapsed().as_nanos() as u64;
        let wait = pending
            .peek()
            .map(|entry| Duration::from_nanos(entry.due_ns.saturating_sub(now_ns)))
            .unwrap_or(idle_wait)
            .min(idle_wait);

        match rx.recv_timeout(wait) {
            Ok(Task::Run(event)) => {
                let due_ns = event.inner.deadline_ns.load(Ordering::Acquire);
                if due_ns <= epoch.elapsed().as_nanos() as u64 {
                    // Immediate (or already-due) events dispatch in inbox
                    // FIFO order.
                    dispatch(&event, &mut pending, &mut seq, &metrics);
                } else {
                    seq += 1;
                    pending.push(PendingEntry { due_ns, seq, event });
                }
            }
            Ok(Task::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    trace!(worker, "event worker stopped");
}

/// Fires one event: the cancellation flag is checked immediately before
/// invoking the continuation and again immediately before re-arming a
/// periodic event. A cancelled event's due firing is skipped; dropping
/// the last handle reclaims the record.
fn dispatch(
    event: &EventHandle,
    pending: &mut BinaryHeap<PendingEntry>,
    seq: &mut u64,
    metrics: &MetricsRecorder,
) {
    if event.is_cancelled() {
        return;
    }

    let started = Instant::now();
    // Advisory at this layer; continuations own its meaning.
    let _status = event
        .inner
        .continuation
        .handle_event(event.inner.code, event);
    metrics.record_dispatch(started.elapsed().as_nanos() as u64);

    if let Some(period) = event.inner.period {
        if event.is_cancelled() {
            return;
        }
        // Re-arm off the previous deadline, not the dispatch time, so
        // periodic drift stays bounded.
        let due_ns = event.inner.deadline_ns.load(Ordering::Relaxed)
            + period.as_nanos() as u64;
        event.inner.deadline_ns.store(due_ns, Ordering::Release);
        *seq += 1;
        pending.push(PendingEntry {
            due_ns,
            seq: *seq,
            event: event.clone(),
        });
    }
}
