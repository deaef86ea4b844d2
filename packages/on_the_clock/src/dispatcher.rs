//! Delivery of completion events to sinks, inline or via a background queue.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;

use crate::ERR_POISONED_LOCK;
use crate::event::{OperationCompleted, OperationEventSink};
use crate::options::{DispatchMode, MonitoringOptions};

/// How long shutdown waits for the consumer thread before abandoning it. A sink
/// stuck in a syscall must not hang engine disposal indefinitely.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(1);

/// Sentinel for "no drop warning logged yet".
const NEVER_WARNED: u64 = u64::MAX;

/// Delivers completion events to the configured sinks.
///
/// The sink set is fixed at construction; the dispatch mode is not. In inline
/// mode events are delivered synchronously on the publishing thread. In
/// background mode they pass through a bounded queue drained by one consumer
/// thread; a full queue drops the incoming event (drop-new policy) and counts
/// it, never blocking the publisher.
///
/// Delivery order to a given sink matches publish order while in background
/// mode (single consumer, FIFO queue). Events in flight during a mode switch
/// may be discarded.
pub(crate) struct EventDispatcher {
    sinks: Arc<[Arc<dyn OperationEventSink>]>,

    /// Publish-side handle to the queue; `None` means dispatch inline. Swapped
    /// atomically so publishing never contends with reconfiguration.
    queue: ArcSwapOption<SyncSender<OperationCompleted>>,

    worker: Mutex<Option<QueueWorker>>,
    dropped_events: AtomicU64,
    drop_log_throttle_seconds: AtomicU64,
    last_drop_warning_seconds: AtomicU64,
    started_at: Instant,
}

struct QueueWorker {
    thread: JoinHandle<()>,
    exit_rx: oneshot::Receiver<()>,
}

impl EventDispatcher {
    /// Creates a dispatcher that delivers inline until the first
    /// [`update_options`](Self::update_options) call establishes a mode.
    pub(crate) fn new(sinks: Vec<Arc<dyn OperationEventSink>>) -> Self {
        Self {
            sinks: Arc::from(sinks),
            queue: ArcSwapOption::const_empty(),
            worker: Mutex::new(None),
            dropped_events: AtomicU64::new(0),
            drop_log_throttle_seconds: AtomicU64::new(0),
            last_drop_warning_seconds: AtomicU64::new(NEVER_WARNED),
            started_at: Instant::now(),
        }
    }

    /// Applies the dispatch mode and queue capacity from the given options.
    ///
    /// Switching into background mode (re)creates the queue and consumer so
    /// capacity changes take effect; switching to inline stops the consumer.
    /// Events queued at the moment of a switch may be discarded.
    pub(crate) fn update_options(&self, options: &MonitoringOptions) {
        self.set_drop_log_throttle(options.event_drop_log_throttle_seconds);

        let mut worker = self.worker.lock().expect(ERR_POISONED_LOCK);

        match options.event_dispatch_mode {
            DispatchMode::Inline => self.stop_worker(&mut worker),
            DispatchMode::BackgroundQueue => {
                self.stop_worker(&mut worker);
                self.start_worker(&mut worker, options.event_queue_capacity);
            }
        }
    }

    /// Applies a new drop-warning throttle without touching the worker or the
    /// queue.
    pub(crate) fn set_drop_log_throttle(&self, seconds: u64) {
        self.drop_log_throttle_seconds.store(seconds, Ordering::Relaxed);
    }

    /// Publishes one event according to the current mode.
    ///
    /// Never blocks and never panics into the caller: a full or torn-down queue
    /// counts the event as dropped and returns.
    pub(crate) fn publish(&self, event: OperationCompleted) {
        if self.sinks.is_empty() {
            return;
        }

        let Some(queue) = self.queue.load_full() else {
            dispatch_to_sinks(&self.sinks, &event);
            return;
        };

        match queue.try_send(event) {
            Ok(()) => {}
            // Drop-new policy: the incoming event is discarded, counted, and
            // (throttled) logged. A disconnected queue mid-reconfiguration is
            // treated the same way.
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => self.note_dropped(),
        }
    }

    /// Total number of events discarded because the background queue was full.
    pub(crate) fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Stops the consumer thread, waiting at most [`SHUTDOWN_WAIT`].
    pub(crate) fn shutdown(&self) {
        let mut worker = self.worker.lock().expect(ERR_POISONED_LOCK);
        self.stop_worker(&mut worker);
    }

    fn start_worker(&self, worker: &mut MutexGuard<'_, Option<QueueWorker>>, capacity: usize) {
        let (queue_tx, queue_rx) = mpsc::sync_channel::<OperationCompleted>(capacity);
        let (exit_tx, exit_rx) = oneshot::channel();
        let sinks = Arc::clone(&self.sinks);

        let thread = thread::Builder::new()
            .name("on_the_clock-events".to_string())
            .spawn(move || {
                // Runs until every sender is dropped, draining the queue in
                // publish order.
                while let Ok(event) = queue_rx.recv() {
                    dispatch_to_sinks(&sinks, &event);
                }

                _ = exit_tx.send(());
            })
            .expect("failed to spawn the completion event consumer thread");

        self.queue.store(Some(Arc::new(queue_tx)));
        **worker = Some(QueueWorker { thread, exit_rx });
    }

    #[cfg_attr(test, mutants::skip)] // The timeout fallback only shows up as a slow shutdown, which tests cannot observe reliably.
    fn stop_worker(&self, worker: &mut MutexGuard<'_, Option<QueueWorker>>) {
        // Publishing falls back to inline dispatch from this point on.
        self.queue.store(None);

        let Some(stopped) = worker.take() else {
            return;
        };

        // The consumer exits once the last sender is gone. Bounded wait: a sink
        // stuck inside `on_operation_completed` leaves the thread abandoned
        // rather than hanging shutdown.
        if stopped.exit_rx.recv_timeout(SHUTDOWN_WAIT).is_ok() {
            _ = stopped.thread.join();
        }
    }

    fn note_dropped(&self) {
        let total = self
            .dropped_events
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);

        let throttle = self.drop_log_throttle_seconds.load(Ordering::Relaxed);
        let now = self.started_at.elapsed().as_secs();
        let last = self.last_drop_warning_seconds.load(Ordering::Relaxed);

        let due = last == NEVER_WARNED || now.saturating_sub(last) >= throttle;
        if due
            && self
                .last_drop_warning_seconds
                .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            log::warn!("completion event queue is full; {total} events dropped so far");
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("sinks", &self.sinks.len())
            .field("queued_mode", &self.queue.load().is_some())
            .field("dropped_events", &self.dropped_events)
            .finish_non_exhaustive()
    }
}

/// Delivers one event to every sink, isolating failures per sink.
fn dispatch_to_sinks(sinks: &[Arc<dyn OperationEventSink>], event: &OperationCompleted) {
    for sink in sinks {
        if panic::catch_unwind(AssertUnwindSafe(|| sink.on_operation_completed(event)))
            .is_err()
        {
            log::warn!("an operation event sink panicked while handling a completion event");
        }
    }
}
