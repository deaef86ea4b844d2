//! Per-operation metrics state: lifetime counters, concurrency, and windows.

use std::sync::Arc;
use std::sync::atomic::{self, AtomicI64, AtomicU64};

use crate::options::MonitoringOptions;
use crate::window::{MetricsWindow, WindowSnapshot};

/// We use `Relaxed` ordering for all counter accesses to keep the hot path as
/// cheap as possible. Lifetime counters are monotonic, so readers only require
/// that each loaded value was extant at some recent point in time; no ordering
/// between different counters is promised or needed.
const COUNTER_ORDERING: atomic::Ordering = atomic::Ordering::Relaxed;

/// Metrics state for one distinct operation name.
///
/// Created lazily on first use and never removed for the life of the engine.
/// Internally thread-safe; once published into the registry, an instance is
/// used by any number of concurrent callers without external locking.
#[derive(Debug)]
pub(crate) struct OperationMetrics {
    name: Arc<str>,
    total_count: AtomicU64,
    total_failures: AtomicU64,
    current_in_flight: AtomicI64,
    peak_in_flight: AtomicI64,
    sampling_counter: AtomicU64,
    hot: MetricsWindow,
    warm: MetricsWindow,
    cold: MetricsWindow,
}

/// A consistent-enough point-in-time copy of one operation's raw state.
///
/// Counters are monotonic but are not read atomically as a group, so different
/// fields may reflect slightly different instants.
#[derive(Clone, Debug)]
pub(crate) struct OperationMetricsSnapshot {
    pub(crate) name: Arc<str>,
    pub(crate) total_count: u64,
    pub(crate) total_failures: u64,
    pub(crate) current_in_flight: i64,
    pub(crate) peak_in_flight: i64,
    pub(crate) hot: WindowSnapshot,
    pub(crate) warm: WindowSnapshot,
    pub(crate) cold: WindowSnapshot,
}

impl OperationMetrics {
    /// Creates metrics state sized from the given options.
    ///
    /// Window depths are fixed at creation; later option changes only affect
    /// operations created after the change.
    pub(crate) fn new(name: Arc<str>, options: &MonitoringOptions) -> Self {
        Self {
            name,
            total_count: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            current_in_flight: AtomicI64::new(0),
            peak_in_flight: AtomicI64::new(0),
            sampling_counter: AtomicU64::new(0),
            hot: MetricsWindow::new(options.hot_bucket_count.max(1)),
            warm: MetricsWindow::new(options.warm_bucket_count.max(1)),
            cold: MetricsWindow::new(options.cold_bucket_count.max(1)),
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Records the start of one call, returning the new in-flight count.
    ///
    /// The peak in-flight value is updated with a compare-exchange retry loop so
    /// it never regresses under races, keeping the hot path lock-free.
    pub(crate) fn record_start(&self) -> i64 {
        self.total_count.fetch_add(1, COUNTER_ORDERING);

        let in_flight = self
            .current_in_flight
            .fetch_add(1, COUNTER_ORDERING)
            .wrapping_add(1);

        loop {
            let peak = self.peak_in_flight.load(COUNTER_ORDERING);

            if in_flight <= peak {
                break;
            }

            if self
                .peak_in_flight
                .compare_exchange(peak, in_flight, COUNTER_ORDERING, COUNTER_ORDERING)
                .is_ok()
            {
                break;
            }
        }

        in_flight
    }

    /// Records the end of one call, returning the post-decrement in-flight count.
    ///
    /// `record_timing == false` is the fast path for unsampled calls: outcome and
    /// in-flight bookkeeping still happen, only the latency windows are skipped.
    /// Non-positive durations are never forwarded to the windows.
    pub(crate) fn record_completion(
        &self,
        duration_nanos: u64,
        is_failure: bool,
        record_timing: bool,
    ) -> i64 {
        if is_failure {
            self.total_failures.fetch_add(1, COUNTER_ORDERING);
        }

        let remaining = self
            .current_in_flight
            .fetch_sub(1, COUNTER_ORDERING)
            .wrapping_sub(1);

        if !record_timing || duration_nanos == 0 {
            return remaining;
        }

        self.hot.add_sample(duration_nanos);
        self.warm.add_sample(duration_nanos);
        self.cold.add_sample(duration_nanos);

        remaining
    }

    /// Deterministic "1 in N" sampling: returns `true` on exactly every Nth call
    /// for this operation, regardless of which thread crosses the boundary.
    pub(crate) fn should_capture_sample(&self, sampling_rate: u64) -> bool {
        if sampling_rate <= 1 {
            return true;
        }

        let count = self
            .sampling_counter
            .fetch_add(1, COUNTER_ORDERING)
            .wrapping_add(1);

        count.checked_rem(sampling_rate).expect("rate > 1, checked above") == 0
    }

    pub(crate) fn advance_hot(&self) {
        self.hot.advance();
    }

    pub(crate) fn advance_warm(&self) {
        self.warm.advance();
    }

    pub(crate) fn advance_cold(&self) {
        self.cold.advance();
    }

    pub(crate) fn capture_snapshot(&self) -> OperationMetricsSnapshot {
        OperationMetricsSnapshot {
            name: Arc::clone(&self.name),
            total_count: self.total_count.load(COUNTER_ORDERING),
            total_failures: self.total_failures.load(COUNTER_ORDERING),
            current_in_flight: self.current_in_flight.load(COUNTER_ORDERING),
            peak_in_flight: self.peak_in_flight.load(COUNTER_ORDERING),
            hot: self.hot.snapshot(),
            warm: self.warm.snapshot(),
            cold: self.cold.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    fn test_metrics() -> OperationMetrics {
        OperationMetrics::new(Arc::from("test"), &MonitoringOptions::default())
    }

    #[test]
    fn balanced_start_completion_pairs_leave_nothing_in_flight() {
        let metrics = test_metrics();

        for _ in 0..10 {
            metrics.record_start();
            metrics.record_completion(1, false, true);
        }

        let snapshot = metrics.capture_snapshot();
        assert_eq!(snapshot.total_count, 10);
        assert_eq!(snapshot.total_failures, 0);
        assert_eq!(snapshot.current_in_flight, 0);
        assert_eq!(snapshot.peak_in_flight, 1);
    }

    #[test]
    fn failures_are_counted_separately() {
        let metrics = test_metrics();

        metrics.record_start();
        metrics.record_completion(1, true, true);
        metrics.record_start();
        metrics.record_completion(1, false, true);

        let snapshot = metrics.capture_snapshot();
        assert_eq!(snapshot.total_count, 2);
        assert_eq!(snapshot.total_failures, 1);
    }

    #[test]
    fn peak_tracks_maximum_concurrency() {
        let metrics = test_metrics();

        metrics.record_start();
        metrics.record_start();
        metrics.record_start();
        metrics.record_completion(1, false, true);

        let snapshot = metrics.capture_snapshot();
        assert_eq!(snapshot.current_in_flight, 2);
        assert_eq!(snapshot.peak_in_flight, 3);

        // Peak never regresses.
        metrics.record_completion(1, false, true);
        metrics.record_completion(1, false, true);
        assert_eq!(metrics.capture_snapshot().peak_in_flight, 3);
    }

    #[test]
    fn peak_is_exact_under_concurrent_starts() {
        const THREADS: usize = 8;

        let metrics = Arc::new(test_metrics());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    metrics.record_start();
                    // All scopes are open simultaneously at this point.
                    barrier.wait();
                    metrics.record_completion(1, false, false);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.capture_snapshot();
        assert_eq!(snapshot.peak_in_flight, i64::try_from(THREADS).unwrap());
        assert_eq!(snapshot.current_in_flight, 0);
    }

    #[test]
    fn fast_path_skips_windows_but_not_bookkeeping() {
        let metrics = test_metrics();

        metrics.record_start();
        metrics.record_completion(1_000_000, false, false);

        let snapshot = metrics.capture_snapshot();
        assert_eq!(snapshot.total_count, 1);
        assert_eq!(snapshot.current_in_flight, 0);
        assert!(snapshot.hot.buckets.iter().all(|bucket| bucket.count == 0));
    }

    #[test]
    fn zero_duration_is_not_recorded_in_windows() {
        let metrics = test_metrics();

        metrics.record_start();
        metrics.record_completion(0, false, true);

        let snapshot = metrics.capture_snapshot();
        assert!(snapshot.hot.buckets.iter().all(|bucket| bucket.count == 0));
    }

    #[test]
    fn timed_completions_reach_all_three_windows() {
        let metrics = test_metrics();

        metrics.record_start();
        metrics.record_completion(500, false, true);

        let snapshot = metrics.capture_snapshot();

        for window in [&snapshot.hot, &snapshot.warm, &snapshot.cold] {
            let total: u64 = window.buckets.iter().map(|bucket| bucket.count).sum();
            assert_eq!(total, 1);
        }
    }

    #[test]
    fn sampling_rate_one_always_captures() {
        let metrics = test_metrics();

        assert!((0..100).all(|_| metrics.should_capture_sample(1)));
    }

    #[test]
    fn sampling_captures_exactly_every_nth_call() {
        let metrics = test_metrics();

        let captured = (0..100)
            .filter(|_| metrics.should_capture_sample(5))
            .count();

        assert_eq!(captured, 20);

        // And the pattern is deterministic: the next four are skipped.
        assert!(!(0..4).any(|_| metrics.should_capture_sample(5)));
        assert!(metrics.should_capture_sample(5));
    }

    #[test]
    fn sampling_fraction_holds_under_concurrent_callers() {
        const THREADS: usize = 4;
        const CALLS_PER_THREAD: usize = 250;

        let metrics = Arc::new(test_metrics());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    (0..CALLS_PER_THREAD)
                        .filter(|_| metrics.should_capture_sample(5))
                        .count()
                })
            })
            .collect();

        let captured: usize = handles.into_iter().map(|handle| handle.join().unwrap()).sum();

        assert_eq!(captured, THREADS * CALLS_PER_THREAD / 5);
    }

    static_assertions::assert_impl_all!(OperationMetrics: Send, Sync);
}
