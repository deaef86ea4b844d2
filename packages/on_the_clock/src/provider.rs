//! Assembles read-model snapshots from the raw metrics state.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::engine::MonitoringEngine;
use crate::metrics::OperationMetricsSnapshot;
use crate::options::MonitoringOptions;
use crate::pal::Platform;
use crate::snapshot::{MonitoringSnapshot, OperationSnapshot, TimeSeriesPoint};
use crate::window::WindowSnapshot;

/// Produces [`MonitoringSnapshot`] views over a [`MonitoringEngine`].
///
/// Snapshots are assembled on demand from copies of the raw state; taking one
/// never blocks instrumentation. Series timestamps are anchored at read time:
/// the newest bucket of each series is placed at the snapshot instant and
/// earlier buckets at whole periods before it, so the same bucket may appear
/// under slightly different timestamps in successive snapshots.
#[derive(Clone, Debug)]
pub struct MonitoringSnapshotProvider {
    engine: Arc<MonitoringEngine>,
}

impl MonitoringSnapshotProvider {
    /// Creates a provider backed by the given engine.
    #[must_use]
    pub fn new(engine: Arc<MonitoringEngine>) -> Self {
        Self { engine }
    }

    /// A view over every registered operation, ordered by name.
    #[must_use]
    pub fn get_snapshot(&self) -> MonitoringSnapshot {
        let options = self.engine.current_options();
        let generated_at = self.engine.platform().wall_clock();

        let mut operations: Vec<OperationSnapshot> = self
            .engine
            .capture_snapshots()
            .iter()
            .map(|raw| transform_operation(raw, &options, generated_at))
            .collect();

        operations.sort_unstable_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        MonitoringSnapshot {
            generated_at,
            time_mode: options.time_mode,
            process_cpu_percent: self.engine.cpu_percent(),
            dropped_events: self.engine.dropped_events(),
            operations,
        }
    }

    /// A view of one operation by exact name, or `None` if it has never been
    /// measured (a blank name never matches).
    #[must_use]
    pub fn get_operation_snapshot(&self, name: &str) -> Option<OperationSnapshot> {
        if name.trim().is_empty() {
            return None;
        }

        let options = self.engine.current_options();
        let generated_at = self.engine.platform().wall_clock();

        self.engine
            .find_metrics(name)
            .map(|metrics| transform_operation(&metrics.capture_snapshot(), &options, generated_at))
    }
}

fn transform_operation(
    raw: &OperationMetricsSnapshot,
    options: &MonitoringOptions,
    generated_at: SystemTime,
) -> OperationSnapshot {
    let mut hot_sample_count: u64 = 0;
    let mut hot_total_nanos: u64 = 0;
    let mut hot_max_nanos: u64 = 0;

    for bucket in &raw.hot.buckets {
        if bucket.count == 0 {
            continue;
        }

        hot_sample_count = hot_sample_count.saturating_add(bucket.count);
        hot_total_nanos = hot_total_nanos.saturating_add(bucket.total_nanos);
        hot_max_nanos = hot_max_nanos.max(bucket.max_nanos);
    }

    let average_duration = if hot_sample_count == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(
            hot_total_nanos
                .checked_div(hot_sample_count)
                .expect("sample count is non-zero, checked above"),
        )
    };

    // The rate denominator is the window's full nominal time span, not the
    // elapsed uptime, so an engine younger than the window under-reports.
    #[expect(
        clippy::cast_precision_loss,
        reason = "rates are human-facing approximations; precision loss at u64 extremes is acceptable"
    )]
    let rate_per_second = hot_sample_count as f64 / options.hot_window_seconds().max(1) as f64;

    OperationSnapshot {
        name: Arc::clone(&raw.name),
        total_count: raw.total_count,
        total_failures: raw.total_failures,
        current_in_flight: raw.current_in_flight,
        peak_in_flight: raw.peak_in_flight,
        hot_sample_count,
        average_duration,
        max_duration: Duration::from_nanos(hot_max_nanos),
        rate_per_second,
        hot_series: build_series(&raw.hot, options.hot_period(), generated_at),
        warm_series: build_series(&raw.warm, options.warm_period(), generated_at),
        cold_series: build_series(&raw.cold, options.cold_period(), generated_at),
    }
}

/// Lays the ring out chronologically: the bucket after the cursor is the
/// oldest, the cursor bucket is the newest and lands at `generated_at`.
fn build_series(
    window: &WindowSnapshot,
    period: Duration,
    generated_at: SystemTime,
) -> Vec<TimeSeriesPoint> {
    let len = window.buckets.len();

    if len == 0 || period.is_zero() {
        return Vec::new();
    }

    let span = period.saturating_mul(u32::try_from(len - 1).unwrap_or(u32::MAX));
    let first_timestamp = generated_at
        .checked_sub(span)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    window
        .buckets
        .iter()
        .cycle()
        .skip(
            window
                .cursor
                .wrapping_add(1)
                .checked_rem(len)
                .expect("ring length is non-zero, checked above"),
        )
        .take(len)
        .enumerate()
        .map(|(index, bucket)| {
            let offset = period.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            let timestamp = first_timestamp.checked_add(offset).unwrap_or(generated_at);

            let average_duration = if bucket.count == 0 {
                Duration::ZERO
            } else {
                Duration::from_nanos(
                    bucket
                        .total_nanos
                        .checked_div(bucket.count)
                        .expect("bucket count is non-zero, checked above"),
                )
            };

            TimeSeriesPoint {
                timestamp,
                sample_count: bucket.count,
                average_duration,
                max_duration: if bucket.count == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_nanos(bucket.max_nanos)
                },
            }
        })
        .collect()
}
