//! Read-model value types produced by the snapshot provider.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::options::TimeMode;

/// A point-in-time view over every registered operation.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitoringSnapshot {
    /// Wall-clock time at which this snapshot was assembled. All series
    /// timestamps within it are anchored to this instant.
    pub generated_at: SystemTime,

    /// The configured rendering mode for timestamps (presentation only).
    pub time_mode: TimeMode,

    /// Most recent process CPU utilization percentage, if available.
    pub process_cpu_percent: Option<f64>,

    /// Total completion events discarded because the background event queue
    /// was full.
    pub dropped_events: u64,

    /// Per-operation views, ordered by name.
    pub operations: Vec<OperationSnapshot>,
}

/// A point-in-time view of one operation.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationSnapshot {
    /// The operation name (case-sensitive).
    pub name: Arc<str>,

    /// Lifetime number of calls, sampled or not.
    pub total_count: u64,

    /// Lifetime number of calls marked failed.
    pub total_failures: u64,

    /// Calls currently in flight.
    pub current_in_flight: i64,

    /// Highest in-flight count ever observed.
    pub peak_in_flight: i64,

    /// Number of timed samples currently held in the hot window.
    pub hot_sample_count: u64,

    /// Mean duration over the hot window; zero when it holds no samples.
    pub average_duration: Duration,

    /// Maximum duration over the hot window; zero when it holds no samples.
    pub max_duration: Duration,

    /// Timed samples per second over the hot window's full time span.
    pub rate_per_second: f64,

    /// Sub-minute resolution series, oldest bucket first.
    pub hot_series: Vec<TimeSeriesPoint>,

    /// Per-minute resolution series, oldest bucket first.
    pub warm_series: Vec<TimeSeriesPoint>,

    /// Per-hour resolution series, oldest bucket first.
    pub cold_series: Vec<TimeSeriesPoint>,
}

/// One bucket of a time series, placed on the wall clock.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimeSeriesPoint {
    /// Nominal start of the time slice this point covers.
    pub timestamp: SystemTime,

    /// Number of timed samples in the slice.
    pub sample_count: u64,

    /// Mean duration within the slice; zero when it holds no samples.
    pub average_duration: Duration,

    /// Maximum duration within the slice; zero when it holds no samples.
    pub max_duration: Duration,
}
