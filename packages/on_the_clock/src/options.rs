//! Monitoring configuration: the tunables, their defaults, and validation.

use std::time::Duration;

use thiserror::Error;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Which wall-clock flavor presentation layers should render timestamps in.
///
/// Timestamps produced by this package are absolute [`std::time::SystemTime`]
/// instants, so the mode does not change what is recorded - it is carried for
/// whatever layer formats snapshots for humans.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TimeMode {
    /// Render timestamps in UTC.
    #[default]
    Utc,

    /// Render timestamps in the machine's local time zone.
    Local,
}

/// How completion events reach the sinks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DispatchMode {
    /// Deliver synchronously on the completing thread.
    Inline,

    /// Deliver via a bounded queue drained by one background consumer.
    #[default]
    BackgroundQueue,
}

/// Behavior when the background event queue is full.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DropPolicy {
    /// Discard the incoming event and count it as dropped.
    #[default]
    DropNew,
}

/// Behavior when the number of distinct operation names exceeds capacity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OverflowPolicy {
    /// Reject further names; their scopes become no-ops.
    #[default]
    DropNew,
}

/// All monitoring tunables, applied to the engine as one immutable value.
///
/// The engine holds exactly one current options value and swaps it wholesale on
/// [`apply_options`](crate::MonitoringEngine::apply_options) - readers always
/// see either the old or the new configuration in full, never a partial mix.
///
/// All numeric fields must be strictly positive; [`validate`](Self::validate)
/// rejects anything else and a rejected update leaves the previous
/// configuration in effect.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitoringOptions {
    /// Rendering mode for timestamps (presentation only).
    pub time_mode: TimeMode,

    /// Number of buckets in the sub-minute ("hot") window.
    pub hot_bucket_count: usize,

    /// Width of one hot bucket, in seconds.
    pub hot_bucket_seconds: u64,

    /// Number of buckets in the per-minute ("warm") window.
    pub warm_bucket_count: usize,

    /// Width of one warm bucket, in minutes.
    pub warm_bucket_minutes: u64,

    /// Number of buckets in the per-hour ("cold") window.
    pub cold_bucket_count: usize,

    /// Width of one cold bucket, in hours.
    pub cold_bucket_hours: u64,

    /// Deterministic "1 in N" sampling rate; 1 samples every call.
    pub sampling_rate: u64,

    /// Whether the background process CPU sampler runs.
    pub enable_cpu_measurement: bool,

    /// Seconds between CPU utilization samples.
    pub cpu_sample_interval_seconds: u64,

    /// Depth of the circular CPU sample history.
    pub cpu_sample_history_count: usize,

    /// Maximum number of distinct operation names before the overflow policy
    /// applies.
    pub max_operation_count: usize,

    /// What happens when `max_operation_count` is reached.
    pub overflow_policy: OverflowPolicy,

    /// Maximum number of tags retained per operation.
    pub max_tags_per_operation: usize,

    /// Maximum retained length of a tag key, in characters.
    pub max_tag_key_length: usize,

    /// Maximum retained length of a tag value, in characters.
    pub max_tag_value_length: usize,

    /// How completion events are delivered to sinks.
    pub event_dispatch_mode: DispatchMode,

    /// Capacity of the background event queue.
    pub event_queue_capacity: usize,

    /// What happens when the background event queue is full.
    pub event_drop_policy: DropPolicy,

    /// Minimum seconds between logged warnings about dropped events.
    pub event_drop_log_throttle_seconds: u64,
}

impl Default for MonitoringOptions {
    fn default() -> Self {
        Self {
            time_mode: TimeMode::Utc,
            hot_bucket_count: 120,
            hot_bucket_seconds: 1,
            warm_bucket_count: 60,
            warm_bucket_minutes: 1,
            cold_bucket_count: 24,
            cold_bucket_hours: 1,
            sampling_rate: 1,
            enable_cpu_measurement: false,
            cpu_sample_interval_seconds: 1,
            cpu_sample_history_count: 120,
            max_operation_count: 500,
            overflow_policy: OverflowPolicy::DropNew,
            max_tags_per_operation: 8,
            max_tag_key_length: 32,
            max_tag_value_length: 64,
            event_dispatch_mode: DispatchMode::BackgroundQueue,
            event_queue_capacity: 8192,
            event_drop_policy: DropPolicy::DropNew,
            event_drop_log_throttle_seconds: 60,
        }
    }
}

impl MonitoringOptions {
    /// Verifies that every numeric field is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::NonPositive`] naming the first offending field.
    pub fn validate(&self) -> Result<(), OptionsError> {
        ensure_positive(self.hot_bucket_count, "hot_bucket_count")?;
        ensure_positive(self.hot_bucket_seconds, "hot_bucket_seconds")?;
        ensure_positive(self.warm_bucket_count, "warm_bucket_count")?;
        ensure_positive(self.warm_bucket_minutes, "warm_bucket_minutes")?;
        ensure_positive(self.cold_bucket_count, "cold_bucket_count")?;
        ensure_positive(self.cold_bucket_hours, "cold_bucket_hours")?;
        ensure_positive(self.sampling_rate, "sampling_rate")?;
        ensure_positive(self.cpu_sample_interval_seconds, "cpu_sample_interval_seconds")?;
        ensure_positive(self.cpu_sample_history_count, "cpu_sample_history_count")?;
        ensure_positive(self.max_operation_count, "max_operation_count")?;
        ensure_positive(self.max_tags_per_operation, "max_tags_per_operation")?;
        ensure_positive(self.max_tag_key_length, "max_tag_key_length")?;
        ensure_positive(self.max_tag_value_length, "max_tag_value_length")?;
        ensure_positive(self.event_queue_capacity, "event_queue_capacity")?;
        ensure_positive(
            self.event_drop_log_throttle_seconds,
            "event_drop_log_throttle_seconds",
        )?;
        Ok(())
    }

    /// The rotation period of the hot window.
    #[must_use]
    pub fn hot_period(&self) -> Duration {
        Duration::from_secs(self.hot_bucket_seconds)
    }

    /// The rotation period of the warm window.
    #[must_use]
    pub fn warm_period(&self) -> Duration {
        Duration::from_secs(self.warm_bucket_minutes.saturating_mul(SECONDS_PER_MINUTE))
    }

    /// The rotation period of the cold window.
    #[must_use]
    pub fn cold_period(&self) -> Duration {
        Duration::from_secs(self.cold_bucket_hours.saturating_mul(SECONDS_PER_HOUR))
    }

    pub(crate) fn cpu_sample_interval(&self) -> Duration {
        Duration::from_secs(self.cpu_sample_interval_seconds.max(1))
    }

    /// Total time span covered by the hot window, in seconds.
    pub(crate) fn hot_window_seconds(&self) -> u64 {
        u64::try_from(self.hot_bucket_count)
            .unwrap_or(u64::MAX)
            .saturating_mul(self.hot_bucket_seconds)
    }
}

fn ensure_positive<T: TryInto<u128>>(value: T, field: &'static str) -> Result<(), OptionsError> {
    // A value too large to represent cannot be zero.
    if value.try_into().is_ok_and(|value| value == 0) {
        return Err(OptionsError::NonPositive { field });
    }

    Ok(())
}

/// A monitoring options value failed validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum OptionsError {
    /// A numeric field was zero (all numeric tunables must be positive).
    #[error("monitoring option `{field}` must be a positive value")]
    NonPositive {
        /// Name of the offending field.
        field: &'static str,
    },
}
