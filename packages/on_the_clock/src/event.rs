//! Completion events and the sink contract for exporting them.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::tags::OperationTags;

/// An immutable record describing one finished, sampled operation.
///
/// Produced once per sampled completion and delivered to every configured sink
/// (or dropped under queue pressure - never partially delivered).
#[derive(Clone, Debug)]
pub struct OperationCompleted {
    /// The operation name the scope was begun with.
    pub name: Arc<str>,

    /// Wall-duration of the operation, measured on the monotonic clock.
    pub duration: Duration,

    /// Whether the scope was marked failed before completion.
    pub is_failure: bool,

    /// The operation's in-flight count immediately after this completion.
    pub concurrency_at_end: i64,

    /// Sanitized caller-supplied tags, if any survived sanitization.
    pub tags: Option<OperationTags>,

    /// Wall-clock time at which the operation ended.
    pub ended_at: SystemTime,

    /// Most recent process CPU utilization percentage, if CPU measurement is
    /// enabled and a sample has been collected.
    pub process_cpu_percent: Option<f64>,
}

/// Receives completion events for export (logging, tracing, metrics backends).
///
/// Sinks are registered when the engine is constructed and are invoked either on
/// the completing thread (inline dispatch) or on the engine's event consumer
/// thread (background dispatch). Delivery is isolated per sink: a panicking sink
/// never disturbs the instrumented caller and never prevents delivery to the
/// remaining sinks.
///
/// # Examples
///
/// ```
/// use on_the_clock::{OperationCompleted, OperationEventSink};
///
/// #[derive(Debug)]
/// struct StdoutSink;
///
/// impl OperationEventSink for StdoutSink {
///     fn on_operation_completed(&self, event: &OperationCompleted) {
///         println!("{} finished in {:?}", event.name, event.duration);
///     }
/// }
/// ```
pub trait OperationEventSink: Send + Sync {
    /// Called once for each sampled completion.
    ///
    /// Implementations should return quickly; in background dispatch mode a slow
    /// sink delays the single consumer and can cause events to be dropped.
    fn on_operation_completed(&self, event: &OperationCompleted);
}
