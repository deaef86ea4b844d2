//! The instrumentation surface: begin a scope, drop it to record the call.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::engine::MonitoringEngine;
use crate::event::OperationCompleted;
use crate::metrics::OperationMetrics;
use crate::options::MonitoringOptions;
use crate::pal::Platform;
use crate::tags::OperationTags;

/// Hands out measurement scopes for named operations.
///
/// A monitor is a cheap handle over the shared [`MonitoringEngine`]; create as
/// many as convenient. See the [package docs](crate) for a usage example.
#[derive(Clone, Debug)]
pub struct OperationMonitor {
    engine: Arc<MonitoringEngine>,
}

impl OperationMonitor {
    /// Creates a monitor backed by the given engine.
    #[must_use]
    pub fn new(engine: Arc<MonitoringEngine>) -> Self {
        Self { engine }
    }

    /// Begins measuring one call of the named operation.
    ///
    /// The returned scope records the call when dropped (or completed
    /// explicitly). When the distinct-name cap rejects a new name the returned
    /// scope is a no-op, so instrumented code keeps working unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BeginError::BlankName`] if `name` is empty or whitespace-only.
    pub fn begin(&self, name: &str) -> Result<OperationScope, BeginError> {
        self.begin_scope(name, None)
    }

    /// Begins measuring one call, attaching caller-supplied tags.
    ///
    /// Tags are sanitized against the configured caps (count, key length,
    /// value length) before being stored; excess entries are discarded in
    /// favor of earlier-inserted ones.
    ///
    /// # Errors
    ///
    /// Returns [`BeginError::BlankName`] if `name` is empty or whitespace-only.
    pub fn begin_with_tags(
        &self,
        name: &str,
        tags: OperationTags,
    ) -> Result<OperationScope, BeginError> {
        self.begin_scope(name, Some(tags))
    }

    fn begin_scope(
        &self,
        name: &str,
        tags: Option<OperationTags>,
    ) -> Result<OperationScope, BeginError> {
        if name.trim().is_empty() {
            return Err(BeginError::BlankName);
        }

        let Some(metrics) = self.engine.get_or_create_metrics(name) else {
            return Ok(OperationScope { inner: None });
        };

        metrics.record_start();

        let options = self.engine.current_options();

        // The sampling decision is made once, here; everything downstream of
        // it (timing, tags, the completion event) follows this one verdict.
        let sampled = metrics.should_capture_sample(options.sampling_rate);

        let (started, tags) = if sampled {
            (
                Some(self.engine.platform().monotonic()),
                tags.and_then(|tags| sanitize_tags(tags, &options)),
            )
        } else {
            (None, None)
        };

        Ok(OperationScope {
            inner: Some(ActiveScope {
                engine: Arc::clone(&self.engine),
                metrics,
                started,
                tags,
                failed: false,
            }),
        })
    }
}

/// Applies the configured caps to caller-supplied tags.
///
/// Keys are truncated per character before any other rule, so keys that
/// collide after truncation collapse onto one entry (the later value wins,
/// even once the count cap is reached). Entries whose key is empty are
/// discarded; otherwise insertion order decides which entries fit under the
/// cap.
fn sanitize_tags(tags: OperationTags, options: &MonitoringOptions) -> Option<OperationTags> {
    let mut sanitized = OperationTags::new();

    for (key, value) in tags.iter() {
        let key: String = key.chars().take(options.max_tag_key_length).collect();

        if key.is_empty() {
            continue;
        }

        if sanitized.len() >= options.max_tags_per_operation && sanitized.get(&key).is_none() {
            continue;
        }

        let value: String = value.chars().take(options.max_tag_value_length).collect();
        sanitized.insert(key, value);
    }

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// One in-flight measurement; dropping it records the call.
///
/// Failure is opt-in via [`mark_failed`](Self::mark_failed) - a scope that is
/// dropped without it counts as a success. The scope is a no-op when the
/// engine rejected the operation name at its distinct-name cap.
#[derive(Debug)]
#[must_use = "dropping the scope is what records the operation"]
pub struct OperationScope {
    inner: Option<ActiveScope>,
}

#[derive(Debug)]
struct ActiveScope {
    engine: Arc<MonitoringEngine>,
    metrics: Arc<OperationMetrics>,

    /// Monotonic reading at scope begin; `None` for unsampled calls, which
    /// skip timing entirely.
    started: Option<Duration>,

    tags: Option<OperationTags>,
    failed: bool,
}

impl OperationScope {
    /// Marks this call as failed; the failure is recorded at completion.
    pub fn mark_failed(&mut self) {
        if let Some(active) = self.inner.as_mut() {
            active.failed = true;
        }
    }

    /// Completes the scope now instead of at drop.
    pub fn complete(mut self) {
        if let Some(active) = self.inner.take() {
            finish(active);
        }
    }

    /// Whether this scope records nothing (the operation name was rejected at
    /// the distinct-name cap).
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        if let Some(active) = self.inner.take() {
            finish(active);
        }
    }
}

fn finish(active: ActiveScope) {
    let sampled = active.started.is_some();

    let duration = active.started.map_or(Duration::ZERO, |started| {
        active
            .engine
            .platform()
            .monotonic()
            .saturating_sub(started)
    });

    let duration_nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

    let concurrency_at_end =
        active
            .metrics
            .record_completion(duration_nanos, active.failed, sampled);

    if !sampled {
        return;
    }

    let event = OperationCompleted {
        name: Arc::clone(active.metrics.name()),
        duration,
        is_failure: active.failed,
        concurrency_at_end,
        tags: active.tags,
        ended_at: active.engine.platform().wall_clock(),
        process_cpu_percent: active.engine.cpu_percent(),
    };

    active.engine.publish_event(event);
}

/// Beginning a measurement scope failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum BeginError {
    /// The operation name was empty or whitespace-only.
    #[error("operation name must not be blank")]
    BlankName,
}
