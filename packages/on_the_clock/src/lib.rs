//! In-process operation monitoring with rolling multi-horizon statistics.
//!
//! This package instruments named "operations": callers mark the start and end of
//! each unit of work and the engine maintains rolling statistics about them -
//! lifetime counts, failures, concurrency, and latency distributions over three
//! time horizons (sub-minute, per-minute, per-hour). The collected state can be
//! snapshotted at any time for dashboards or alerting, and individual completions
//! can be streamed to pluggable sinks.
//!
//! The core types are:
//! - [`MonitoringEngine`] - owns all monitoring state and background workers
//! - [`OperationMonitor`] - the instrumentation entry point (`begin` an operation)
//! - [`OperationScope`] - a guard recording duration and outcome when dropped
//! - [`MonitoringSnapshotProvider`] - converts raw state into ordered snapshots
//! - [`OperationEventSink`] - receives completion events for export
//!
//! # Instrumenting code
//!
//! ```
//! use std::sync::Arc;
//!
//! use on_the_clock::{MonitoringEngine, MonitoringOptions, OperationMonitor};
//!
//! let engine = Arc::new(MonitoringEngine::new(MonitoringOptions::default(), Vec::new())?);
//! let monitor = OperationMonitor::new(Arc::clone(&engine));
//!
//! {
//!     let mut scope = monitor.begin("orders/submit")?;
//!
//!     // ... the work being measured ...
//!     let submitted = true;
//!
//!     if !submitted {
//!         scope.mark_failed();
//!     }
//! } // Duration and outcome are recorded when the scope drops.
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Reading statistics
//!
//! ```
//! use std::sync::Arc;
//!
//! use on_the_clock::{
//!     MonitoringEngine, MonitoringOptions, MonitoringSnapshotProvider, OperationMonitor,
//! };
//!
//! let engine = Arc::new(MonitoringEngine::new(MonitoringOptions::default(), Vec::new())?);
//! let monitor = OperationMonitor::new(Arc::clone(&engine));
//!
//! monitor.begin("billing/charge")?.complete();
//!
//! let provider = MonitoringSnapshotProvider::new(Arc::clone(&engine));
//! let snapshot = provider.get_snapshot();
//!
//! for operation in &snapshot.operations {
//!     println!(
//!         "{}: {} calls, {} failures, {} in flight",
//!         operation.name, operation.total_count, operation.total_failures,
//!         operation.current_in_flight
//!     );
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Overhead
//!
//! A begin/drop pair on the hot path performs a handful of atomic operations plus
//! one brief mutex-guarded ring buffer write per horizon. With a sampling rate of
//! "1 in N" configured, unsampled calls skip the clock reads, the window writes
//! and event publication entirely, bounding the minimum overhead for
//! high-frequency operations.
//!
//! # Threading
//!
//! All public types are thread-safe. Any number of threads may begin and complete
//! scopes concurrently; the engine additionally runs a small fixed set of
//! background workers (one rotation timer per horizon, an optional CPU sampler,
//! and in background dispatch mode a single event consumer). Dropping the engine
//! stops all of its workers.
//!
//! # Mathematics policy
//!
//! Counters and accumulated durations saturate rather than wrap or panic when
//! pushed to unrealistic extremes. Do not stray near `u64` boundaries and the
//! recorded data will be exact.

mod cpu;
mod dispatcher;
mod engine;
mod event;
mod metrics;
mod monitor;
mod options;
mod pal;
mod provider;
mod registry;
mod rotation;
mod snapshot;
mod tags;
mod window;

pub use engine::MonitoringEngine;
pub use event::{OperationCompleted, OperationEventSink};
pub use monitor::{BeginError, OperationMonitor, OperationScope};
pub use options::{
    DispatchMode, DropPolicy, MonitoringOptions, OptionsError, OverflowPolicy, TimeMode,
};
pub use provider::MonitoringSnapshotProvider;
pub use snapshot::{MonitoringSnapshot, OperationSnapshot, TimeSeriesPoint};
pub use tags::OperationTags;

/// Message for `.expect()` calls on mutex acquisition.
///
/// We do not attempt to recover from poisoned locks; a panic while holding one of
/// our internal locks means the process state is already suspect.
pub(crate) const ERR_POISONED_LOCK: &str = "poisoned lock - the process is in an undefined state";
