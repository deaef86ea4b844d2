//! Periodic bucket rotation for the time-bucketed windows.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::metrics::OperationMetrics;
use crate::registry::OperationRegistry;

/// Which window resolution a rotation scheduler sweeps.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Horizon {
    Hot,
    Warm,
    Cold,
}

impl Horizon {
    fn thread_name(self) -> &'static str {
        match self {
            Self::Hot => "on_the_clock-hot",
            Self::Warm => "on_the_clock-warm",
            Self::Cold => "on_the_clock-cold",
        }
    }

    fn advance(self, metrics: &OperationMetrics) {
        match self {
            Self::Hot => metrics.advance_hot(),
            Self::Warm => metrics.advance_warm(),
            Self::Cold => metrics.advance_cold(),
        }
    }
}

/// Owns one background thread that advances one window resolution across every
/// registered operation, once per period.
///
/// Each tick sweeps a copy of the current registry entries, so operations
/// registered after the scheduler started are picked up automatically. A missed
/// or late tick stretches the real time span a bucket covers rather than
/// skipping buckets; bucket boundaries are driven by the tick, not by a clock
/// read.
#[derive(Debug)]
pub(crate) struct RotationScheduler {
    period: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl RotationScheduler {
    /// Starts the rotation thread for the given horizon and period.
    pub(crate) fn new(horizon: Horizon, period: Duration, registry: Arc<OperationRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name(horizon.thread_name().to_string())
            .spawn(move || {
                loop {
                    match shutdown_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    for metrics in registry.snapshot_values() {
                        horizon.advance(&metrics);
                    }
                }
            })
            .expect("failed to spawn a bucket rotation thread");

        Self {
            period,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    /// The tick period this scheduler was started with.
    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());

        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}
