//! Background sampling of process CPU utilization.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::ERR_POISONED_LOCK;
use crate::pal::{Platform, PlatformFacade};

/// Periodically computes process CPU utilization into a circular history.
///
/// Each tick measures the process CPU time delta over the wall-clock delta
/// since the previous tick, divided by the processor count, as a percentage
/// clamped to `[0, 100]`. The very first tick only establishes a baseline and
/// stores nothing. Sampling is fail-open: a tick that produces a nonsensical
/// value (zero wall delta, non-finite result) is skipped and sampling continues
/// on the next tick - a sampling problem must never affect metrics collection.
#[derive(Debug)]
pub(crate) struct ProcessCpuSampler {
    history: Arc<Mutex<SampleHistory>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct SampleHistory {
    samples: Box<[f64]>,
    cursor: usize,
    count: usize,
}

impl SampleHistory {
    fn store(&mut self, value: f64) {
        self.cursor = self
            .cursor
            .wrapping_add(1)
            .checked_rem(self.samples.len())
            .expect("history depth is at least one");

        if let Some(slot) = self.samples.get_mut(self.cursor) {
            *slot = value;
        }

        self.count = self.count.saturating_add(1).min(self.samples.len());
    }

    fn latest(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        self.samples.get(self.cursor).copied()
    }
}

impl ProcessCpuSampler {
    /// Starts the sampling thread with the given period and history depth.
    pub(crate) fn new(interval: Duration, history_depth: usize, platform: PlatformFacade) -> Self {
        let history = Arc::new(Mutex::new(SampleHistory {
            samples: vec![0.0; history_depth.max(1)].into_boxed_slice(),
            cursor: 0,
            count: 0,
        }));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let worker_history = Arc::clone(&history);

        let thread = thread::Builder::new()
            .name("on_the_clock-cpu".to_string())
            .spawn(move || {
                let mut baseline: Option<(Duration, Duration)> = None;

                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let cpu = platform.process_time();
                    let wall = platform.monotonic();

                    let Some((last_cpu, last_wall)) = baseline.replace((cpu, wall)) else {
                        // First tick: baseline only, there is no prior delta.
                        continue;
                    };

                    let cpu_delta = cpu.saturating_sub(last_cpu);
                    let wall_delta = wall.saturating_sub(last_wall);

                    if wall_delta.is_zero() {
                        continue;
                    }

                    #[expect(
                        clippy::cast_precision_loss,
                        reason = "realistic processor counts are far below f64 precision limits"
                    )]
                    let cores = platform.processor_count().get() as f64;

                    let percent =
                        cpu_delta.as_secs_f64() / (wall_delta.as_secs_f64() * cores) * 100.0;

                    if !percent.is_finite() {
                        continue;
                    }

                    worker_history
                        .lock()
                        .expect(ERR_POISONED_LOCK)
                        .store(percent.clamp(0.0, 100.0));
                }
            })
            .expect("failed to spawn the CPU sampling thread");

        Self {
            history,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    /// The most recent stored utilization percentage, or `None` if no sample
    /// has been collected yet.
    pub(crate) fn latest_sample(&self) -> Option<f64> {
        self.history.lock().expect(ERR_POISONED_LOCK).latest()
    }
}

impl Drop for ProcessCpuSampler {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the worker out of its periodic wait
        // immediately, so the join is prompt.
        drop(self.shutdown_tx.take());

        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}
