//! Real platform implementation using system calls.

use std::num::NonZero;
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use cpu_time::ProcessTime;
use new_zealand::nz;

use crate::pal::abstractions::Platform;

/// Fixed epoch for the monotonic counter. Initialized on first use; only the
/// differences between readings matter.
static MONOTONIC_EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Real implementation of the platform abstraction using the system clocks and
/// the `cpu_time` package.
#[derive(Clone, Debug)]
pub(crate) struct RealPlatform;

impl Platform for RealPlatform {
    fn monotonic(&self) -> Duration {
        MONOTONIC_EPOCH.elapsed()
    }

    fn wall_clock(&self) -> SystemTime {
        SystemTime::now()
    }

    fn process_time(&self) -> Duration {
        ProcessTime::now().as_duration()
    }

    fn processor_count(&self) -> NonZero<usize> {
        thread::available_parallelism().unwrap_or(nz!(1))
    }
}
