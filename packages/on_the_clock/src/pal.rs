//! Platform abstraction layer for time and processor measurements.
//!
//! This module decouples the engine from the system clocks: a monotonic
//! high-resolution counter for durations (immune to wall-clock adjustments),
//! the wall clock for timestamps, and cumulative process CPU time (via the
//! `cpu_time` package). The real implementation can be swapped for a fake in
//! tests to control time directly.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
#[cfg(test)]
pub(crate) use fake::FakePlatform;
