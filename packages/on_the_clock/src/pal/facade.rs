//! Platform facade for switching between real and fake implementations.

use std::num::NonZero;
use std::time::{Duration, SystemTime};

use crate::pal::abstractions::Platform;
#[cfg(test)]
use crate::pal::fake::FakePlatform;
use crate::pal::real::RealPlatform;

/// Facade that allows switching between real and fake platform implementations.
///
/// This enum provides a unified interface to either the real platform (using
/// actual system calls) or the fake platform (for testing).
#[derive(Clone, Debug)]
pub(crate) enum PlatformFacade {
    /// Real platform implementation using system calls.
    Real(RealPlatform),

    /// Fake platform implementation for testing.
    #[cfg(test)]
    Fake(FakePlatform),
}

impl PlatformFacade {
    /// Creates a new platform facade using the real implementation.
    pub(crate) fn real() -> Self {
        Self::Real(RealPlatform)
    }

    /// Creates a new platform facade using the fake implementation.
    #[cfg(test)]
    pub(crate) fn fake(fake_platform: FakePlatform) -> Self {
        Self::Fake(fake_platform)
    }
}

impl Platform for PlatformFacade {
    fn monotonic(&self) -> Duration {
        match self {
            Self::Real(platform) => platform.monotonic(),
            #[cfg(test)]
            Self::Fake(platform) => platform.monotonic(),
        }
    }

    fn wall_clock(&self) -> SystemTime {
        match self {
            Self::Real(platform) => platform.wall_clock(),
            #[cfg(test)]
            Self::Fake(platform) => platform.wall_clock(),
        }
    }

    fn process_time(&self) -> Duration {
        match self {
            Self::Real(platform) => platform.process_time(),
            #[cfg(test)]
            Self::Fake(platform) => platform.process_time(),
        }
    }

    fn processor_count(&self) -> NonZero<usize> {
        match self {
            Self::Real(platform) => platform.processor_count(),
            #[cfg(test)]
            Self::Fake(platform) => platform.processor_count(),
        }
    }
}
