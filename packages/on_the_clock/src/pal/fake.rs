//! Fake platform implementation for testing.

use std::num::NonZero;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use new_zealand::nz;

use crate::pal::abstractions::Platform;

/// Internal state for the fake platform that can be shared between clones.
#[derive(Debug)]
struct FakePlatformState {
    monotonic: Duration,
    wall_clock: SystemTime,
    process_time: Duration,
    processor_count: NonZero<usize>,
}

/// Fake implementation of the platform abstraction for testing.
///
/// This implementation allows tests to control time values instead of relying
/// on actual system calls. Multiple clones of the same `FakePlatform` share the
/// same underlying state, allowing tests to modify time values after platform
/// creation to simulate time progression.
#[derive(Clone, Debug)]
pub(crate) struct FakePlatform {
    state: Arc<Mutex<FakePlatformState>>,
}

impl FakePlatform {
    /// Creates a new fake platform with zeroed clocks and one processor.
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakePlatformState {
                monotonic: Duration::ZERO,
                wall_clock: SystemTime::UNIX_EPOCH,
                process_time: Duration::ZERO,
                processor_count: nz!(1),
            })),
        }
    }

    /// Sets the monotonic counter value, affecting all clones.
    pub(crate) fn set_monotonic(&self, value: Duration) {
        self.lock_state().monotonic = value;
    }

    /// Advances the monotonic counter and the wall clock together.
    pub(crate) fn advance(&self, delta: Duration) {
        let mut state = self.lock_state();
        state.monotonic = state.monotonic.saturating_add(delta);
        state.wall_clock = state
            .wall_clock
            .checked_add(delta)
            .expect("fake wall clock overflowed");
    }

    /// Sets the cumulative process CPU time, affecting all clones.
    pub(crate) fn set_process_time(&self, value: Duration) {
        self.lock_state().process_time = value;
    }

    /// Sets the reported processor count, affecting all clones.
    pub(crate) fn set_processor_count(&self, value: NonZero<usize>) {
        self.lock_state().processor_count = value;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FakePlatformState> {
        self.state
            .lock()
            .expect("FakePlatform state lock should not be poisoned")
    }
}

impl Platform for FakePlatform {
    fn monotonic(&self) -> Duration {
        self.lock_state().monotonic
    }

    fn wall_clock(&self) -> SystemTime {
        self.lock_state().wall_clock
    }

    fn process_time(&self) -> Duration {
        self.lock_state().process_time
    }

    fn processor_count(&self) -> NonZero<usize> {
        self.lock_state().processor_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_with_zeroed_clocks() {
        let platform = FakePlatform::new();

        assert_eq!(platform.monotonic(), Duration::ZERO);
        assert_eq!(platform.wall_clock(), SystemTime::UNIX_EPOCH);
        assert_eq!(platform.process_time(), Duration::ZERO);
        assert_eq!(platform.processor_count(), nz!(1));
    }

    #[test]
    fn advance_moves_both_clocks() {
        let platform = FakePlatform::new();
        platform.advance(Duration::from_secs(5));

        assert_eq!(platform.monotonic(), Duration::from_secs(5));
        assert_eq!(
            platform.wall_clock(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(5)
        );
    }

    #[test]
    fn shared_state_between_clones() {
        let platform1 = FakePlatform::new();
        let platform2 = platform1.clone();

        platform1.set_process_time(Duration::from_millis(100));
        assert_eq!(platform2.process_time(), Duration::from_millis(100));

        platform2.set_processor_count(nz!(4));
        assert_eq!(platform1.processor_count(), nz!(4));
    }
}
