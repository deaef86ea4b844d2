//! Platform abstraction trait definitions.

use std::fmt::Debug;
use std::num::NonZero;
use std::time::{Duration, SystemTime};

/// Provides the clock and processor measurements the engine depends on.
///
/// This trait abstracts the underlying platform-specific mechanisms, allowing
/// for both real implementations (using system calls) and fake implementations
/// (for testing).
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// The monotonic high-resolution counter, as elapsed time since an
    /// arbitrary fixed epoch.
    ///
    /// Used for duration measurement, so durations are immune to wall-clock
    /// adjustments.
    fn monotonic(&self) -> Duration;

    /// The current wall-clock time, used only for timestamps.
    fn wall_clock(&self) -> SystemTime;

    /// Cumulative processor time consumed by the process so far.
    fn process_time(&self) -> Duration;

    /// The number of logical processors available to the process.
    fn processor_count(&self) -> NonZero<usize>;
}
