//! Time-sliced latency aggregates: buckets and the rotating windows that own them.

use std::sync::Mutex;

use crate::ERR_POISONED_LOCK;

/// Aggregate statistics for one discrete time slice.
///
/// A bucket only ever accumulates: samples raise the count, sum, and max and
/// lower the min. `min_nanos` starts at the `u64::MAX` sentinel; a bucket with
/// `count == 0` has no meaningful min or max.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct MetricsBucket {
    pub(crate) count: u64,
    pub(crate) total_nanos: u64,
    pub(crate) max_nanos: u64,
    pub(crate) min_nanos: u64,
}

impl MetricsBucket {
    pub(crate) const fn empty() -> Self {
        Self {
            count: 0,
            total_nanos: 0,
            max_nanos: 0,
            min_nanos: u64::MAX,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::empty();
    }

    pub(crate) fn add_sample(&mut self, duration_nanos: u64) {
        self.count = self.count.saturating_add(1);
        self.total_nanos = self.total_nanos.saturating_add(duration_nanos);
        self.max_nanos = self.max_nanos.max(duration_nanos);
        self.min_nanos = self.min_nanos.min(duration_nanos);
    }
}

/// A point-in-time copy of a window's buckets plus its write cursor.
///
/// Readers reconstruct chronological order from the cursor: the oldest bucket is
/// the one immediately after it, wrapping around the ring.
#[derive(Clone, Debug)]
pub(crate) struct WindowSnapshot {
    pub(crate) buckets: Box<[MetricsBucket]>,
    pub(crate) cursor: usize,
}

/// A fixed-size ring of buckets with exactly one current write target.
///
/// Samples land in the current bucket; an external scheduler periodically calls
/// [`advance`](Self::advance), which moves the cursor forward and resets the
/// bucket it lands on, so the write target never carries stale data. All
/// mutation is serialized by one mutex held only for the duration of an
/// in-memory array write.
///
/// A window of length zero is permitted and ignores samples and rotations.
#[derive(Debug)]
pub(crate) struct MetricsWindow {
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    buckets: Box<[MetricsBucket]>,
    cursor: usize,
}

impl MetricsWindow {
    pub(crate) fn new(bucket_count: usize) -> Self {
        Self {
            state: Mutex::new(WindowState {
                buckets: vec![MetricsBucket::empty(); bucket_count].into_boxed_slice(),
                cursor: 0,
            }),
        }
    }

    pub(crate) fn add_sample(&self, duration_nanos: u64) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        let cursor = state.cursor;

        if let Some(bucket) = state.buckets.get_mut(cursor) {
            bucket.add_sample(duration_nanos);
        }
    }

    /// Moves the write cursor forward modulo the ring length and resets the new
    /// current bucket. The bucket that falls off the logical trailing edge simply
    /// becomes the write target again on the next full cycle.
    pub(crate) fn advance(&self) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if state.buckets.is_empty() {
            return;
        }

        state.cursor = state
            .cursor
            .wrapping_add(1)
            .checked_rem(state.buckets.len())
            .expect("ring length is non-zero, checked above");

        let cursor = state.cursor;
        if let Some(bucket) = state.buckets.get_mut(cursor) {
            bucket.reset();
        }
    }

    /// Returns a defensive copy of all buckets plus the current cursor position.
    ///
    /// Holds the window lock only for the duration of the copy, so concurrent
    /// samplers are never blocked for longer than that.
    pub(crate) fn snapshot(&self) -> WindowSnapshot {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        WindowSnapshot {
            buckets: state.buckets.clone(),
            cursor: state.cursor,
        }
    }
}
