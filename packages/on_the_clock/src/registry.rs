//! The name → metrics registry shared by callers and rotation workers.

use std::sync::{Arc, Mutex};

use foldhash::{HashMap, HashMapExt};

use crate::ERR_POISONED_LOCK;
use crate::metrics::OperationMetrics;
use crate::options::{MonitoringOptions, OverflowPolicy};

/// Mapping from operation name (case-sensitive) to its metrics state.
///
/// Inserts are serialized by one lock; the values themselves are immutable in
/// identity and internally synchronized, so using a returned entry requires no
/// further locking. Entries are never evicted - when the registry is at capacity
/// the overflow policy rejects new names instead.
#[derive(Debug)]
pub(crate) struct OperationRegistry {
    entries: Mutex<HashMap<Arc<str>, Arc<OperationMetrics>>>,
}

impl OperationRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the existing entry for `name`, or creates one sized from the
    /// given options.
    ///
    /// Returns `None` when the registry is at capacity under the drop-new
    /// overflow policy, signaling the caller to use a no-op scope rather than
    /// grow state without bound.
    pub(crate) fn get_or_create(
        &self,
        name: &str,
        options: &MonitoringOptions,
    ) -> Option<Arc<OperationMetrics>> {
        let mut entries = self.entries.lock().expect(ERR_POISONED_LOCK);

        if let Some(existing) = entries.get(name) {
            return Some(Arc::clone(existing));
        }

        if entries.len() >= options.max_operation_count
            && options.overflow_policy == OverflowPolicy::DropNew
        {
            return None;
        }

        let name: Arc<str> = Arc::from(name);
        let created = Arc::new(OperationMetrics::new(Arc::clone(&name), options));
        entries.insert(name, Arc::clone(&created));
        Some(created)
    }

    /// Looks up an existing entry without creating one.
    pub(crate) fn get(&self, name: &str) -> Option<Arc<OperationMetrics>> {
        self.entries
            .lock()
            .expect(ERR_POISONED_LOCK)
            .get(name)
            .map(Arc::clone)
    }

    /// Copies out the current set of entries.
    ///
    /// Holds the registry lock only for the copy; rotation sweeps and snapshot
    /// capture then work on the copy without blocking callers.
    pub(crate) fn snapshot_values(&self) -> Vec<Arc<OperationMetrics>> {
        self.entries
            .lock()
            .expect(ERR_POISONED_LOCK)
            .values()
            .map(Arc::clone)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect(ERR_POISONED_LOCK).len()
    }
}
