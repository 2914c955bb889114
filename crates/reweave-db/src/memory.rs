//! An in-memory [`ActivityStore`] for tests and hostless runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use reweave_core::ActivityStore;
use reweave_types::ActivityId;

#[derive(Debug, Default)]
struct MemoryStoreState {
    flags: BTreeMap<ActivityId, bool>,
    calls: Vec<(Vec<ActivityId>, bool)>,
}

/// Records reversal flags in memory and remembers every call.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    state: Mutex<MemoryStoreState>,
}

impl MemoryActivityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current reversal flag for a key, if it was ever marked.
    pub fn reversed(&self, key: ActivityId) -> Option<bool> {
        self.lock().flags.get(&key).copied()
    }

    /// Every `mark_reversed` call in order.
    pub fn calls(&self) -> Vec<(Vec<ActivityId>, bool)> {
        self.lock().calls.clone()
    }
}

impl ActivityStore for MemoryActivityStore {
    fn mark_reversed(&self, keys: &[ActivityId], reversed: bool) {
        let mut state = self.lock();
        for key in keys {
            state.flags.insert(*key, reversed);
        }
        state.calls.push((keys.to_vec(), reversed));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flags_reflect_the_latest_mark() {
        let store = MemoryActivityStore::new();
        let keys = [ActivityId::from(1), ActivityId::from(2)];

        store.mark_reversed(&keys, true);
        assert_eq!(store.reversed(ActivityId::from(1)), Some(true));

        store.mark_reversed(&keys[..1], false);
        assert_eq!(store.reversed(ActivityId::from(1)), Some(false));
        assert_eq!(store.reversed(ActivityId::from(2)), Some(true));
        assert_eq!(store.reversed(ActivityId::from(3)), None);
        assert_eq!(store.calls().len(), 2);
    }
}
