//! Keyed store of live schedule handles.
//!
//! Setting a handle under a key that already holds one cancels the old
//! handle inside the map's entry lock, so a key never has two live schedules.

use super::handle::ScheduleHandle;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::debug;

#[derive(Debug)]
pub struct ScheduleRegistry<K>
where
    K: Eq + Hash,
{
    handles: DashMap<K, ScheduleHandle<K>>,
}

impl<K> ScheduleRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Store `handle`, cancelling whatever was registered under its key.
    pub fn set(&self, handle: ScheduleHandle<K>) {
        match self.handles.entry(handle.key().clone()) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(handle);
                previous.cancel();
                debug!(key = ?previous.key(), "ScheduleRegistry::set: replaced and cancelled previous schedule");
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
            }
        }
    }

    /// Handle registered under `key`, if any.
    pub fn get(&self, key: &K) -> Option<ScheduleHandle<K>> {
        self.handles.get(key).map(|h| h.value().clone())
    }

    /// Remove without cancelling; the caller owns the returned handle.
    pub fn remove(&self, key: &K) -> Option<ScheduleHandle<K>> {
        self.handles.remove(key).map(|(_, handle)| handle)
    }

    /// Cancel and remove. Returns false if nothing was registered.
    pub fn cancel(&self, key: &K) -> bool {
        match self.handles.remove(key) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel and remove every schedule whose key matches; returns the removed keys.
    pub fn cancel_all_matching<P>(&self, predicate: P) -> Vec<K>
    where
        P: Fn(&K) -> bool,
    {
        let mut removed = Vec::new();
        self.handles.retain(|key, handle| {
            if predicate(key) {
                handle.cancel();
                removed.push(key.clone());
                false
            } else {
                true
            }
        });
        debug!(removed = removed.len(), "ScheduleRegistry::cancel_all_matching: done");
        removed
    }

    /// Cancel and remove everything; returns how many were removed.
    pub fn cancel_all(&self) -> usize {
        self.cancel_all_matching(|_| true).len()
    }

    /// True only if a handle is registered and still live.
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.handles.get(key).map(|h| !h.is_cancelled()).unwrap_or(false)
    }

    /// Number of registered schedules.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// True if no schedules are registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Keys of all registered schedules.
    pub fn keys(&self) -> Vec<K> {
        self.handles.iter().map(|e| e.key().clone()).collect()
    }
}

impl<K> Default for ScheduleRegistry<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
