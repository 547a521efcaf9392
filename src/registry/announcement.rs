//! The in-memory table of endpoints this process announces into the
//! key-value store. Mutated by `announceEndpoint`/`removeEndpoint` and by the
//! Refresh Loop, which flips `present` as entries are pushed out and pulled
//! back. Never touches the KV store itself -- that's the Refresh Loop's job.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::endpoint::Endpoint;

/// One endpoint this engine announces: its etcd key, its properties, and
/// whether the engine believes it is currently present in the store.
#[derive(Clone)]
pub struct AnnouncementEntry {
    pub key: String,
    pub properties: Endpoint,
    pub present: bool,
}

/// `uuid -> AnnouncementEntry`, guarded by a single mutex (I4: at most one
/// in-flight `set`/`refresh` per key, enforced by the Refresh Loop holding
/// this lock for the duration of its per-entry decision, not across the
/// network call itself).
#[derive(Default)]
pub struct AnnouncementRegistry {
    entries: Mutex<HashMap<String, AnnouncementEntry>>,
}

impl AnnouncementRegistry {
    pub fn new() -> AnnouncementRegistry {
        AnnouncementRegistry {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a freshly announced endpoint if its `uuid` is not already
    /// tracked. New entries always start with `present = false`; the Refresh
    /// Loop will push them out and flip it. Returns `true` if inserted,
    /// `false` if `uuid` was already present (last writer wins: the existing
    /// entry's properties are overwritten either way, per I1).
    pub fn put(&self, uuid: String, key: String, properties: Endpoint) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let is_new = !entries.contains_key(&uuid);
        entries.insert(
            uuid,
            AnnouncementEntry {
                key,
                properties,
                present: false,
            },
        );
        is_new
    }

    /// Remove and return the entry for `uuid`, if any.
    pub fn remove(&self, uuid: &str) -> Option<AnnouncementEntry> {
        self.entries.lock().unwrap().remove(uuid)
    }

    /// Mark `uuid` as present (pushed out successfully) or absent (the next
    /// Refresh Loop pass should re-`set` it). No-op if the entry was removed
    /// concurrently.
    pub fn set_present(&self, uuid: &str, present: bool) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(uuid) {
            entry.present = present;
        }
    }

    /// Take a snapshot of all entries, releasing the lock as soon as the copy
    /// is made. The Refresh Loop iterates this snapshot, not the live table,
    /// so it never holds the registry lock across a network call.
    pub fn snapshot(&self) -> Vec<(String, AnnouncementEntry)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(uuid, entry)| (uuid.clone(), entry.clone()))
            .collect()
    }

    /// Remove and return every entry, used by `stop()` to retract everything
    /// that was ever announced.
    pub fn drain(&self) -> Vec<AnnouncementEntry> {
        self.entries.lock().unwrap().drain().map(|(_, v)| v).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
