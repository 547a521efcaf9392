//! The in-memory table of endpoints discovered from peers via the Watch
//! Loop, fanned out to whichever listeners are currently bound. Listeners
//! read this table only through fan-out callbacks; they never mutate it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::endpoint::{self, Endpoint};
use crate::listener::{DiscoveredEndpointListener, ListenerId};

#[derive(Default)]
pub struct DiscoveryRegistry {
    // `entries` and `listeners` are never held at the same time: every
    // mutation takes one lock, copies what it needs, and releases it before
    // touching the other -- fan-out to listeners always runs against a
    // released snapshot, never with either lock held, so a listener callback
    // that re-enters the registry (e.g. from `attach_listener`) cannot
    // deadlock against it.
    entries: Mutex<HashMap<String, Endpoint>>,
    listeners: Mutex<HashMap<ListenerId, Arc<dyn DiscoveredEndpointListener>>>,
}

impl DiscoveryRegistry {
    pub fn new() -> DiscoveryRegistry {
        DiscoveryRegistry {
            entries: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Ingest an endpoint read from the store (a directory entry, or a
    /// Create/Set/Update watch action). Endpoints reflecting `own_framework_uuid`
    /// are suppressed (I2). A first sighting of a `uuid` fans `add_discovered`
    /// out to every listener; a repeat sighting is treated as an idempotent
    /// refresh and triggers no callback.
    pub fn ingest(&self, endpoint: Endpoint, own_framework_uuid: &str) {
        if endpoint.get(endpoint::FRAMEWORK_UUID).map(String::as_str) == Some(own_framework_uuid) {
            return;
        }
        let uuid = endpoint[endpoint::UUID].clone();

        let previous = {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(uuid, endpoint.clone())
        };
        if previous.is_none() {
            let listeners: Vec<_> = self.listeners.lock().unwrap().values().cloned().collect();
            for listener in &listeners {
                listener.add_discovered(&endpoint);
            }
        }
    }

    /// Remove a discovered endpoint (a Delete/Expire watch action, or a purge
    /// on disconnect). Fans `remove_discovered` out to every listener if the
    /// `uuid` was actually present.
    pub fn retract(&self, uuid: &str) {
        let removed = {
            let mut entries = self.entries.lock().unwrap();
            entries.remove(uuid)
        };
        if let Some(ref endpoint) = removed {
            let listeners: Vec<_> = self.listeners.lock().unwrap().values().cloned().collect();
            for listener in &listeners {
                listener.remove_discovered(endpoint);
            }
        }
    }

    /// Register `listener` under `id`, then replay every currently discovered
    /// endpoint to it via `add_discovered`. This is the new listener's only
    /// mechanism to learn endpoints discovered before it bound; the replay
    /// happens with no lock held, so it cannot block a concurrent `ingest`.
    pub fn attach_listener(&self, id: ListenerId, listener: Arc<dyn DiscoveredEndpointListener>) {
        {
            let mut listeners = self.listeners.lock().unwrap();
            listeners.insert(id, listener.clone());
        }
        let snapshot: Vec<Endpoint> = {
            let entries = self.entries.lock().unwrap();
            entries.values().cloned().collect()
        };
        for endpoint in &snapshot {
            listener.add_discovered(endpoint);
        }
    }

    /// Remove the listener registered under `id`. No retraction replay: the
    /// contract is simply that the listener stops being called.
    pub fn detach_listener(&self, id: ListenerId) {
        self.listeners.lock().unwrap().remove(&id);
    }

    /// Drain every discovered entry, fanning `remove_discovered` out to every
    /// listener for each. Used both by the Watch Loop on disconnect and by
    /// `stop()` during teardown.
    pub fn purge(&self) {
        let drained: Vec<Endpoint> = {
            let mut entries = self.entries.lock().unwrap();
            entries.drain().map(|(_, v)| v).collect()
        };
        if !drained.is_empty() {
            let listeners: Vec<_> = self.listeners.lock().unwrap().values().cloned().collect();
            for endpoint in &drained {
                for listener in &listeners {
                    listener.remove_discovered(endpoint);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
