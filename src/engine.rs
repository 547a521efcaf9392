//! The facade the embedding framework drives: lifecycle, announce/remove,
//! and listener attach/detach, wired to the Watch Loop and Refresh Loop
//! running on their own threads.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::endpoint::{self, Endpoint};
use crate::error::Error;
use crate::kv::KvClient;
use crate::listener::{DiscoveredEndpointListener, ListenerId};
use crate::refresh;
use crate::registry::{AnnouncementRegistry, DiscoveryRegistry};
use crate::signal::{RunFlag, WakeSignal};
use crate::watch;

/// State shared between the facade and both loop threads. Never exposed
/// directly to the embedder; `Engine` holds it behind an `Arc` so the loop
/// threads can outlive any single facade call.
pub struct Shared {
    pub config: Config,
    pub kv: Arc<dyn KvClient>,
    pub announced: AnnouncementRegistry,
    pub discovered: DiscoveryRegistry,
    pub running: RunFlag,
    pub wake: WakeSignal,
}

/// A created-but-possibly-not-yet-started discovery engine. `create` does no
/// I/O; `start` spawns the Watch and Refresh loops.
pub struct Engine {
    shared: Arc<Shared>,
    watch_handle: Option<JoinHandle<()>>,
    refresh_handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Build an engine against `kv`, using `config` for the root path, TTL,
    /// and self-suppression uuid. Does not start the loops.
    pub fn create(config: Config, kv: Arc<dyn KvClient>) -> Engine {
        let shared = Arc::new(Shared {
            config,
            kv,
            announced: AnnouncementRegistry::new(),
            discovered: DiscoveryRegistry::new(),
            running: RunFlag::new(),
            wake: WakeSignal::new(),
        });
        Engine {
            shared,
            watch_handle: None,
            refresh_handle: None,
        }
    }

    /// Spawn the Watch Loop and Refresh Loop. A no-op if already started.
    pub fn start(&mut self) {
        if self.watch_handle.is_some() {
            return;
        }
        self.shared.running.set(true);

        let watch_shared = self.shared.clone();
        self.watch_handle = Some(thread::spawn(move || watch::run(watch_shared)));

        let refresh_shared = self.shared.clone();
        self.refresh_handle = Some(thread::spawn(move || refresh::run(refresh_shared)));

        info!("pubsub discovery engine started");
    }

    /// Signal both loops to stop, join them, fan `removeDiscovered` out for
    /// everything still in the Discovery Registry, then delete every
    /// `present` announcement from the KV store. Idempotent.
    pub fn stop(&mut self) {
        self.shared.running.set(false);
        self.shared.wake.notify();

        if let Some(handle) = self.watch_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.refresh_handle.take() {
            let _ = handle.join();
        }

        self.shared.discovered.purge();

        for entry in self.shared.announced.drain() {
            if entry.present {
                if let Err(e) = self.shared.kv.delete(&entry.key) {
                    warn!("failed to delete {} during stop: {}", entry.key, e);
                }
            }
        }

        info!("pubsub discovery engine stopped");
    }

    /// Stop the engine (if still running) and release it. Present for
    /// symmetry with the original bundle lifecycle; dropping an `Engine`
    /// that was never stopped leaves its announcements live in the store
    /// until their TTL lapses.
    pub fn destroy(mut self) {
        self.stop();
    }

    /// Validate `properties`, then register them for announcement. The
    /// Refresh Loop picks the entry up on its next pass (woken immediately
    /// rather than waiting out the current interval). Fails with
    /// `InvalidEndpoint` if `properties` is missing a required field.
    pub fn announce_endpoint(&self, properties: Endpoint) -> Result<(), Error> {
        endpoint::validate(&properties)?;
        let uuid = properties[endpoint::UUID].clone();
        let key = endpoint::key_for(self.shared.config.root_path(), &properties);
        self.shared.announced.put(uuid, key, properties);
        self.shared.wake.notify();
        Ok(())
    }

    /// Stop announcing the endpoint identified by `properties["uuid"]`. If it
    /// was currently present in the store, deletes it synchronously. Fails
    /// with `MissingUuid` if `properties` carries no `uuid`.
    pub fn remove_endpoint(&self, properties: &Endpoint) -> Result<(), Error> {
        let uuid = properties.get(endpoint::UUID).ok_or(Error::MissingUuid)?;
        if let Some(entry) = self.shared.announced.remove(uuid) {
            if entry.present {
                self.shared.kv.delete(&entry.key)?;
            }
        }
        Ok(())
    }

    /// Bind `listener` under `id`, replaying every currently discovered
    /// endpoint to it.
    pub fn attach_listener(&self, id: ListenerId, listener: Arc<dyn DiscoveredEndpointListener>) {
        self.shared.discovered.attach_listener(id, listener);
    }

    /// Unbind the listener registered under `id`.
    pub fn detach_listener(&self, id: ListenerId) {
        self.shared.discovered.detach_listener(id);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.watch_handle.is_some() || self.refresh_handle.is_some() {
            self.stop();
        }
    }
}
