//! The listener interface the embedding framework binds against to learn
//! about discovered endpoints. Callbacks are invoked from Watch Loop context
//! with no lock held by the caller; implementations must be non-blocking or
//! self-offloading, and are responsible for their own concurrency.

use crate::endpoint::Endpoint;

pub trait DiscoveredEndpointListener: Send + Sync {
    /// A new endpoint has appeared (or the engine learned about it for the
    /// first time after a reconnect).
    fn add_discovered(&self, endpoint: &Endpoint);

    /// An endpoint is gone, either because its owner retracted it, its TTL
    /// expired, or the engine lost its connection to the store and can no
    /// longer vouch for it.
    fn remove_discovered(&self, endpoint: &Endpoint);
}

/// Identifies a listener binding so it can be detached later. The embedding
/// framework's own service id (e.g. an OSGi-style `service.id`) is a natural
/// fit; this crate treats it as an opaque key.
pub type ListenerId = i64;
