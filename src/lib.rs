//! A pub/sub endpoint discovery engine backed by an etcd v2-style key-value
//! store: two background loops (announce/refresh, watch/discover) plus a
//! facade the embedding framework drives to announce its own endpoints and
//! attach listeners for peers'.
//!
//! See [`Engine`] for the facade, [`kv::KvClient`] for the storage adapter
//! seam, and [`codec`] for the wire format of a single endpoint.

#[macro_use]
extern crate log;

pub mod codec;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod kv;
pub mod listener;
mod refresh;
pub mod registry;
mod signal;
mod watch;

pub use crate::config::Config;
pub use crate::endpoint::Endpoint;
pub use crate::engine::Engine;
pub use crate::error::Error;
pub use crate::listener::{DiscoveredEndpointListener, ListenerId};
