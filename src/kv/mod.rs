//! A thin, transport-agnostic wrapper over an etcd v2-family key-value store:
//! exactly the five operations the Watch and Refresh loops need, so that
//! those loops can be exercised against a `FakeKv` in tests instead of a
//! running etcd server.

pub mod etcd;
#[cfg(any(test, feature = "testing"))]
pub mod fake;

use crate::error::Error;

/// What kind of change a watch woke up for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Create,
    Set,
    Update,
    Delete,
    Expire,
    Get,
    Other,
}

/// A single change delivered by `KvClient::watch`.
#[derive(Clone, Debug)]
pub struct WatchEvent {
    pub action: Action,
    pub key: String,
    pub value: String,
    pub index: i64,
}

/// The result of one `watch` call: either a change, or a server-side
/// long-poll timeout that the caller should retry with the same index.
#[derive(Clone, Debug)]
pub enum WatchOutcome {
    Changed(WatchEvent),
    Timeout,
}

/// Operations consumed by the Watch and Refresh loops. Implementations must
/// be safe for concurrent use by two callers: one calling only `watch`, the
/// other calling only `set`/`refresh`/`delete` (`get_directory` is called by
/// the watch side only, during resync).
pub trait KvClient: Send + Sync {
    /// Enumerate every leaf under `path`, invoking `visit(key, value)` for
    /// each. Returns the store's current global revision, to seed the first
    /// `watch` call.
    fn get_directory(&self, path: &str, visit: &mut dyn FnMut(&str, &str)) -> Result<i64, Error>;

    /// Block until a change at or after `from_index` under `path`, or until
    /// the store's own long-poll window elapses.
    fn watch(&self, path: &str, from_index: i64) -> Result<WatchOutcome, Error>;

    /// Write `value` at `key` with the given TTL. `prev_exist` mirrors etcd's
    /// `prevExist` precondition: `false` requires the key does *not* already
    /// exist (so two announcers colliding on the same `uuid` surface as an
    /// error instead of silently overwriting each other), `true` requires it
    /// already exists.
    fn set(&self, key: &str, value: &str, ttl_secs: u64, prev_exist: bool) -> Result<(), Error>;

    /// Renew `key`'s TTL without touching its value or revision, so peers'
    /// watches do not fire on heartbeats.
    fn refresh(&self, key: &str, ttl_secs: u64) -> Result<(), Error>;

    /// Remove `key`.
    fn delete(&self, key: &str) -> Result<(), Error>;
}
