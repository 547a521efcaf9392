//! An in-memory `KvClient` used to exercise the Watch and Refresh loops
//! without a running etcd server. Test code drives it through the
//! `FakeKv::remote_*`/`disconnect`/`reconnect` control surface to simulate a
//! peer announcing, expiring, or a partition.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::Error;
use crate::kv::{Action, KvClient, WatchEvent, WatchOutcome};

/// Upper bound on a single `watch` long-poll, mirroring `EtcdClient`'s own
/// `WATCH_TIMEOUT` backstop. Short enough that a test's `stop()` -- which
/// only signals `shared.running`/`shared.wake`, neither of which reaches
/// this condvar -- still sees the Watch Loop re-check `running` promptly.
const WATCH_TIMEOUT: Duration = Duration::from_millis(100);

struct Inner {
    store: BTreeMap<String, String>,
    history: Vec<WatchEvent>,
    index: i64,
    connected: bool,
}

/// `EtcdClient` always strips a leading `/` from the path/key it's given
/// before building a URL (etcd's own keyspace is absolute); mirror that here
/// so a `path` of `"pubsub"` matches stored keys of `"/pubsub/..."` the same
/// way it would against a real store.
fn normalized(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Cheap to clone: all handles share the same underlying store, the way a
/// real `KvClient` is shared between the Watch and Refresh loops.
#[derive(Clone)]
pub struct FakeKv {
    inner: Arc<(Mutex<Inner>, Condvar)>,
}

impl FakeKv {
    pub fn new() -> FakeKv {
        FakeKv {
            inner: Arc::new((
                Mutex::new(Inner {
                    store: BTreeMap::new(),
                    history: Vec::new(),
                    index: 0,
                    connected: true,
                }),
                Condvar::new(),
            )),
        }
    }

    fn push(&self, key: &str, value: &str, action: Action) {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        inner.index += 1;
        let index = inner.index;
        inner.history.push(WatchEvent {
            action,
            key: key.to_owned(),
            value: value.to_owned(),
            index,
        });
        match action {
            Action::Delete | Action::Expire => {
                inner.store.remove(key);
            }
            _ => {
                inner.store.insert(key.to_owned(), value.to_owned());
            }
        }
        cvar.notify_all();
    }

    /// Simulate a peer announcing (or updating) an endpoint at `key`.
    pub fn remote_set(&self, key: &str, value: &str) {
        self.push(key, value, Action::Set);
    }

    /// Simulate a peer retracting an endpoint.
    pub fn remote_delete(&self, key: &str) {
        self.push(key, "", Action::Delete);
    }

    /// Simulate a TTL expiry (the KV store itself generates the Expire action).
    pub fn remote_expire(&self, key: &str) {
        self.push(key, "", Action::Expire);
    }

    /// Simulate the store (or the network to it) becoming unreachable: every
    /// in-flight or subsequent call returns `KvTransient` until `reconnect`.
    pub fn disconnect(&self) {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        inner.connected = false;
        cvar.notify_all();
    }

    pub fn reconnect(&self) {
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        inner.connected = true;
        cvar.notify_all();
    }
}

impl Default for FakeKv {
    fn default() -> Self {
        FakeKv::new()
    }
}

impl KvClient for FakeKv {
    fn get_directory(&self, path: &str, visit: &mut dyn FnMut(&str, &str)) -> Result<i64, Error> {
        let (lock, _) = &*self.inner;
        let inner = lock.lock().unwrap();
        if !inner.connected {
            return Err(Error::KvTransient("fake store disconnected".to_owned()));
        }
        let path = normalized(path);
        for (key, value) in inner.store.iter().filter(|(k, _)| normalized(k).starts_with(path)) {
            visit(key, value);
        }
        Ok(inner.index)
    }

    fn watch(&self, path: &str, from_index: i64) -> Result<WatchOutcome, Error> {
        let path = normalized(path);
        let (lock, cvar) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        loop {
            if !inner.connected {
                return Err(Error::KvTransient("fake store disconnected".to_owned()));
            }
            let found = inner
                .history
                .iter()
                .find(|e| e.index >= from_index && normalized(&e.key).starts_with(path))
                .cloned();
            if let Some(event) = found {
                return Ok(WatchOutcome::Changed(event));
            }
            let (guard, result) = cvar.wait_timeout(inner, WATCH_TIMEOUT).unwrap();
            inner = guard;
            if result.timed_out() {
                return Ok(WatchOutcome::Timeout);
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64, prev_exist: bool) -> Result<(), Error> {
        let _ = ttl_secs; // the fake store does not expire entries on its own clock.
        {
            let (lock, _) = &*self.inner;
            let inner = lock.lock().unwrap();
            if !inner.connected {
                return Err(Error::KvTransient("fake store disconnected".to_owned()));
            }
            let exists = inner.store.contains_key(key);
            if prev_exist && !exists {
                return Err(Error::KvFatal(format!("key {} does not exist", key)));
            }
            if !prev_exist && exists {
                return Err(Error::KvFatal(format!("key {} already exists", key)));
            }
        }
        self.push(key, value, if prev_exist { Action::Update } else { Action::Create });
        Ok(())
    }

    fn refresh(&self, key: &str, ttl_secs: u64) -> Result<(), Error> {
        let _ = ttl_secs;
        let (lock, _) = &*self.inner;
        let inner = lock.lock().unwrap();
        if !inner.connected {
            return Err(Error::KvTransient("fake store disconnected".to_owned()));
        }
        if !inner.store.contains_key(key) {
            return Err(Error::KvFatal(format!("key {} does not exist", key)));
        }
        // A refresh renews the TTL without bumping the store's revision, so it
        // must not be added to `history` -- a concurrent `watch` must not wake.
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        {
            let (lock, _) = &*self.inner;
            let inner = lock.lock().unwrap();
            if !inner.connected {
                return Err(Error::KvTransient("fake store disconnected".to_owned()));
            }
        }
        self.push(key, "", Action::Delete);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_directory_sees_remote_writes() {
        let kv = FakeKv::new();
        kv.remote_set("/pubsub/tcp/s/t/u1", "{}");
        let mut seen = Vec::new();
        let index = kv.get_directory("/pubsub", &mut |k, v| seen.push((k.to_owned(), v.to_owned()))).unwrap();
        assert_eq!(index, 1);
        assert_eq!(seen, vec![("/pubsub/tcp/s/t/u1".to_owned(), "{}".to_owned())]);
    }

    #[test]
    fn refresh_does_not_advance_history() {
        let kv = FakeKv::new();
        kv.remote_set("/pubsub/tcp/s/t/u1", "{}");
        kv.refresh("/pubsub/tcp/s/t/u1", 30).unwrap();
        kv.refresh("/pubsub/tcp/s/t/u1", 30).unwrap();
        // A watch from the post-set index should still time out (no matching event),
        // proving refresh never appended to history.
        let (lock, _) = &*kv.inner;
        assert_eq!(lock.lock().unwrap().index, 1);
    }

    #[test]
    fn disconnect_fails_every_operation() {
        let kv = FakeKv::new();
        kv.disconnect();
        assert!(kv.get_directory("/pubsub", &mut |_, _| {}).is_err());
        assert!(kv.set("/pubsub/x", "{}", 30, false).is_err());
        assert!(kv.delete("/pubsub/x").is_err());
    }

    #[test]
    fn set_with_prev_exist_false_rejects_collision() {
        let kv = FakeKv::new();
        kv.set("/pubsub/tcp/s/t/u1", "{}", 30, false).unwrap();
        assert!(kv.set("/pubsub/tcp/s/t/u1", "{}", 30, false).is_err());
    }

    #[test]
    fn watch_times_out_instead_of_blocking_forever() {
        let kv = FakeKv::new();
        match kv.watch("/pubsub", 1) {
            Ok(WatchOutcome::Timeout) => {}
            other => panic!("expected a timeout with no pending change, got {:?}", other),
        }
    }
}
