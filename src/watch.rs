//! The Watch Loop: resync via a directory read, then ride etcd's
//! index-driven change feed. On disconnect, purge everything we've
//! discovered and reconnect -- while disconnected we can no longer vouch for
//! any peer endpoint, so local consumers must tear down and re-learn them.

use std::time::Duration;

use rand::Rng;

use crate::codec;
use crate::endpoint::{self, Endpoint};
use crate::engine::Shared;
use crate::kv::{Action, WatchOutcome};

/// Base backoff between reconnect attempts. A small jitter is added on top
/// so that a fleet of processes which all lost the store at once do not
/// all hammer it again in lockstep.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// The per-endpoint dump `original_source` prints under `disc->verbose`
/// (uuid/type/admin/serializer) in `pubsub_discovery_addDiscoveredEndpoint`/
/// `removeDiscoveredEndpoint`.
fn log_endpoint(verbose: bool, action: &str, endpoint: &Endpoint) {
    if !verbose {
        return;
    }
    debug!(
        "{} endpoint uuid={} type={} admin={} serializer={}",
        action,
        endpoint.get(endpoint::UUID).map(String::as_str).unwrap_or("?"),
        endpoint.get(endpoint::ENDPOINT_TYPE).map(String::as_str).unwrap_or("?"),
        endpoint.get(endpoint::ADMIN_TYPE).map(String::as_str).unwrap_or("?"),
        endpoint.get(endpoint::SERIALIZER_TYPE).map(String::as_str).unwrap_or("?"),
    );
}

pub fn run(shared: std::sync::Arc<Shared>) {
    let mut connected = false;
    let mut mod_index: i64 = 0;

    while shared.running.get() {
        let was_connected = connected;

        if !connected {
            if shared.config.verbose {
                debug!("reading discovery directory at {}", shared.config.root_path());
            }
            let framework_uuid = shared.config.framework_uuid.clone();
            let discovered = &shared.discovered;
            let verbose = shared.config.verbose;
            let result = shared.kv.get_directory(shared.config.root_path(), &mut |key, value| {
                match codec::decode(value) {
                    Ok(props) => {
                        log_endpoint(verbose, "add", &props);
                        discovered.ingest(props, &framework_uuid);
                    }
                    Err(e) => warn!("skipping malformed endpoint at {}: {}", key, e),
                }
            });
            match result {
                Ok(index) => {
                    mod_index = index;
                    connected = true;
                    info!("discovery watch connected at revision {}", index);
                }
                Err(e) => {
                    warn!("could not read discovery directory: {}", e);
                    connected = false;
                }
            }
        }

        if connected {
            match shared.kv.watch(shared.config.root_path(), mod_index + 1) {
                Ok(WatchOutcome::Changed(event)) => {
                    mod_index = event.index;
                    match event.action {
                        Action::Create | Action::Set | Action::Update => match codec::decode(&event.value) {
                            Ok(props) => {
                                log_endpoint(shared.config.verbose, "add", &props);
                                shared.discovered.ingest(props, &shared.config.framework_uuid);
                            }
                            Err(e) => warn!("skipping malformed watch update for {}: {}", event.key, e),
                        },
                        Action::Delete | Action::Expire => {
                            if let Some(uuid) = endpoint::uuid_from_key(&event.key) {
                                if shared.config.verbose {
                                    debug!("remove endpoint uuid={}", uuid);
                                }
                                shared.discovered.retract(uuid);
                            }
                        }
                        Action::Get | Action::Other => {}
                    }
                }
                Ok(WatchOutcome::Timeout) => {
                    // Nothing changed before the store's long-poll window elapsed;
                    // retry immediately with the same index.
                }
                Err(e) => {
                    warn!("lost connection to discovery store: {}", e);
                    connected = false;
                }
            }
        }

        if was_connected && !connected {
            if shared.config.verbose {
                debug!("removing all discovered entries ({}) -- not connected", shared.discovered.len());
            }
            shared.discovered.purge();
        }

        if !connected {
            if !shared.running.get() {
                break;
            }
            shared.running.sleep_while_running(jittered(RECONNECT_BACKOFF));
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let extra_ms = rand::thread_rng().gen_range(0, 500);
    base + Duration::from_millis(extra_ms)
}
