//! The Refresh Loop: keeps every announced endpoint's TTL alive in the KV
//! store, re-`set`-ing any entry the store has forgotten about (a prior
//! `refresh` failure, or the store having expired it after we fell behind).

use std::time::Duration;

use rand::Rng;

use crate::codec;
use crate::engine::Shared;

pub fn run(shared: std::sync::Arc<Shared>) {
    while shared.running.get() {
        for (uuid, entry) in shared.announced.snapshot() {
            let result = if entry.present {
                shared.kv.refresh(&entry.key, shared.config.etcd_ttl)
            } else {
                let value = codec::encode(&entry.properties);
                shared.kv.set(&entry.key, &value, shared.config.etcd_ttl, false)
            };

            match result {
                Ok(()) => shared.announced.set_present(&uuid, true),
                Err(e) => {
                    warn!("failed to refresh {} ({}): {}", uuid, entry.key, e);
                    shared.announced.set_present(&uuid, false);
                }
            }
        }

        if !shared.running.get() {
            break;
        }
        shared.wake.wait_timeout(jittered(shared.config.refresh_interval_secs()));
    }
}

/// Half the TTL, with up to 10% jitter subtracted so that entries announced
/// at slightly different times do not all refresh in lockstep.
fn jittered(interval_secs: u64) -> Duration {
    if interval_secs == 0 {
        return Duration::from_millis(0);
    }
    let max_skew_ms = (interval_secs * 1000) / 10;
    let skew_ms = if max_skew_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0, max_skew_ms)
    };
    Duration::from_secs(interval_secs) - Duration::from_millis(skew_ms)
}
