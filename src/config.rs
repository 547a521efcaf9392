//! Configuration for the discovery engine: the enumerated keys, their
//! defaults, and a loader from the loose property map an embedding
//! framework hands its bundles at activation time.

use std::collections::HashMap;

use crate::error::Error;

pub const KEY_SERVER_IP: &str = "discovery.server.ip";
pub const KEY_SERVER_PORT: &str = "discovery.server.port";
pub const KEY_SERVER_PATH: &str = "discovery.server.path";
pub const KEY_ETCD_TTL: &str = "discovery.etcd.ttl";
pub const KEY_VERBOSE: &str = "discovery.verbose";
pub const KEY_FRAMEWORK_UUID: &str = "framework.uuid";

const DEFAULT_SERVER_IP: &str = "127.0.0.1";
const DEFAULT_SERVER_PORT: u16 = 2379;
const DEFAULT_SERVER_PATH: &str = "pubsub";
const DEFAULT_ETCD_TTL: u64 = 30;
const DEFAULT_VERBOSE: bool = false;

/// Fully resolved engine configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_ip: String,
    pub server_port: u16,
    pub server_path: String,
    pub etcd_ttl: u64,
    pub verbose: bool,
    pub framework_uuid: String,
}

impl Config {
    /// Build a `Config` from the embedding framework's bundle properties,
    /// applying the `spec.md` §6 defaults for everything except
    /// `framework.uuid`, which the host must supply.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Config, Error> {
        let framework_uuid = props
            .get(KEY_FRAMEWORK_UUID)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::InvalidConfig(format!("missing `{}`", KEY_FRAMEWORK_UUID)))?
            .clone();

        Ok(Config {
            server_ip: props
                .get(KEY_SERVER_IP)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SERVER_IP.to_owned()),
            server_port: props
                .get(KEY_SERVER_PORT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            server_path: props
                .get(KEY_SERVER_PATH)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SERVER_PATH.to_owned()),
            etcd_ttl: props
                .get(KEY_ETCD_TTL)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ETCD_TTL),
            verbose: props
                .get(KEY_VERBOSE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_VERBOSE),
            framework_uuid,
        })
    }

    /// The base URL of the etcd v2 keys API, e.g. `http://127.0.0.1:2379/v2/keys`.
    pub fn etcd_base_url(&self) -> String {
        format!("http://{}:{}/v2/keys", self.server_ip, self.server_port)
    }

    pub fn root_path(&self) -> &str {
        &self.server_path
    }

    /// Half the TTL, rounded down, used to schedule refresh-loop wakeups.
    pub fn refresh_interval_secs(&self) -> u64 {
        self.etcd_ttl / 2
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn applies_defaults() {
        let mut props = HashMap::new();
        props.insert(KEY_FRAMEWORK_UUID.to_owned(), "fw1".to_owned());
        let config = Config::from_properties(&props).unwrap();
        assert_eq!(config.server_ip, DEFAULT_SERVER_IP);
        assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
        assert_eq!(config.server_path, DEFAULT_SERVER_PATH);
        assert_eq!(config.etcd_ttl, DEFAULT_ETCD_TTL);
        assert!(!config.verbose);
    }

    #[test]
    fn rejects_missing_framework_uuid() {
        let props = HashMap::new();
        assert!(Config::from_properties(&props).is_err());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let mut props = HashMap::new();
        props.insert(KEY_FRAMEWORK_UUID.to_owned(), "fw1".to_owned());
        props.insert(KEY_SERVER_IP.to_owned(), "10.0.0.5".to_owned());
        props.insert(KEY_SERVER_PORT.to_owned(), "4001".to_owned());
        props.insert(KEY_ETCD_TTL.to_owned(), "10".to_owned());
        props.insert(KEY_VERBOSE.to_owned(), "true".to_owned());
        let config = Config::from_properties(&props).unwrap();
        assert_eq!(config.server_ip, "10.0.0.5");
        assert_eq!(config.server_port, 4001);
        assert_eq!(config.etcd_ttl, 10);
        assert!(config.verbose);
        assert_eq!(config.refresh_interval_secs(), 5);
    }
}
