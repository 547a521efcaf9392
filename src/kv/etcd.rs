//! `KvClient` backed by a real etcd v2 server, spoken over its plain HTTP
//! `/v2/keys` API with `hyper`'s blocking client -- the same client/call
//! style used elsewhere in this codebase for talking to small HTTP-based
//! device APIs, just pointed at etcd instead.

use std::io::Read;
use std::time::Duration;

use hyper::header::ContentType;
use hyper::status::StatusCode;
use hyper::Client;
use serde_derive::Deserialize;
use url::Url;

use crate::error::Error;
use crate::kv::{Action, KvClient, WatchEvent, WatchOutcome};

/// How long a `watch` long-poll is allowed to block before we treat it as a
/// client-side timeout and retry with the same index. etcd's own long-poll
/// window is generally shorter than this, so in practice the server side
/// fires first; this is a backstop against a connection that never resolves.
const WATCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct EtcdNode {
    key: String,
    value: Option<String>,
    dir: Option<bool>,
    nodes: Option<Vec<EtcdNode>>,
    #[serde(rename = "modifiedIndex")]
    modified_index: i64,
}

#[derive(Deserialize)]
struct EtcdResponse {
    action: Option<String>,
    node: Option<EtcdNode>,
    #[serde(rename = "errorCode")]
    error_code: Option<i64>,
    message: Option<String>,
    index: Option<i64>,
}

/// A `KvClient` implementation talking to a single etcd v2 endpoint.
pub struct EtcdClient {
    client: Client,
    base_url: String,
}

impl EtcdClient {
    pub fn new(base_url: String) -> EtcdClient {
        let mut client = Client::new();
        // Bounds `watch`'s long-poll GET; etcd's own wait window is normally
        // shorter, so in practice this only fires against a stuck connection.
        client.set_read_timeout(Some(WATCH_TIMEOUT));
        EtcdClient { client, base_url }
    }

    fn key_url(&self, key: &str) -> String {
        let trimmed = key.trim_start_matches('/');
        format!("{}/{}", self.base_url, trimmed)
    }

    fn get(&self, url: &str) -> Result<(StatusCode, String), Error> {
        let mut res = self.client.get(url).send()?;
        let mut body = String::new();
        res.read_to_string(&mut body)?;
        Ok((res.status, body))
    }

    fn put(&self, url: &str, form_body: &str) -> Result<(StatusCode, String), Error> {
        let mut res = self
            .client
            .put(url)
            .header(ContentType::form_url_encoded())
            .body(form_body)
            .send()?;
        let mut body = String::new();
        res.read_to_string(&mut body)?;
        Ok((res.status, body))
    }

    fn delete_raw(&self, url: &str) -> Result<(StatusCode, String), Error> {
        let mut res = self.client.delete(url).send()?;
        let mut body = String::new();
        res.read_to_string(&mut body)?;
        Ok((res.status, body))
    }

    fn parse(body: &str) -> Result<EtcdResponse, Error> {
        serde_json::from_str(body).map_err(|e| Error::KvFatal(format!("unparsable etcd response: {}", e)))
    }
}

fn action_of(raw: &str) -> Action {
    match raw {
        "create" => Action::Create,
        "set" => Action::Set,
        "update" | "compareAndSwap" => Action::Update,
        "delete" | "compareAndDelete" => Action::Delete,
        "expire" => Action::Expire,
        "get" => Action::Get,
        _ => Action::Other,
    }
}

fn collect_leaves(node: EtcdNode, visit: &mut dyn FnMut(&str, &str)) {
    if node.dir.unwrap_or(false) {
        for child in node.nodes.unwrap_or_default() {
            collect_leaves(child, visit);
        }
    } else if let Some(ref value) = node.value {
        visit(&node.key, value);
    }
}

impl KvClient for EtcdClient {
    fn get_directory(&self, path: &str, visit: &mut dyn FnMut(&str, &str)) -> Result<i64, Error> {
        let mut url = Url::parse(&self.key_url(path)).map_err(|e| Error::KvFatal(e.to_string()))?;
        url.query_pairs_mut().append_pair("recursive", "true");

        let (status, body) = self.get(url.as_str())?;
        if status == StatusCode::NotFound {
            // An empty directory: nothing discovered yet, but the store is reachable.
            let parsed = Self::parse(&body)?;
            return Ok(parsed.index.unwrap_or(0));
        }
        if !status.is_success() {
            return Err(Error::KvTransient(format!("etcd GET {} returned {}", path, status)));
        }

        let parsed = Self::parse(&body)?;
        let index = parsed
            .node
            .as_ref()
            .map(|n| n.modified_index)
            .or(parsed.index)
            .unwrap_or(0);
        if let Some(node) = parsed.node {
            collect_leaves(node, visit);
        }
        Ok(index)
    }

    fn watch(&self, path: &str, from_index: i64) -> Result<WatchOutcome, Error> {
        let mut url = Url::parse(&self.key_url(path)).map_err(|e| Error::KvFatal(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("recursive", "true")
            .append_pair("wait", "true")
            .append_pair("waitIndex", &from_index.to_string());

        let result = self
            .client
            .get(url.as_str())
            .send();

        let mut res = match result {
            Ok(res) => res,
            Err(hyper::Error::Io(ref io))
                if io.kind() == std::io::ErrorKind::TimedOut || io.kind() == std::io::ErrorKind::WouldBlock =>
            {
                return Ok(WatchOutcome::Timeout);
            }
            Err(e) => return Err(Error::KvTransient(e.to_string())),
        };

        let mut body = String::new();
        res.read_to_string(&mut body)?;

        if !res.status.is_success() {
            return Err(Error::KvTransient(format!("etcd watch on {} returned {}", path, res.status)));
        }

        let parsed = Self::parse(&body)?;
        let (action, node) = match (parsed.action, parsed.node) {
            (Some(action), Some(node)) => (action, node),
            _ => return Err(Error::KvFatal("etcd watch response missing action/node".to_owned())),
        };

        Ok(WatchOutcome::Changed(WatchEvent {
            action: action_of(&action),
            index: node.modified_index,
            value: node.value.clone().unwrap_or_default(),
            key: node.key,
        }))
    }

    fn set(&self, key: &str, value: &str, ttl_secs: u64, prev_exist: bool) -> Result<(), Error> {
        let url = self.key_url(key);
        let body = format!(
            "value={}&ttl={}&prevExist={}",
            percent_encode(value),
            ttl_secs,
            prev_exist
        );
        let (status, resp_body) = self.put(&url, &body)?;
        if status.is_success() {
            Ok(())
        } else {
            let parsed = Self::parse(&resp_body).ok();
            let message = parsed
                .and_then(|p| p.message)
                .unwrap_or_else(|| status.to_string());
            Err(Error::KvTransient(format!("etcd set {} failed: {}", key, message)))
        }
    }

    fn refresh(&self, key: &str, ttl_secs: u64) -> Result<(), Error> {
        let url = self.key_url(key);
        let body = format!("ttl={}&refresh=true&prevExist=true", ttl_secs);
        let (status, resp_body) = self.put(&url, &body)?;
        if status.is_success() {
            Ok(())
        } else {
            let parsed = Self::parse(&resp_body).ok();
            let message = parsed
                .and_then(|p| p.message)
                .unwrap_or_else(|| status.to_string());
            Err(Error::KvTransient(format!("etcd refresh {} failed: {}", key, message)))
        }
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        let url = self.key_url(key);
        let (status, resp_body) = self.delete_raw(&url)?;
        if status.is_success() || status == StatusCode::NotFound {
            Ok(())
        } else {
            let parsed = Self::parse(&resp_body).ok();
            let message = parsed
                .and_then(|p| p.message)
                .unwrap_or_else(|| status.to_string());
            Err(Error::KvTransient(format!("etcd delete {} failed: {}", key, message)))
        }
    }
}

fn percent_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
