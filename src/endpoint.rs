//! The data model for a single pub/sub endpoint: an unordered, string-to-string
//! property map describing one publisher or subscriber instance.

use std::collections::BTreeMap;

use crate::error::Error;

/// Required property names, as laid out in the key layout and validation rules.
pub const UUID: &str = "uuid";
pub const FRAMEWORK_UUID: &str = "framework.uuid";
pub const ADMIN_TYPE: &str = "admin.type";
pub const SERIALIZER_TYPE: &str = "serializer.type";
pub const TOPIC_SCOPE: &str = "topic.scope";
pub const TOPIC_NAME: &str = "topic.name";
pub const ENDPOINT_TYPE: &str = "type";

const REQUIRED: &[&str] = &[
    UUID,
    FRAMEWORK_UUID,
    ADMIN_TYPE,
    SERIALIZER_TYPE,
    TOPIC_SCOPE,
    TOPIC_NAME,
    ENDPOINT_TYPE,
];

/// A publisher or subscriber endpoint. Properties are kept in a `BTreeMap` so
/// that the codec emits them in a stable order (useful for tests and for
/// diffing etcd values), even though the data model makes no ordering promise.
pub type Endpoint = BTreeMap<String, String>;

/// Check that `endpoint` carries every required property, non-empty, and that
/// `type` is one of `publisher`/`subscriber`. Does not allocate a copy; callers
/// that need one should clone after validation succeeds.
pub fn validate(endpoint: &Endpoint) -> Result<(), Error> {
    for key in REQUIRED {
        match endpoint.get(*key) {
            Some(value) if !value.is_empty() => {}
            _ => {
                return Err(Error::InvalidEndpoint(format!("missing or empty property `{}`", key)));
            }
        }
    }

    match endpoint.get(ENDPOINT_TYPE).map(String::as_str) {
        Some("publisher") | Some("subscriber") => Ok(()),
        _ => Err(Error::InvalidEndpoint(
            "`type` must be `publisher` or `subscriber`".to_owned(),
        )),
    }
}

/// The etcd key under which `endpoint` is announced, given the configured root.
///
/// `/{root}/{admin.type}/{topic.scope}/{topic.name}/{uuid}`
pub fn key_for(root: &str, endpoint: &Endpoint) -> String {
    format!(
        "/{root}/{admin}/{scope}/{topic}/{uuid}",
        root = root,
        admin = endpoint[ADMIN_TYPE],
        scope = endpoint[TOPIC_SCOPE],
        topic = endpoint[TOPIC_NAME],
        uuid = endpoint[UUID]
    )
}

/// Extract the trailing `uuid` path segment from a full etcd key, as delivered
/// by a `Delete`/`Expire` watch action.
pub fn uuid_from_key(key: &str) -> Option<&str> {
    key.rsplit('/').next().filter(|segment| !segment.is_empty())
}
