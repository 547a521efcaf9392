//! Translate between an `Endpoint` and the compact JSON object stored as an
//! etcd value. Mirrors `pubsub_discovery_createJsonEndpoint` /
//! `pubsub_discovery_parseEndpoint` in the original implementation: every
//! property is emitted as a JSON string, and decoding immediately revalidates
//! the required fields so an invalid value never escapes as an `Endpoint`.

use serde_json::Value;

use crate::endpoint::{self, Endpoint};
use crate::error::Error;

/// Serialize `endpoint` to the compact JSON object stored as the etcd value.
/// Field order follows the `BTreeMap`'s own (alphabetical) order; this is
/// stable but not otherwise meaningful, extra transport-specific fields are
/// carried through verbatim.
pub fn encode(endpoint: &Endpoint) -> String {
    // Every property is already a String, so this can't fail.
    serde_json::to_string(endpoint).expect("Endpoint only contains Strings")
}

/// Parse a JSON object into an `Endpoint`, then validate it. Rejects
/// non-object roots and anything that fails `endpoint::validate`, returning
/// no partial map on failure so a caller can never observe a half-decoded
/// endpoint.
pub fn decode(bytes: &str) -> Result<Endpoint, Error> {
    let root: Value = serde_json::from_str(bytes)?;
    let object = match root {
        Value::Object(map) => map,
        _ => return Err(Error::Decode("etcd value is not a JSON object".to_owned())),
    };

    let mut props = Endpoint::new();
    for (key, value) in object {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        props.insert(key, value);
    }

    endpoint::validate(&props)?;
    Ok(props)
}
