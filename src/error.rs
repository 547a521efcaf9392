//! Error-handling.

use std::error;
use std::fmt;
use std::io;

/// An error that arose while announcing, discovering, or talking to the
/// backing key-value store.
#[derive(Debug)]
pub enum Error {
    /// An endpoint was missing a required property, or `type` was not
    /// `publisher`/`subscriber`.
    InvalidEndpoint(String),

    /// `removeEndpoint` was called with properties that had no `uuid`.
    MissingUuid,

    /// The key-value store could not be reached, or returned an error we expect to
    /// be transient (connection refused, timeout, 5xx). The caller should back off
    /// and retry.
    KvTransient(String),

    /// The key-value store rejected the request in a way that a retry will not fix
    /// (malformed URL, unexpected response shape). Logged, never silently ignored,
    /// but does not stop either loop.
    KvFatal(String),

    /// A value read from the store was not valid JSON, or decoded to a JSON value
    /// that was not an object.
    Decode(String),

    /// The engine configuration was incomplete or malformed (e.g. no
    /// `framework.uuid` was supplied by the host).
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidEndpoint(ref msg) => write!(f, "invalid endpoint: {}", msg),
            Error::MissingUuid => write!(f, "endpoint is missing its uuid"),
            Error::KvTransient(ref msg) => write!(f, "key-value store unavailable: {}", msg),
            Error::KvFatal(ref msg) => write!(f, "key-value store protocol error: {}", msg),
            Error::Decode(ref msg) => write!(f, "could not decode endpoint: {}", msg),
            Error::InvalidConfig(ref msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::InvalidEndpoint(_) => "invalid endpoint",
            Error::MissingUuid => "endpoint is missing its uuid",
            Error::KvTransient(_) => "key-value store unavailable",
            Error::KvFatal(_) => "key-value store protocol error",
            Error::Decode(_) => "could not decode endpoint",
            Error::InvalidConfig(_) => "invalid configuration",
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::KvTransient(err.to_string())
    }
}

impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Error {
        Error::KvTransient(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::Decode(err.to_string())
    }
}
