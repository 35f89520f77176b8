// src/client.rs
//
//! Pluggable object-store transport seam.
//!
//! The engine never talks to the network directly; it goes through
//! [`ObjectClient`], a blocking trait with per-call timeouts. The production
//! implementation lives in [`crate::s3_client`]; tests substitute an
//! in-memory client.

use std::time::Duration;

use thiserror::Error;

/// How a failed transport call should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// Transient network or session trouble; a retry may succeed.
    Retryable,
    /// The addressed object (or bucket) does not exist.
    NotFound,
    /// Permanent failure; retrying will not help.
    Fatal,
}

/// A transport-level failure with its retry classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ClientError {
    kind: ClientErrorKind,
    message: String,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Retryable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::NotFound, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Fatal, message)
    }

    pub fn kind(&self) -> ClientErrorKind {
        self.kind
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// One object returned by a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// One page of a delimited, paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    pub common_prefixes: Vec<String>,
    pub truncated: bool,
    pub next_marker: Option<String>,
}

/// Blocking object-store operations against one bucket.
///
/// Every call carries its own timeout budget; there is no retry at this
/// layer. Implementations must be shareable across threads, since the
/// capacity accountant holds a clone alongside the request path.
pub trait ObjectClient: Send + Sync {
    /// Fetch one listing page starting after `marker`.
    fn list_page(
        &self,
        prefix: Option<&str>,
        marker: Option<&str>,
        delimiter: Option<&str>,
        max_keys: i32,
        timeout: Duration,
    ) -> ClientResult<ListPage>;

    /// Download a whole object.
    fn get(&self, key: &str, timeout: Duration) -> ClientResult<Vec<u8>>;

    /// Upload a whole object, overwriting any existing value.
    fn put(&self, key: &str, data: &[u8], timeout: Duration) -> ClientResult<()>;

    /// Existence/metadata check without fetching the body.
    fn head(&self, key: &str, timeout: Duration) -> ClientResult<u64>;

    /// Delete one object. Deleting a missing key is not an error.
    fn delete(&self, key: &str, timeout: Duration) -> ClientResult<()>;

    /// Server-side copy within the bucket.
    fn copy(&self, src_key: &str, dst_key: &str, timeout: Duration) -> ClientResult<()>;

    /// Cheap reachability check for the configured bucket.
    fn test_bucket(&self, timeout: Duration) -> ClientResult<()>;

    /// Create the configured bucket.
    fn create_bucket(&self, timeout: Duration) -> ClientResult<()>;

    /// Names of all buckets visible to these credentials.
    fn list_buckets(&self, timeout: Duration) -> ClientResult<Vec<String>>;
}
