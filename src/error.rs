// src/error.rs
//
//! Error taxonomy for the storage engine.
//!
//! Every public operation resolves to one of these variants; transport-level
//! failures from the [`ObjectClient`](crate::client::ObjectClient) are
//! translated to the nearest entry at the call site.

use thiserror::Error;

use crate::client::{ClientError, ClientErrorKind};
use crate::listing::FileEntry;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The connection URL could not be parsed into a usable configuration.
    #[error("invalid storage configuration: {0}")]
    Configuration(String),

    /// The bucket is unreachable or misconfigured; no store call was made.
    #[error("storage unavailable")]
    Unavailable,

    /// The object does not exist (read-mode open, head, or size lookup).
    #[error("object not found: {0}")]
    NotFound(String),

    /// The handle was opened without read capability.
    #[error("handle not opened for reading")]
    ReadNotSupported,

    /// The handle was opened without write capability.
    #[error("handle not opened for writing")]
    WriteNotSupported,

    /// A whole-object download or upload failed during open or flush.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Pagination aborted mid-stream; carries everything gathered so far.
    #[error("listing aborted after {} entries", entries.len())]
    ListingIncomplete { entries: Vec<FileEntry> },

    /// Local filesystem trouble or an unclassified store failure.
    #[error("storage error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Unknown(e.to_string())
    }
}

impl StorageError {
    /// Map a transport error onto the taxonomy, labelling the object it
    /// concerned. `NotFound` survives; everything else degrades to `Unknown`.
    pub fn from_client(err: ClientError, key: &str) -> Self {
        match err.kind() {
            ClientErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Unknown(err.to_string()),
        }
    }
}
