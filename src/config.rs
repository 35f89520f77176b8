// src/config.rs
//
//! Connection-URL parsing.
//!
//! A storage instance is configured by a single URL of the form
//! `s3://<accessKey>:<secretKey>@<host>/<bucket>[@<quotaGiB>]`. The optional
//! quota suffix on the bucket segment caps the space reported to the host;
//! without it, space queries fall back to fixed constants.

use crate::error::{Result, StorageError};

/// Parsed connection settings for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    /// Endpoint host (and optional port) of the S3-compatible service.
    pub host: String,
    pub bucket: String,
    /// Optional quota ceiling in GiB; zero means "no quota configured".
    pub quota_gib: u64,
}

impl StorageConfig {
    /// Parse `s3://key:secret@host/bucket[@quotaGiB]`.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("s3://")
            .ok_or_else(|| StorageError::Configuration(format!("URL must start with s3://: {url}")))?;

        let cred_sep = rest
            .find(':')
            .ok_or_else(|| StorageError::Configuration("missing ':' between access and secret key".into()))?;
        let at_pos = rest
            .find('@')
            .ok_or_else(|| StorageError::Configuration("missing '@' before host".into()))?;
        if at_pos < cred_sep {
            return Err(StorageError::Configuration("missing ':' between access and secret key".into()));
        }

        let access_key = &rest[..cred_sep];
        let secret_key = &rest[cred_sep + 1..at_pos];

        let host_and_bucket = &rest[at_pos + 1..];
        let slash = host_and_bucket
            .rfind('/')
            .ok_or_else(|| StorageError::Configuration("missing '/' between host and bucket".into()))?;
        let host = &host_and_bucket[..slash];
        let mut bucket = host_and_bucket[slash + 1..].to_string();

        // Bucket segment may carry an embedded quota: "bucket@10" = 10 GiB cap.
        let mut quota_gib = 0u64;
        if let Some(q) = bucket.find('@') {
            quota_gib = bucket[q + 1..]
                .parse()
                .map_err(|_| StorageError::Configuration(format!("invalid quota suffix in '{bucket}'")))?;
            bucket.truncate(q);
        }

        if host.is_empty() || bucket.is_empty() {
            return Err(StorageError::Configuration(format!("empty host or bucket in {url}")));
        }
        if access_key.is_empty() {
            return Err(StorageError::Configuration("empty access key".into()));
        }

        Ok(StorageConfig {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            host: host.to_string(),
            bucket,
            quota_gib,
        })
    }
}
