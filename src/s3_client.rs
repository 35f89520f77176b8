// src/s3_client.rs
//
//! Thread-safe, blocking wrapper around the async AWS Rust SDK.
//!
//! Implements [`ObjectClient`] for a single S3-compatible bucket. The SDK is
//! async; every trait method resolves its future on a shared runtime and
//! applies the caller-supplied timeout, so the rest of the crate stays
//! synchronous.

use std::future::Future;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client;
use log::{debug, warn};
use once_cell::sync::Lazy;
use tokio::runtime::Handle;
use tokio::task;

use crate::client::{ClientError, ClientResult, ListPage, ObjectClient, ObjectInfo};
use crate::config::StorageConfig;

pub const DEFAULT_REGION: &str = "us-east-1";

// ---------------------------------------------------------------------------
//  Shared runtime: resolve futures whether or not we're inside tokio ---------
// ---------------------------------------------------------------------------
static RT: Lazy<tokio::runtime::Runtime> =
    Lazy::new(|| tokio::runtime::Runtime::new().expect("tokio runtime"));

fn block_on<F: Future>(fut: F) -> F::Output {
    match Handle::try_current() {
        Ok(handle) => task::block_in_place(|| handle.block_on(fut)),
        Err(_) => RT.block_on(fut),
    }
}

/// Resolve `fut` with a hard deadline; a deadline miss is a retryable error.
fn block_on_timeout<F>(fut: F, timeout: Duration) -> ClientResult<F::Output>
where
    F: Future,
{
    block_on(async { tokio::time::timeout(timeout, fut).await })
        .map_err(|_| ClientError::retryable(format!("request timed out after {timeout:?}")))
}

/// Map an SDK failure onto the retryable / not-found / fatal trichotomy.
fn classify<E, R>(err: SdkError<E, R>) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ClientError::retryable(format!("{err:?}"))
        }
        SdkError::ServiceError(_) => {
            let code = err.meta().code().unwrap_or_default();
            match code {
                "NoSuchKey" | "NoSuchBucket" | "NotFound" | "404" => {
                    ClientError::not_found(format!("{code}: {err}"))
                }
                "SlowDown" | "RequestTimeout" | "InternalError" | "ServiceUnavailable" => {
                    ClientError::retryable(format!("{code}: {err}"))
                }
                _ => ClientError::fatal(format!("{code}: {err}")),
            }
        }
        _ => ClientError::fatal(format!("{err:?}")),
    }
}

/// [`ObjectClient`] backed by `aws-sdk-s3`, pinned to one bucket.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Build a client from parsed connection settings. Path-style addressing
    /// is forced because the endpoint is typically a bare host, not AWS.
    pub fn new(config: &StorageConfig) -> Self {
        let endpoint = if config.host.contains("://") {
            config.host.clone()
        } else {
            format!("https://{}", config.host)
        };

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "s3vfs-config",
        );

        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_REGION))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(conf),
            bucket: config.bucket.clone(),
        }
    }
}

impl ObjectClient for S3Client {
    fn list_page(
        &self,
        prefix: Option<&str>,
        marker: Option<&str>,
        delimiter: Option<&str>,
        max_keys: i32,
        timeout: Duration,
    ) -> ClientResult<ListPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_keys);
        if let Some(p) = prefix {
            req = req.prefix(p);
        }
        if let Some(m) = marker {
            req = req.continuation_token(m);
        }
        if let Some(d) = delimiter {
            req = req.delimiter(d);
        }

        let resp = block_on_timeout(req.send(), timeout)?.map_err(classify)?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|k| ObjectInfo {
                    key: k.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();
        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(str::to_string))
            .collect();

        Ok(ListPage {
            objects,
            common_prefixes,
            truncated: resp.is_truncated().unwrap_or(false),
            next_marker: resp.next_continuation_token().map(str::to_string),
        })
    }

    fn get(&self, key: &str, timeout: Duration) -> ClientResult<Vec<u8>> {
        debug!("GET {}/{}", self.bucket, key);
        let resp = block_on_timeout(
            self.client.get_object().bucket(&self.bucket).key(key).send(),
            timeout,
        )?
        .map_err(|e| match &e {
            SdkError::ServiceError(se) if se.err().is_no_such_key() => {
                ClientError::not_found(format!("no such key: {key}"))
            }
            _ => classify(e),
        })?;

        let body = block_on_timeout(resp.body.collect(), timeout)?
            .map_err(|e| ClientError::retryable(format!("body read failed: {e}")))?;
        Ok(body.into_bytes().to_vec())
    }

    fn put(&self, key: &str, data: &[u8], timeout: Duration) -> ClientResult<()> {
        debug!("PUT {}/{} ({} bytes)", self.bucket, key, data.len());
        let body = aws_sdk_s3::primitives::ByteStream::from(data.to_vec());
        block_on_timeout(
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send(),
            timeout,
        )?
        .map_err(classify)?;
        Ok(())
    }

    fn head(&self, key: &str, timeout: Duration) -> ClientResult<u64> {
        let resp = block_on_timeout(
            self.client.head_object().bucket(&self.bucket).key(key).send(),
            timeout,
        )?
        .map_err(|e| match &e {
            SdkError::ServiceError(se) if se.err().is_not_found() => {
                ClientError::not_found(format!("no such key: {key}"))
            }
            _ => classify(e),
        })?;
        Ok(resp.content_length().unwrap_or(0).max(0) as u64)
    }

    fn delete(&self, key: &str, timeout: Duration) -> ClientResult<()> {
        debug!("DELETE {}/{}", self.bucket, key);
        block_on_timeout(
            self.client.delete_object().bucket(&self.bucket).key(key).send(),
            timeout,
        )?
        .map_err(classify)?;
        Ok(())
    }

    fn copy(&self, src_key: &str, dst_key: &str, timeout: Duration) -> ClientResult<()> {
        debug!("COPY {}/{} -> {}", self.bucket, src_key, dst_key);
        block_on_timeout(
            self.client
                .copy_object()
                .bucket(&self.bucket)
                .copy_source(format!("{}/{}", self.bucket, src_key))
                .key(dst_key)
                .send(),
            timeout,
        )?
        .map_err(classify)?;
        Ok(())
    }

    fn test_bucket(&self, timeout: Duration) -> ClientResult<()> {
        block_on_timeout(
            self.client.head_bucket().bucket(&self.bucket).send(),
            timeout,
        )?
        .map_err(|e| match &e {
            SdkError::ServiceError(se) if se.err().is_not_found() => {
                ClientError::not_found(format!("no such bucket: {}", self.bucket))
            }
            _ => classify(e),
        })?;
        Ok(())
    }

    fn create_bucket(&self, timeout: Duration) -> ClientResult<()> {
        let result = block_on_timeout(
            self.client.create_bucket().bucket(&self.bucket).send(),
            timeout,
        )?;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                // Racing another creator is fine; the bucket exists either way.
                if let Some(code) = e.code() {
                    if code == "BucketAlreadyOwnedByYou" || code == "BucketAlreadyExists" {
                        warn!("bucket {} already exists", self.bucket);
                        return Ok(());
                    }
                }
                Err(classify(e))
            }
        }
    }

    fn list_buckets(&self, timeout: Duration) -> ClientResult<Vec<String>> {
        let resp = block_on_timeout(self.client.list_buckets().send(), timeout)?
            .map_err(classify)?;
        Ok(resp
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }
}
