// src/engine.rs
//
//! The storage façade.
//!
//! `StorageEngine` composes the codec, listing assembler, probes and the
//! capacity accountant behind the URL-based contract the host consumes.
//! Public operations are serialized by one mutex guarding the engine's
//! availability state; file handles returned by [`StorageEngine::open`] live
//! outside that lock.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::client::{ClientErrorKind, ObjectClient};
use crate::config::StorageConfig;
use crate::constants::{
    CONTROL_TIMEOUT, FREE_SPACE_FALLBACK, GIB, HEAD_TIMEOUT, PATH_DELIMITER,
    TOTAL_SPACE_FALLBACK,
};
use crate::error::{Result, StorageError};
use crate::iodevice::{LocalCopyFile, OpenMode};
use crate::listing::{FileEntry, ListingAssembler};
use crate::path::{key_from_url, strip_legacy_infix, url_from_key};
use crate::probe::{AvailabilityProbe, Capabilities, CapabilityProbe};
use crate::s3_client::S3Client;
use crate::usage::{used_space, CapacityAccountant};

/// A directory entry presented to the host: full hierarchical URL plus type
/// and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub url: String,
    pub is_directory: bool,
    pub size: u64,
}

/// Pre-materialized, non-restartable listing sequence.
///
/// The whole listing is fetched eagerly when the iterator is constructed;
/// iteration replays it without further store interaction.
pub struct FileListing {
    entries: std::vec::IntoIter<DirEntry>,
}

impl Iterator for FileListing {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        self.entries.next()
    }
}

struct EngineState {
    available: bool,
}

/// Hierarchical storage emulation over one flat bucket.
pub struct StorageEngine {
    config: StorageConfig,
    client: Arc<dyn ObjectClient>,
    state: Mutex<EngineState>,
    accountant: CapacityAccountant,
}

impl StorageEngine {
    /// Connect using a connection URL
    /// (`s3://key:secret@host/bucket[@quotaGiB]`).
    pub fn connect(url: &str) -> Result<Self> {
        let config = StorageConfig::from_url(url)?;
        let client: Arc<dyn ObjectClient> = Arc::new(S3Client::new(&config));
        Self::with_client(config, client)
    }

    /// Connect with an explicit transport, the seam tests use.
    ///
    /// Verifies the bucket exists (creating it when absent, as first-time
    /// setup expects), then starts the capacity accountant.
    pub fn with_client(config: StorageConfig, client: Arc<dyn ObjectClient>) -> Result<Self> {
        let available = match client.list_buckets(CONTROL_TIMEOUT) {
            Ok(names) if names.iter().any(|n| n == &config.bucket) => {
                debug!("bucket {} exists", config.bucket);
                true
            }
            Ok(_) => {
                info!("bucket {} missing, creating", config.bucket);
                match client.create_bucket(CONTROL_TIMEOUT) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("bucket creation failed: {e}");
                        false
                    }
                }
            }
            Err(e) => {
                warn!("bucket listing failed: {e}");
                false
            }
        };

        let accountant = CapacityAccountant::start(Arc::clone(&client));

        Ok(Self {
            config,
            client,
            state: Mutex::new(EngineState { available }),
            accountant,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Re-probe the bucket with bounded retry and cache the verdict.
    pub fn is_available(&self) -> bool {
        let mut state = self.lock();
        let available = AvailabilityProbe::new(Arc::clone(&self.client)).is_available();
        state.available = available;
        available
    }

    /// Open a file handle. The handle is exclusively owned by the caller and
    /// independent of the engine lock; concurrent handles on the same key
    /// are not coordinated (last close wins).
    pub fn open(&self, url: &str, mode: OpenMode) -> Result<LocalCopyFile> {
        let _state = self.check_available()?;
        let key = strip_legacy_infix(&key_from_url(url));
        LocalCopyFile::open(Arc::clone(&self.client), &key, mode)
    }

    /// Delete the object behind `url`. Deleting a missing file succeeds.
    pub fn remove_file(&self, url: &str) -> Result<()> {
        let _state = self.check_available()?;
        let key = key_from_url(url);
        debug!("remove {url} (key {key})");
        self.client
            .delete(&key, CONTROL_TIMEOUT)
            .map_err(|e| StorageError::from_client(e, &key))
    }

    /// Rename via copy-then-delete. Not atomic: a failure between the two
    /// steps leaves both names pointing at the data.
    pub fn rename_file(&self, old_url: &str, new_url: &str) -> Result<()> {
        let _state = self.check_available()?;
        let old_key = key_from_url(old_url);
        let new_key = key_from_url(new_url);
        debug!("rename {old_key} -> {new_key}");
        self.client
            .copy(&old_key, &new_key, CONTROL_TIMEOUT)
            .map_err(|e| StorageError::from_client(e, &old_key))?;
        self.client
            .delete(&old_key, CONTROL_TIMEOUT)
            .map_err(|e| StorageError::from_client(e, &old_key))
    }

    /// Eagerly list the immediate children of a directory URL.
    ///
    /// An aborted pagination is degraded to whatever was gathered, with a
    /// warning; the host treats a listing as advisory and re-queries on its
    /// own schedule.
    pub fn file_iterator(&self, dir_url: &str) -> Result<FileListing> {
        let _state = self.check_available()?;

        let mut prefix = key_from_url(dir_url);
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }

        let assembler = ListingAssembler::new(Arc::clone(&self.client));
        let entries = match assembler.list_children(&prefix, PATH_DELIMITER) {
            Ok(entries) => entries,
            Err(StorageError::ListingIncomplete { entries }) => {
                warn!("partial listing for {dir_url} ({} entries)", entries.len());
                entries
            }
            Err(e) => return Err(e),
        };

        let entries: Vec<DirEntry> = entries
            .into_iter()
            .map(|e| self.to_dir_entry(e))
            .collect();
        Ok(FileListing { entries: entries.into_iter() })
    }

    /// Existence check via a metadata request on the translated key.
    pub fn file_exists(&self, url: &str) -> Result<bool> {
        let _state = self.check_available()?;
        let key = strip_legacy_infix(&key_from_url(url));
        match self.client.head(&key, HEAD_TIMEOUT) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ClientErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_client(e, &key)),
        }
    }

    /// Directories are synthetic; their existence cannot be verified
    /// independently of their contents, so this always reports false.
    pub fn dir_exists(&self, _url: &str) -> Result<bool> {
        let _state = self.check_available()?;
        Ok(false)
    }

    /// Size of the object behind `url`, resolved through a prefix listing
    /// so the answer matches what a directory listing would report.
    pub fn file_size(&self, url: &str) -> Result<u64> {
        let _state = self.check_available()?;
        let key = strip_legacy_infix(&key_from_url(url));

        let assembler = ListingAssembler::new(Arc::clone(&self.client));
        let entries = assembler.list_prefix(&key)?;
        entries
            .iter()
            .find(|e| e.key == key && !e.is_directory)
            .map(|e| e.size)
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    /// Bytes recorded by the last usage snapshot; 0 when none exists.
    pub fn used_space(&self) -> u64 {
        let _state = self.lock();
        used_space(self.client.as_ref())
    }

    /// Quota arithmetic against the snapshot, or the fixed fallback when no
    /// quota is configured.
    pub fn free_space(&self) -> Result<u64> {
        let _state = self.check_available()?;
        if self.config.quota_gib == 0 {
            return Ok(FREE_SPACE_FALLBACK);
        }
        let quota = self.config.quota_gib * GIB;
        let used = used_space(self.client.as_ref());
        Ok(quota.saturating_sub(used))
    }

    /// The configured quota, or the fixed fallback when none is set.
    pub fn total_space(&self) -> Result<u64> {
        let _state = self.check_available()?;
        if self.config.quota_gib == 0 {
            return Ok(TOTAL_SPACE_FALLBACK);
        }
        Ok(self.config.quota_gib * GIB)
    }

    /// One-shot synthetic round trip answering what the store supports.
    pub fn capabilities(&self) -> Result<Capabilities> {
        let _state = self.check_available()?;
        Ok(CapabilityProbe::new(Arc::clone(&self.client)).capabilities())
    }

    /// Stop the background accountant and wait for its current tick.
    pub fn shutdown(&mut self) {
        self.accountant.shutdown();
    }

    fn to_dir_entry(&self, entry: FileEntry) -> DirEntry {
        DirEntry {
            url: url_from_key(&entry.key, &self.config.bucket, self.config.quota_gib),
            is_directory: entry.is_directory,
            size: entry.size,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_available(&self) -> Result<std::sync::MutexGuard<'_, EngineState>> {
        let state = self.lock();
        if !state.available {
            return Err(StorageError::Unavailable);
        }
        Ok(state)
    }
}
