// src/listing.rs
//
//! Directory-listing synthesis from prefix/delimiter queries.
//!
//! The bucket is flat; directories exist only as common prefixes returned by
//! a delimited listing. [`ListingAssembler`] drives the pagination loop and
//! folds pages into a duplicate-free set of immediate children.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};

use crate::client::ObjectClient;
use crate::constants::{LIST_PAGE_SIZE, LIST_TIMEOUT};
use crate::error::{Result, StorageError};

/// One child of a listed prefix. `key` is the flat object key (for files) or
/// the common prefix ending in `/` (for synthetic directories).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub key: String,
    pub is_directory: bool,
    pub size: u64,
}

impl FileEntry {
    fn file(key: String, size: u64) -> Self {
        Self { key, is_directory: false, size }
    }

    fn directory(key: String) -> Self {
        // Synthetic directories have no backing object and therefore no size.
        Self { key, is_directory: true, size: 0 }
    }
}

/// Accumulates paginated listing responses for one bucket.
pub struct ListingAssembler {
    client: Arc<dyn ObjectClient>,
    timeout: Duration,
}

impl ListingAssembler {
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self { client, timeout: LIST_TIMEOUT }
    }

    /// The immediate children of `prefix`, one hierarchy level deep.
    ///
    /// Objects on the page become file entries; common prefixes become
    /// directory entries of size 0. Pages are fetched until the store stops
    /// reporting truncation; each page is requested with a fresh marker, so
    /// no marker is queried twice. A store error mid-stream aborts the loop
    /// and surfaces [`StorageError::ListingIncomplete`] carrying whatever was
    /// gathered before the failure.
    pub fn list_children(&self, prefix: &str, delimiter: &str) -> Result<Vec<FileEntry>> {
        self.collect(Some(prefix), Some(delimiter))
    }

    /// Every object under `prefix`, recursively (no delimiter grouping).
    pub fn list_prefix(&self, prefix: &str) -> Result<Vec<FileEntry>> {
        self.collect(Some(prefix), None)
    }

    /// Every object in the bucket, no grouping. Used by the capacity scan.
    pub fn collect_all(&self) -> Result<Vec<FileEntry>> {
        self.collect(None, None)
    }

    fn collect(&self, prefix: Option<&str>, delimiter: Option<&str>) -> Result<Vec<FileEntry>> {
        let mut entries: Vec<FileEntry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut marker: Option<String> = None;

        loop {
            let page = match self.client.list_page(
                prefix,
                marker.as_deref(),
                delimiter,
                LIST_PAGE_SIZE,
                self.timeout,
            ) {
                Ok(page) => page,
                Err(e) => {
                    error!("listing aborted for prefix {prefix:?}: {e}");
                    return Err(StorageError::ListingIncomplete { entries });
                }
            };

            for obj in page.objects {
                if seen.insert(obj.key.clone()) {
                    entries.push(FileEntry::file(obj.key, obj.size));
                }
            }
            for cp in page.common_prefixes {
                if seen.insert(cp.clone()) {
                    entries.push(FileEntry::directory(cp));
                }
            }

            if !page.truncated {
                break;
            }
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => {
                    // Truncated but no marker to continue with; bail out with
                    // what we have rather than re-requesting the same page.
                    warn!("truncated listing without continuation marker, prefix {prefix:?}");
                    return Err(StorageError::ListingIncomplete { entries });
                }
            }
        }

        Ok(entries)
    }
}
