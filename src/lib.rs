// src/lib.rs
//
// Crate root — public re-exports.
//
//! s3vfs exposes a flat S3-compatible bucket as a hierarchical file storage
//! abstraction: synthesized directories, seekable file handles backed by
//! transient local copies, amortized capacity accounting and availability
//! probing. The transport is pluggable through [`client::ObjectClient`];
//! production use goes through [`s3_client::S3Client`].

pub mod client;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod iodevice;
pub mod listing;
pub mod path;
pub mod probe;
pub mod s3_client;
pub mod usage;

pub use client::{ClientError, ClientErrorKind, ListPage, ObjectClient, ObjectInfo};
pub use config::StorageConfig;
pub use engine::{DirEntry, FileListing, StorageEngine};
pub use error::{Result, StorageError};
pub use iodevice::{LocalCopyFile, OpenMode};
pub use listing::{FileEntry, ListingAssembler};
pub use probe::{AvailabilityProbe, Capabilities, CapabilityProbe};
pub use s3_client::S3Client;
pub use usage::{CapacityAccountant, UsageSnapshot};
