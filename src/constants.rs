// src/constants.rs
//
// Centralized constants for s3vfs to avoid hardcoded values throughout the codebase

use std::time::Duration;

/// Well-known object key holding the persisted usage snapshot.
pub const USAGE_SENTINEL_KEY: &str = ".size";

/// One gibibyte, the unit of the configured quota.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Free-space value reported when no quota is configured (100 GiB).
pub const FREE_SPACE_FALLBACK: u64 = 100 * GIB;

/// Total-space value reported when no quota is configured (100 GB decimal).
/// A different constant than the free-space fallback; total space only
/// influences the host's storage-selection weighting.
pub const TOTAL_SPACE_FALLBACK: u64 = 100 * 1000 * 1000 * 1000;

/// Maximum keys requested per listing page.
pub const LIST_PAGE_SIZE: i32 = 1000;

/// Maximum keys requested by the capability probe's listing step.
pub const PROBE_LIST_PAGE_SIZE: i32 = 10;

/// Delimiter used to synthesize one level of directory hierarchy.
pub const PATH_DELIMITER: &str = "/";

/// How often the capacity accountant wakes up to check its counter.
pub const ACCOUNTANT_TICK: Duration = Duration::from_millis(500);

/// Number of ticks between full-bucket usage scans (~2 hours at 500 ms).
pub const ACCOUNTANT_SCAN_TICKS: u64 = 2 * 3600 * 2;

/// Retry budget for the availability probe.
pub const AVAILABILITY_RETRIES: u32 = 5;

/// Base backoff for the availability probe; retry N sleeps N times this.
pub const AVAILABILITY_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Per-call timeout for listing pages.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-call timeout for metadata (head) requests.
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-call timeout for whole-object downloads and uploads.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-call timeout for deletes, copies and bucket-level requests.
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(20);

/// Size in bytes of the object written by the capability probe.
pub const PROBE_OBJECT_SIZE: usize = 2;
