// src/usage.rs
//
//! Capacity accounting.
//!
//! A full bucket scan is O(object count), far too expensive to run on every
//! space query. Instead a background task periodically sums all object sizes
//! and persists a compact [`UsageSnapshot`] to a well-known sentinel key;
//! space queries read the snapshot and accept staleness bounded by the
//! refresh interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};

use crate::client::{ClientErrorKind, ObjectClient};
use crate::constants::{
    ACCOUNTANT_SCAN_TICKS, ACCOUNTANT_TICK, TRANSFER_TIMEOUT, USAGE_SENTINEL_KEY,
};
use crate::error::StorageError;
use crate::listing::ListingAssembler;

/// The persisted usage record: `"<unixTimestamp>\n<usedBytes>\n"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub timestamp_secs: u64,
    pub used_bytes: u64,
}

impl UsageSnapshot {
    pub fn now(used_bytes: u64) -> Self {
        let timestamp_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { timestamp_secs, used_bytes }
    }

    pub fn encode(&self) -> Vec<u8> {
        format!("{}\n{}\n", self.timestamp_secs, self.used_bytes).into_bytes()
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(data).ok()?;
        let mut lines = text.lines();
        let timestamp_secs = lines.next()?.trim().parse().ok()?;
        let used_bytes = lines.next()?.trim().parse().ok()?;
        Some(Self { timestamp_secs, used_bytes })
    }
}

/// Read the persisted snapshot and return the recorded byte count.
///
/// Best effort by design: a missing or unparsable sentinel yields 0 rather
/// than an error, so space queries never fail on accounting gaps.
pub fn used_space(client: &dyn ObjectClient) -> u64 {
    match client.get(USAGE_SENTINEL_KEY, TRANSFER_TIMEOUT) {
        Ok(data) => match UsageSnapshot::decode(&data) {
            Some(snap) => snap.used_bytes,
            None => {
                warn!("usage sentinel is unparsable, reporting 0");
                0
            }
        },
        Err(e) => {
            if e.kind() != ClientErrorKind::NotFound {
                warn!("usage sentinel read failed: {e}");
            }
            0
        }
    }
}

/// Scan the whole bucket and persist a fresh snapshot.
///
/// A listing aborted mid-stream still produces a snapshot from the partial
/// sum; an undercount is better than a refresh interval with no data at all.
pub fn write_snapshot(client: &Arc<dyn ObjectClient>) -> Result<u64, StorageError> {
    let assembler = ListingAssembler::new(Arc::clone(client));
    let entries = match assembler.collect_all() {
        Ok(entries) => entries,
        Err(StorageError::ListingIncomplete { entries }) => {
            warn!("usage scan incomplete, snapshotting partial sum");
            entries
        }
        Err(e) => return Err(e),
    };

    let used: u64 = entries
        .iter()
        .filter(|e| !e.is_directory && e.key != USAGE_SENTINEL_KEY)
        .map(|e| e.size)
        .sum();

    let snapshot = UsageSnapshot::now(used);
    client
        .put(USAGE_SENTINEL_KEY, &snapshot.encode(), TRANSFER_TIMEOUT)
        .map_err(|e| StorageError::Unknown(format!("snapshot upload failed: {e}")))?;
    info!("usage snapshot written: {used} bytes");
    Ok(used)
}

/// Background task recomputing the usage snapshot on a fixed cadence.
///
/// One instance per storage engine. The loop sleeps one tick at a time and
/// counts ticks; when the counter crosses the scan threshold it rescans and
/// resets. The counter starts past the threshold, so the first snapshot
/// lands shortly after startup. Shutdown is cooperative: the stop flag is
/// observed once per tick and the thread is joined on drop.
pub struct CapacityAccountant {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CapacityAccountant {
    pub fn start(client: Arc<dyn ObjectClient>) -> Self {
        Self::start_with(client, ACCOUNTANT_TICK, ACCOUNTANT_SCAN_TICKS)
    }

    /// Start with explicit cadence, used by tests to run in milliseconds.
    pub fn start_with(client: Arc<dyn ObjectClient>, tick: Duration, scan_ticks: u64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || {
            debug!("capacity accountant started, tick {tick:?}");
            let mut counter = scan_ticks + 1;
            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(tick);
                counter += 1;
                if counter > scan_ticks {
                    counter = 0;
                    if let Err(e) = write_snapshot(&client) {
                        warn!("usage scan failed: {e}");
                    }
                }
            }
            debug!("capacity accountant stopped");
        });

        Self { stop, handle: Some(handle) }
    }

    /// Signal the loop to exit and wait for the current tick to finish.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CapacityAccountant {
    fn drop(&mut self) {
        self.shutdown();
    }
}
