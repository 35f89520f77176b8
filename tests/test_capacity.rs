// tests/test_capacity.rs
//
// Usage snapshots: best-effort reads, full-bucket scans, and the background
// accountant's cadence and shutdown behavior.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockClient;
use s3vfs::constants::USAGE_SENTINEL_KEY;
use s3vfs::usage::{used_space, write_snapshot};
use s3vfs::{CapacityAccountant, ClientErrorKind, ObjectClient, UsageSnapshot};

#[test]
fn used_space_is_zero_without_a_sentinel() {
    let client = MockClient::new();
    assert_eq!(used_space(client.as_ref()), 0);
}

#[test]
fn used_space_is_zero_for_an_unparsable_sentinel() {
    let client = MockClient::new();
    client.insert(USAGE_SENTINEL_KEY, b"this is not a snapshot");
    assert_eq!(used_space(client.as_ref()), 0);
}

#[test]
fn used_space_reads_the_persisted_snapshot() {
    let client = MockClient::new();
    let snap = UsageSnapshot { timestamp_secs: 1_700_000_000, used_bytes: 42_000 };
    client.insert(USAGE_SENTINEL_KEY, &snap.encode());
    assert_eq!(used_space(client.as_ref()), 42_000);

    // Objects created after the snapshot do not affect the reading.
    client.insert("late/arrival.bin", &[0u8; 9999]);
    assert_eq!(used_space(client.as_ref()), 42_000);
}

#[test]
fn snapshot_sums_objects_excluding_the_sentinel_itself() {
    let client = MockClient::new();
    client.insert("a.bin", &[0u8; 100]);
    client.insert("dir/b.bin", &[0u8; 200]);
    client.insert(USAGE_SENTINEL_KEY, b"1\n999999\n");

    let shared: Arc<dyn ObjectClient> = Arc::clone(&client) as Arc<dyn ObjectClient>;
    let used = write_snapshot(&shared).unwrap();
    assert_eq!(used, 300);
    assert_eq!(used_space(client.as_ref()), 300);
}

#[test]
fn accountant_writes_a_snapshot_shortly_after_startup() {
    let client = MockClient::new();
    client.insert("a.bin", &[0u8; 64]);

    let shared: Arc<dyn ObjectClient> = Arc::clone(&client) as Arc<dyn ObjectClient>;
    let mut accountant = CapacityAccountant::start_with(shared, Duration::from_millis(5), 1_000_000);

    // The counter starts past the threshold; one tick is enough.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !client.contains(USAGE_SENTINEL_KEY) && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    accountant.shutdown();

    assert_eq!(used_space(client.as_ref()), 64);
    // Exactly one startup snapshot: the next scan is a million ticks away.
    assert_eq!(client.calls("put"), 1);
}

#[test]
fn accountant_rescans_every_threshold_ticks() {
    let client = MockClient::new();
    client.insert("a.bin", &[0u8; 10]);

    let shared: Arc<dyn ObjectClient> = Arc::clone(&client) as Arc<dyn ObjectClient>;
    let mut accountant = CapacityAccountant::start_with(shared, Duration::from_millis(2), 3);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while client.calls("put") < 3 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    accountant.shutdown();

    assert!(client.calls("put") >= 3, "expected repeated rescans");
}

#[test]
fn shutdown_joins_the_background_thread() {
    let client = MockClient::new();
    let shared: Arc<dyn ObjectClient> = Arc::clone(&client) as Arc<dyn ObjectClient>;
    let mut accountant = CapacityAccountant::start_with(shared, Duration::from_millis(5), 10);
    accountant.shutdown();
    // Idempotent: a second shutdown (and the eventual drop) is a no-op.
    accountant.shutdown();
}

#[test]
fn scan_failure_does_not_kill_the_loop() {
    let client = MockClient::new();
    client.insert("a.bin", &[0u8; 7]);
    client.fail_next("list", ClientErrorKind::Retryable);
    client.fail_next("put", ClientErrorKind::Retryable);

    let shared: Arc<dyn ObjectClient> = Arc::clone(&client) as Arc<dyn ObjectClient>;
    let mut accountant = CapacityAccountant::start_with(shared, Duration::from_millis(2), 2);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while client.calls("put") < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    accountant.shutdown();

    assert!(client.contains(USAGE_SENTINEL_KEY), "a later scan must succeed");
}
