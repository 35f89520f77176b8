// src/probe.rs
//
//! Availability and capability probing.
//!
//! `AvailabilityProbe` distinguishes transient network trouble from a
//! genuinely unreachable or misconfigured bucket by retrying retryable
//! failures with a linearly growing backoff. `CapabilityProbe` answers what
//! the backing store can actually do by running one synthetic round trip.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use crate::client::{ClientErrorKind, ObjectClient};
use crate::constants::{
    AVAILABILITY_BACKOFF_BASE, AVAILABILITY_RETRIES, CONTROL_TIMEOUT, HEAD_TIMEOUT,
    PROBE_LIST_PAGE_SIZE, PROBE_OBJECT_SIZE, TRANSFER_TIMEOUT,
};

/// Bitmask of operations the backing store supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const LIST: Capabilities = Capabilities(1);
    pub const WRITE: Capabilities = Capabilities(1 << 1);
    pub const READ: Capabilities = Capabilities(1 << 2);
    pub const REMOVE: Capabilities = Capabilities(1 << 3);

    pub fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Capabilities) {
        self.0 |= other.0;
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (bit, name) in [
            (Self::LIST, "list"),
            (Self::WRITE, "write"),
            (Self::READ, "read"),
            (Self::REMOVE, "remove"),
        ] {
            if self.contains(bit) {
                names.push(name);
            }
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// Bounded-retry reachability check for the bucket.
///
/// The retry budget and backoff are local to one probe invocation; nothing
/// is shared across calls.
pub struct AvailabilityProbe {
    client: Arc<dyn ObjectClient>,
    retries: u32,
    backoff_base: Duration,
}

impl AvailabilityProbe {
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self {
            client,
            retries: AVAILABILITY_RETRIES,
            backoff_base: AVAILABILITY_BACKOFF_BASE,
        }
    }

    /// Override the retry budget and backoff base (tests run this in
    /// milliseconds).
    pub fn with_schedule(mut self, retries: u32, backoff_base: Duration) -> Self {
        self.retries = retries;
        self.backoff_base = backoff_base;
        self
    }

    /// True iff the bucket answered within the retry budget.
    ///
    /// An initial attempt plus up to `retries` retries; retry N sleeps
    /// N × backoff before calling again (1s, 2s, 3s, ... by default). A
    /// non-retryable failure ends the probe immediately.
    pub fn is_available(&self) -> bool {
        let mut retries_left = self.retries;
        loop {
            match self.client.test_bucket(CONTROL_TIMEOUT) {
                Ok(()) => {
                    debug!("bucket test succeeded");
                    return true;
                }
                Err(e) if e.kind() == ClientErrorKind::Retryable && retries_left > 0 => {
                    let attempt = self.retries - retries_left + 1;
                    let delay = self.backoff_base * attempt;
                    warn!("bucket test retryable failure ({e}), retry {attempt} in {delay:?}");
                    std::thread::sleep(delay);
                    retries_left -= 1;
                }
                Err(e) => {
                    warn!("bucket test failed: {e}");
                    return false;
                }
            }
        }
    }
}

/// One-shot synthetic round trip: list, write, head, delete.
///
/// Each failed step short-circuits the rest but keeps the bits already
/// earned. The probe object uses a randomized name so it cannot collide
/// with real data, and its removal is attempted even when an earlier step
/// already failed the probe.
pub struct CapabilityProbe {
    client: Arc<dyn ObjectClient>,
}

impl CapabilityProbe {
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self { client }
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::NONE;

        if let Err(e) = self.client.list_page(None, None, Some("/"), PROBE_LIST_PAGE_SIZE, CONTROL_TIMEOUT) {
            warn!("capability probe: list failed: {e}");
            return caps;
        }
        caps.insert(Capabilities::LIST);

        let probe_key = random_probe_key();
        let payload = vec![b'1'; PROBE_OBJECT_SIZE];
        if let Err(e) = self.client.put(&probe_key, &payload, TRANSFER_TIMEOUT) {
            warn!("capability probe: write failed: {e}");
            return caps;
        }
        caps.insert(Capabilities::WRITE);

        match self.client.head(&probe_key, HEAD_TIMEOUT) {
            Ok(_) => caps.insert(Capabilities::READ),
            Err(e) => {
                warn!("capability probe: head failed: {e}");
                // Still try to clean up the probe object.
                let _ = self.client.delete(&probe_key, CONTROL_TIMEOUT);
                return caps;
            }
        }

        match self.client.delete(&probe_key, CONTROL_TIMEOUT) {
            Ok(()) => caps.insert(Capabilities::REMOVE),
            Err(e) => warn!("capability probe: delete failed: {e}"),
        }

        info!("store capabilities: {caps}");
        caps
    }
}

/// Pseudo-random key for the probe object. Uniqueness is not guaranteed,
/// so the object is deleted as soon as possible.
fn random_probe_key() -> String {
    let mut rng = rand::rng();
    format!(".probe_{:08x}{:08x}", rng.random::<u32>(), rng.random::<u32>())
}
