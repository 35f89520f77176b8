// tests/common/mod.rs
//
// Shared in-memory ObjectClient used by the integration tests. Implements
// enough of the flat-store contract (prefix/delimiter grouping, marker
// pagination, not-found semantics) to exercise the engine without a network,
// plus per-operation call counters and scripted failures.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use s3vfs::{ClientError, ClientErrorKind, ListPage, ObjectClient, ObjectInfo};

#[derive(Default)]
struct MockState {
    objects: BTreeMap<String, Vec<u8>>,
    buckets: Vec<String>,
    calls: HashMap<&'static str, u32>,
    // Scripted outcomes consumed per call: Some = fail, None = pass through.
    failures: HashMap<&'static str, VecDeque<Option<(ClientErrorKind, String)>>>,
    // When set, listing pages are capped at this many entries to force
    // pagination regardless of the requested max_keys.
    page_limit: Option<usize>,
}

pub struct MockClient {
    state: Mutex<MockState>,
}

#[allow(dead_code)]
impl MockClient {
    pub fn new() -> Arc<Self> {
        Self::with_buckets(&["media"])
    }

    pub fn with_buckets(names: &[&str]) -> Arc<Self> {
        let state = MockState {
            buckets: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        Arc::new(Self { state: Mutex::new(state) })
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.lock().objects.insert(key.to_string(), data.to_vec());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().objects.contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn set_page_limit(&self, limit: usize) {
        self.lock().page_limit = Some(limit);
    }

    pub fn calls(&self, op: &'static str) -> u32 {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    /// Queue `count` scripted failures for `op`; they are consumed in order
    /// before the real behavior runs.
    pub fn fail_times(&self, op: &'static str, kind: ClientErrorKind, count: usize) {
        let mut state = self.lock();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..count {
            queue.push_back(Some((kind, format!("scripted {op} failure"))));
        }
    }

    pub fn fail_next(&self, op: &'static str, kind: ClientErrorKind) {
        self.fail_times(op, kind, 1);
    }

    /// Let the next `count` calls to `op` pass through before any scripted
    /// failure queued afterwards takes effect.
    pub fn pass_times(&self, op: &'static str, count: usize) {
        let mut state = self.lock();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..count {
            queue.push_back(None);
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, MockState>, ClientError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(queue) = state.failures.get_mut(op) {
            if let Some(Some((kind, message))) = queue.pop_front() {
                return Err(ClientError::new(kind, message));
            }
        }
        Ok(state)
    }
}

/// Either an object or a synthesized common prefix, in listing order.
enum Listed {
    Object(String, u64),
    Prefix(String),
}

impl Listed {
    fn key(&self) -> &str {
        match self {
            Listed::Object(k, _) => k,
            Listed::Prefix(k) => k,
        }
    }
}

impl ObjectClient for MockClient {
    fn list_page(
        &self,
        prefix: Option<&str>,
        marker: Option<&str>,
        delimiter: Option<&str>,
        max_keys: i32,
        _timeout: Duration,
    ) -> Result<ListPage, ClientError> {
        let state = self.enter("list")?;
        let prefix = prefix.unwrap_or("");

        // Group matching keys into objects and one-level common prefixes,
        // deduplicated and key-ordered like a real delimited listing.
        let mut listed: Vec<Listed> = Vec::new();
        let mut seen_prefixes: Vec<String> = Vec::new();
        for (key, data) in state.objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            let group = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|pos| (d, pos)));
            match group {
                Some((d, pos)) => {
                    let common = format!("{prefix}{}{d}", &rest[..pos]);
                    if !seen_prefixes.contains(&common) {
                        seen_prefixes.push(common.clone());
                        listed.push(Listed::Prefix(common));
                    }
                }
                None => listed.push(Listed::Object(key.clone(), data.len() as u64)),
            }
        }

        let start = match marker {
            Some(m) => listed.iter().position(|e| e.key() > m).unwrap_or(listed.len()),
            None => 0,
        };
        let cap = state.page_limit.unwrap_or(usize::MAX).min(max_keys.max(0) as usize);
        let end = (start + cap).min(listed.len());
        let page = &listed[start..end];

        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();
        for entry in page {
            match entry {
                Listed::Object(k, size) => objects.push(ObjectInfo { key: k.clone(), size: *size }),
                Listed::Prefix(p) => common_prefixes.push(p.clone()),
            }
        }

        let truncated = end < listed.len();
        let next_marker = if truncated {
            page.last().map(|e| e.key().to_string())
        } else {
            None
        };

        Ok(ListPage { objects, common_prefixes, truncated, next_marker })
    }

    fn get(&self, key: &str, _timeout: Duration) -> Result<Vec<u8>, ClientError> {
        let state = self.enter("get")?;
        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ClientError::not_found(format!("no such key: {key}")))
    }

    fn put(&self, key: &str, data: &[u8], _timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.enter("put")?;
        state.objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn head(&self, key: &str, _timeout: Duration) -> Result<u64, ClientError> {
        let state = self.enter("head")?;
        state
            .objects
            .get(key)
            .map(|d| d.len() as u64)
            .ok_or_else(|| ClientError::not_found(format!("no such key: {key}")))
    }

    fn delete(&self, key: &str, _timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.enter("delete")?;
        state.objects.remove(key);
        Ok(())
    }

    fn copy(&self, src_key: &str, dst_key: &str, _timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.enter("copy")?;
        match state.objects.get(src_key).cloned() {
            Some(data) => {
                state.objects.insert(dst_key.to_string(), data);
                Ok(())
            }
            None => Err(ClientError::not_found(format!("no such key: {src_key}"))),
        }
    }

    fn test_bucket(&self, _timeout: Duration) -> Result<(), ClientError> {
        self.enter("test_bucket").map(|_| ())
    }

    fn create_bucket(&self, _timeout: Duration) -> Result<(), ClientError> {
        let mut state = self.enter("create_bucket")?;
        let name = "media".to_string();
        if !state.buckets.contains(&name) {
            state.buckets.push(name);
        }
        Ok(())
    }

    fn list_buckets(&self, _timeout: Duration) -> Result<Vec<String>, ClientError> {
        let state = self.enter("list_buckets")?;
        Ok(state.buckets.clone())
    }
}
