//! Memory Store - In-Process Bounded Cache Backend
//!
//! Always-available fallback backend holding entries in process memory with
//! per-entry expiry and an insertion-order eviction bound.

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// Entries and their insertion order, kept consistent under one mutex.
struct MemoryInner {
    entries: HashMap<String, MemoryEntry>,
    order: VecDeque<String>,
}

/// Bounded in-process cache store.
///
/// - Expiry is lazy: an expired entry is dropped on the `get` that finds it.
/// - When an insert pushes the entry count past `max_items`, entries are
///   evicted oldest-inserted-first until the bound holds again. Overwriting
///   an existing key does not reset its insertion position.
/// - `try_acquire` is an existence check plus insert under the store mutex.
///   It is a correct mutual exclusion mechanism **only within a single
///   process**: independent processes each own their memory store and
///   cannot exclude each other. Cross-process exclusion requires the
///   distributed backend.
///
/// The mutex is never held across an await; all critical sections are
/// short and synchronous.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    max_items: usize,
}

impl MemoryStore {
    /// Create a store that evicts down to `max_items` entries.
    #[must_use]
    pub fn new(max_items: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_items,
        }
    }

    /// Current entry count, including entries whose lazy expiry has not
    /// triggered yet. Diagnostic only.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    fn insert(inner: &mut MemoryInner, key: &str, entry: MemoryEntry, max_items: usize) {
        if !inner.entries.contains_key(key) {
            inner.order.push_back(key.to_string());
        }
        inner.entries.insert(key.to_string(), entry);

        // Oldest-inserted-first eviction. `order` and `entries` always hold
        // the same key set, so the front of the queue is always present.
        while inner.entries.len() > max_items {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            debug!(key = %oldest, "[Memory] Evicted oldest-inserted entry");
        }
    }

    fn forget(inner: &mut MemoryInner, key: &str) -> bool {
        if inner.entries.remove(key).is_some() {
            if let Some(pos) = inner.order.iter().position(|k| k == key) {
                inner.order.remove(pos);
            }
            true
        } else {
            false
        }
    }
}

// ===== Trait Implementations =====

use crate::traits::CacheStore;
use async_trait::async_trait;

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                Self::forget(&mut inner, key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        // A zero TTL means no expiry, like `None`.
        let entry = MemoryEntry {
            value: value.to_vec(),
            expires_at: ttl
                .filter(|ttl| !ttl.is_zero())
                .map(|ttl| Instant::now() + ttl),
        };
        let mut inner = self.inner.lock();
        Self::insert(&mut inner, key, entry, self.max_items);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        Ok(Self::forget(&mut inner, key))
    }

    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.entries.get(key).is_some_and(|e| !e.is_expired()) {
            return Ok(false);
        }
        let entry = MemoryEntry {
            value: Vec::new(),
            expires_at: Some(Instant::now() + ttl),
        };
        Self::insert(&mut inner, key, entry, self.max_items);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::forget(&mut inner, key);
        Ok(())
    }

    async fn scan_and_delete(&self, prefix: &str) -> Result<usize> {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.starts_with(prefix));
        inner.order.retain(|key| !key.starts_with(prefix));
        let removed = before - inner.entries.len();
        debug!(prefix = %prefix, count = removed, "[Memory] Flushed keys by prefix");
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
