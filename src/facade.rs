//! Cache Facade - Namespaced, Stampede-Safe Cache Operations
//!
//! The facade is the caller-facing component: it namespaces keys, applies
//! the default TTL policy, serializes values to JSON, picks the active
//! backend (distributed when configured and reachable, in-process
//! otherwise), and orchestrates the stampede-safe `with_cache` read-through.
//!
//! The cache is a best-effort accelerator. None of `get`/`set`/`del` ever
//! fail for availability reasons, and `with_cache` only propagates errors
//! raised by the caller's own fetcher.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::backends::MemoryStore;
use crate::traits::{CacheStore, DistributedStore};

/// Tuning knobs for [`CacheFacade::with_cache_opts`].
#[derive(Debug, Clone, Copy)]
pub struct WithCacheOptions {
    /// TTL for the computed value. `None` applies the facade default.
    pub ttl: Option<Duration>,
    /// Expiry of the per-key computation lock, bounding how long a crashed
    /// holder can block other callers.
    pub lock_ttl: Duration,
    /// How long a non-holder waits for the value to appear before computing
    /// it itself.
    pub wait: Duration,
    /// Interval between cache re-checks while waiting.
    pub poll_interval: Duration,
}

impl Default for WithCacheOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            lock_ttl: Duration::from_secs(10),
            wait: Duration::from_secs(3),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Read-only diagnostic snapshot, see [`CacheFacade::info`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// Key prefix isolating this facade's data.
    pub namespace: String,
    /// Whether a distributed backend was configured at construction.
    pub distributed_configured: bool,
    /// Whether the distributed backend answered its last interaction.
    pub distributed_healthy: bool,
    /// Entry count of the in-process store (locks included).
    pub memory_items: usize,
    /// TTL applied when callers do not supply one.
    #[serde(serialize_with = "serialize_secs")]
    pub default_ttl: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(ttl.as_secs())
}

/// Stampede-safe cache facade over an in-process store and an optional
/// distributed store.
///
/// An explicitly constructed, self-contained unit: build one per logical
/// cache with [`CacheFacadeBuilder`](crate::builder::CacheFacadeBuilder)
/// and hand it to callers via your application context. There is no global
/// instance.
///
/// # Backend Selection
///
/// Each call goes to the distributed store when one is configured; on any
/// operational failure the call is transparently retried on the in-process
/// store and the remote is marked unhealthy. The next call attempts the
/// remote again, so recovery needs no coordination.
///
/// # Mutual Exclusion Guarantee
///
/// `with_cache` reduces duplicate work, it does not eliminate it. A waiter
/// that times out computes the value itself without re-acquiring the lock,
/// trading a possible duplicate computation for bounded latency. A slow
/// holder finishing after such a waiter overwrites the entry last-write-wins.
/// Callers must treat cached values as disposable and never depend on
/// exactly-once computation.
pub struct CacheFacade {
    namespace: String,
    default_ttl: Duration,
    memory: Arc<MemoryStore>,
    remote: Option<Arc<dyn DistributedStore>>,
}

impl CacheFacade {
    pub(crate) fn new(
        namespace: String,
        default_ttl: Duration,
        memory: Arc<MemoryStore>,
        remote: Option<Arc<dyn DistributedStore>>,
    ) -> Self {
        Self {
            namespace,
            default_ttl,
            memory,
            remote,
        }
    }

    /// Get a value by key.
    ///
    /// Returns `None` on a miss, on an expired entry, or when the stored
    /// payload fails to deserialize (a corrupted payload is a miss, not an
    /// error). Never fails for availability reasons.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.store_get(&self.namespaced(key)).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, error = %e, "Cached payload failed to deserialize, treating as miss");
                None
            }
        }
    }

    /// Store a value under the facade's default TTL.
    ///
    /// # Errors
    ///
    /// Fails only when `value` cannot be serialized to JSON. Backend
    /// availability problems are logged and absorbed by the fallback store.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Store a value with an explicit TTL.
    ///
    /// # Errors
    ///
    /// Fails only when `value` cannot be serialized to JSON.
    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)
            .with_context(|| format!("failed to serialize cache value for key '{key}'"))?;
        self.store_set(&self.namespaced(key), &bytes, Some(ttl)).await;
        Ok(())
    }

    /// Delete a key. Returns whether an entry was removed from the active
    /// backend.
    pub async fn del(&self, key: &str) -> bool {
        self.store_remove(&self.namespaced(key)).await
    }

    /// Read-through with stampede protection, using default options.
    ///
    /// See [`CacheFacade::with_cache_opts`].
    ///
    /// # Errors
    ///
    /// Propagates only errors returned by `fetcher`.
    pub async fn with_cache<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        self.with_cache_opts(key, WithCacheOptions::default(), fetcher).await
    }

    /// Read-through with stampede protection.
    ///
    /// 1. On a hit, return the cached value immediately (no locking).
    /// 2. On a miss, try to acquire the per-key lock. The holder invokes
    ///    `fetcher`, stores the result, releases the lock on every exit
    ///    path, and re-raises any fetcher error.
    /// 3. Non-holders poll the cache every `poll_interval` for up to
    ///    `wait`, returning the value as soon as it appears.
    /// 4. If `wait` elapses without a value (holder crashed, or lock TTL
    ///    expired mid-computation), the waiter computes the value itself
    ///    without re-acquiring the lock: bounded latency is worth an
    ///    occasional duplicate computation.
    ///
    /// # Errors
    ///
    /// Propagates only errors returned by `fetcher`; locking and backend
    /// faults are absorbed.
    pub async fn with_cache_opts<T, F, Fut>(
        &self,
        key: &str,
        opts: WithCacheOptions,
        fetcher: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let ttl = opts.ttl.unwrap_or(self.default_ttl);
        let lock_key = self.namespaced(&format!("lock:{key}"));

        if self.store_try_acquire(&lock_key, opts.lock_ttl).await {
            debug!(key = %key, "Acquired computation lock");
            let fetched = fetcher().await;
            // Release must run on every exit path so a failed fetch cannot
            // leave the key blocked until the lock TTL expires.
            match fetched {
                Ok(value) => {
                    if let Err(e) = self.set_with_ttl(key, &value, ttl).await {
                        warn!(key = %key, error = %e, "Failed to cache computed value");
                    }
                    self.store_release(&lock_key).await;
                    Ok(value)
                }
                Err(e) => {
                    self.store_release(&lock_key).await;
                    Err(e)
                }
            }
        } else {
            // Another caller is computing. Poll until the value lands or
            // the wait budget runs out.
            let deadline = Instant::now() + opts.wait;
            loop {
                tokio::time::sleep(opts.poll_interval).await;
                if let Some(cached) = self.get(key).await {
                    return Ok(cached);
                }
                if Instant::now() >= deadline {
                    break;
                }
            }

            debug!(key = %key, wait_ms = %opts.wait.as_millis(), "Wait elapsed without a value, computing directly");
            let value = fetcher().await?;
            if let Err(e) = self.set_with_ttl(key, &value, ttl).await {
                warn!(key = %key, error = %e, "Failed to cache computed value");
            }
            Ok(value)
        }
    }

    /// Delete every key under this facade's namespace, returning the count
    /// removed.
    ///
    /// Iterates the remote key space cursor-style (bounded batches, never a
    /// full key listing) and always sweeps the in-process store as well,
    /// since entries written during a remote outage live there. Keys of
    /// other namespaces are never touched.
    ///
    /// # Errors
    ///
    /// Transient remote connectivity problems are tolerated (the memory
    /// sweep still runs); an error here indicates an unexpected backend
    /// fault.
    pub async fn flush_namespace(&self) -> Result<usize> {
        let prefix = format!("{}:", self.namespace);
        let mut removed = 0;

        if let Some(remote) = &self.remote {
            match remote.scan_and_delete(&prefix).await {
                Ok(count) => removed += count,
                Err(e) => {
                    warn!(error = %e, "Distributed flush failed, sweeping memory store only");
                }
            }
        }

        removed += self.memory.scan_and_delete(&prefix).await?;
        debug!(namespace = %self.namespace, count = removed, "Flushed namespace");
        Ok(removed)
    }

    /// Read-only diagnostic snapshot of this facade.
    #[must_use]
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            namespace: self.namespace.clone(),
            distributed_configured: self.remote.is_some(),
            distributed_healthy: self.remote.as_ref().is_some_and(|r| r.is_healthy()),
            memory_items: self.memory.len(),
            default_ttl: self.default_ttl,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    // ===== Backend dispatch with transparent fallback =====
    //
    // Each helper tries the distributed store first when one is configured
    // and falls back to the memory store on any operational error. The
    // memory store itself is infallible.

    async fn store_get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(remote) = &self.remote {
            match remote.get(key).await {
                Ok(found) => return found,
                Err(e) => {
                    debug!(key = %key, error = %e, "Distributed get failed, using memory store");
                }
            }
        }
        self.memory.get(key).await.ok().flatten()
    }

    async fn store_set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        if let Some(remote) = &self.remote {
            if remote.set_with_ttl(key, value, ttl).await.is_ok() {
                return;
            }
            debug!(key = %key, "Distributed set failed, using memory store");
        }
        if let Err(e) = self.memory.set_with_ttl(key, value, ttl).await {
            warn!(key = %key, error = %e, "Memory store set failed");
        }
    }

    async fn store_remove(&self, key: &str) -> bool {
        if let Some(remote) = &self.remote {
            match remote.remove(key).await {
                Ok(removed) => return removed,
                Err(e) => {
                    debug!(key = %key, error = %e, "Distributed remove failed, using memory store");
                }
            }
        }
        self.memory.remove(key).await.unwrap_or(false)
    }

    async fn store_try_acquire(&self, key: &str, ttl: Duration) -> bool {
        if let Some(remote) = &self.remote {
            match remote.try_acquire(key, ttl).await {
                Ok(acquired) => return acquired,
                Err(e) => {
                    debug!(key = %key, error = %e, "Distributed lock failed, using memory store");
                }
            }
        }
        self.memory.try_acquire(key, ttl).await.unwrap_or(false)
    }

    async fn store_release(&self, key: &str) {
        // Release is idempotent, so sweep both stores: the lock may sit in
        // the memory store if it was acquired during a remote outage.
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.release(key).await {
                debug!(key = %key, error = %e, "Distributed lock release failed (lock will expire)");
            }
        }
        if let Err(e) = self.memory.release(key).await {
            debug!(key = %key, error = %e, "Memory lock release failed");
        }
    }
}
