//! Redis Store - Distributed Cache Backend
//!
//! Optional remote backend wrapping Redis. Connects lazily on first use,
//! remembers connection health, and reports operational failures to the
//! facade so it can transparently retry on the in-process store.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How many keys a single SCAN iteration fetches during a prefix flush.
const SCAN_BATCH: usize = 100;

/// Redis distributed cache store.
///
/// Construction only validates the URL; the first operation establishes the
/// connection. Every operational error (refused connection, timeout,
/// protocol fault) marks the store unhealthy and surfaces as `Err` to the
/// facade, which falls back to its memory store for that call. The next
/// call attempts a fresh connection, so recovery is automatic once the
/// service is reachable again.
pub struct RedisStore {
    client: Client,
    /// Cached connection, rebuilt after the store was marked unhealthy.
    conn: RwLock<Option<ConnectionManager>>,
    /// Held only while establishing a connection, so that during an outage
    /// a single caller pays the connect latency while the rest fall back
    /// to the memory store immediately.
    reconnect: Mutex<()>,
    healthy: AtomicBool,
}

impl RedisStore {
    /// Create a store targeting `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns an error only for a malformed URL. This is a configuration
    /// fault and the one case that must not degrade silently.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .with_context(|| format!("invalid distributed store URL: {redis_url}"))?;

        info!(redis_url = %redis_url, "Redis store configured (lazy connect)");

        Ok(Self {
            client,
            conn: RwLock::new(None),
            reconnect: Mutex::new(()),
            healthy: AtomicBool::new(false),
        })
    }

    /// Get the cached connection, or establish a new one.
    ///
    /// Kept on a short retry budget: the facade's per-call fallback is the
    /// real recovery path, so there is no point blocking a caller on a long
    /// reconnect dance. Only one caller attempts the connect at a time;
    /// everyone else bails out to the fallback store straight away.
    async fn connection(&self) -> Result<ConnectionManager> {
        if self.healthy.load(Ordering::Relaxed) {
            if let Some(conn) = self.conn.read().clone() {
                return Ok(conn);
            }
        }

        let Ok(_guard) = self.reconnect.try_lock() else {
            anyhow::bail!("Redis reconnect already in progress");
        };

        // The previous holder may have reconnected before we got here.
        if self.healthy.load(Ordering::Relaxed) {
            if let Some(conn) = self.conn.read().clone() {
                return Ok(conn);
            }
        }

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Some(Duration::from_secs(2)))
            .set_response_timeout(Some(Duration::from_secs(2)));

        let conn = ConnectionManager::new_with_config(self.client.clone(), config)
            .await
            .context("failed to connect to Redis")?;

        *self.conn.write() = Some(conn.clone());
        self.healthy.store(true, Ordering::Relaxed);
        info!("Redis store connected");
        Ok(conn)
    }

    /// Record an operational failure. Logged at warn only on the healthy
    /// to unhealthy transition to avoid flooding while the service is down.
    fn mark_unhealthy(&self, op: &str, err: &dyn std::fmt::Display) {
        if self.healthy.swap(false, Ordering::Relaxed) {
            warn!(op = %op, error = %err, "[Redis] Operation failed, marking backend unhealthy");
        } else {
            debug!(op = %op, error = %err, "[Redis] Operation failed while unhealthy");
        }
    }

    fn fail<T>(&self, op: &str, err: impl Into<anyhow::Error>) -> Result<T> {
        let err = err.into();
        self.mark_unhealthy(op, &err);
        Err(err)
    }
}

// ===== Trait Implementations =====

use crate::traits::{CacheStore, DistributedStore};
use async_trait::async_trait;

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => return self.fail("get", e),
        };
        match conn.get::<_, Option<Vec<u8>>>(key).await {
            Ok(value) => Ok(value),
            Err(e) => self.fail("get", e),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => return self.fail("set", e),
        };
        // A zero TTL means no expiry, like `None`. Redis EX has one-second
        // resolution, so sub-second TTLs round up.
        let result = match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };
        match result {
            Ok(()) => {
                debug!(key = %key, "[Redis] Cached key");
                Ok(())
            }
            Err(e) => self.fail("set", e),
        }
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => return self.fail("remove", e),
        };
        match conn.del::<_, usize>(key).await {
            Ok(removed) => Ok(removed > 0),
            Err(e) => self.fail("remove", e),
        }
    }

    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => return self.fail("try_acquire", e),
        };
        // SET key 1 NX EX ttl: the single atomic test-and-set the lock
        // contract requires. Replies OK when acquired, nil when held.
        let reply: Result<Option<String>, _> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(reply) => Ok(reply.is_some()),
            Err(e) => self.fail("try_acquire", e),
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => return self.fail("release", e),
        };
        match conn.del::<_, ()>(key).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail("release", e),
        }
    }

    async fn scan_and_delete(&self, prefix: &str) -> Result<usize> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => return self.fail("scan_and_delete", e),
        };

        // SCAN with cursor-based iteration and per-batch deletion keeps both
        // the server responsive and client memory bounded, unlike KEYS.
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let batch: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await;
            let (next_cursor, keys) = match batch {
                Ok(batch) => batch,
                Err(e) => return self.fail("scan_and_delete", e),
            };

            if !keys.is_empty() {
                match conn.del::<_, usize>(&keys).await {
                    Ok(count) => removed += count,
                    Err(e) => return self.fail("scan_and_delete", e),
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = %prefix, count = removed, "[Redis] Flushed keys by prefix");
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "Redis"
    }
}

impl DistributedStore for RedisStore {
    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}
