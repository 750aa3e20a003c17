//! Cache Store Traits
//!
//! This module defines the trait abstractions implemented by both cache
//! backends and, optionally, by user-supplied distributed stores.
//!
//! # Architecture
//!
//! - `CacheStore`: core capability set shared by every backend
//! - `DistributedStore`: extended trait for remote backends with health
//!   introspection, enabling transparent fallback in the facade
//!
//! # Example: Custom Distributed Backend
//!
//! ```rust,ignore
//! use stampede_cache::{CacheStore, DistributedStore, async_trait};
//! use std::time::Duration;
//! use anyhow::Result;
//!
//! struct MyRemoteStore {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl CacheStore for MyRemoteStore {
//!     async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
//!         // Your implementation
//!     }
//!     // ... remaining operations
//! }
//!
//! impl DistributedStore for MyRemoteStore {
//!     fn is_healthy(&self) -> bool {
//!         true
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Core capability set implemented identically by every cache backend.
///
/// All values are opaque byte payloads; serialization is the facade's
/// concern. Keys arrive already namespaced.
///
/// # Error Semantics
///
/// "Not found" is never an error: `get` returns `Ok(None)` and `remove`
/// returns `Ok(false)`. `Err` is reserved for operational faults
/// (connectivity, protocol) which the facade recovers from by falling
/// back to the in-process store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access
/// across async tasks.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the raw value stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(bytes))` - value found and not expired
    /// * `Ok(None)` - key absent or expired
    /// * `Err(e)` - backend operation failed
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`.
    ///
    /// A `ttl` of `None` or zero means the entry never expires on its own;
    /// the facade always supplies a TTL in practice.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Remove the entry under `key`.
    ///
    /// Returns whether an entry was actually removed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Atomically create `key` only if it is currently absent, with the
    /// given expiry. This is the single test-and-set primitive backing
    /// the facade's per-key computation lock.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the key was absent and is now held by this caller
    /// * `Ok(false)` - some other caller already holds it
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Release a lock entry created by [`CacheStore::try_acquire`].
    ///
    /// Idempotent: releasing an already-expired or already-released lock
    /// is not an error.
    async fn release(&self, key: &str) -> Result<()>;

    /// Delete every key starting with `prefix`, iterating in bounded
    /// batches (cursor-style) rather than loading the whole key space at
    /// once. Returns the number of keys removed.
    async fn scan_and_delete(&self, prefix: &str) -> Result<usize>;

    /// Name of this backend, for logging and diagnostics.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Extended trait for remote backends that can become unreachable.
///
/// The facade consults [`DistributedStore::is_healthy`] for diagnostics
/// only; operationally it simply attempts the call and falls back to the
/// in-process store on `Err`, so a backend marked unhealthy gets a fresh
/// reconnection attempt on the next call.
pub trait DistributedStore: CacheStore {
    /// Whether the last interaction with the remote service succeeded.
    ///
    /// This is a process-local snapshot, not a live probe.
    fn is_healthy(&self) -> bool;
}
