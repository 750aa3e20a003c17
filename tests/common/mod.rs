//! Common utilities for integration tests
//!
//! Shared test infrastructure: facade constructors, a shared distributed
//! store double, unique key generation, and test data types.

#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use stampede_cache::{
    async_trait, CacheFacade, CacheFacadeBuilder, CacheStore, DistributedStore, MemoryStore,
};

/// Create a test key with a unique suffix to avoid conflicts between tests
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Memory-only facade with test-friendly defaults
pub async fn memory_facade(namespace: &str) -> Result<CacheFacade> {
    CacheFacadeBuilder::new()
        .namespace(namespace)
        .default_ttl(Duration::from_secs(60))
        .memory_max_items(256)
        .build()
        .await
}

/// Distributed store double backed by a shareable in-process store.
///
/// Lets two facades with different namespaces observe the same backend
/// without a running Redis, and can be flipped to a failing state to
/// exercise the fallback path.
pub struct SharedStore {
    inner: MemoryStore,
    failing: std::sync::atomic::AtomicBool,
}

impl SharedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(1024),
            failing: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::Relaxed);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::Relaxed) {
            anyhow::bail!("simulated backend outage");
        }
        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl CacheStore for SharedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.check()?;
        self.inner.remove(key).await
    }

    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check()?;
        self.inner.try_acquire(key, ttl).await
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.release(key).await
    }

    async fn scan_and_delete(&self, prefix: &str) -> Result<usize> {
        self.check()?;
        self.inner.scan_and_delete(prefix).await
    }

    fn name(&self) -> &'static str {
        "SharedStore"
    }
}

impl DistributedStore for SharedStore {
    fn is_healthy(&self) -> bool {
        !self.failing.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Generate test data of various types
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Hotel {
        pub id: u64,
        pub name: String,
        pub stars: u8,
    }

    impl Hotel {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("hotel-{id}"),
                stars: 4,
            }
        }
    }
}
