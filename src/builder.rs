//! Cache Facade Builder
//!
//! Configuration and construction for [`CacheFacade`]. Every option has a
//! documented default; an unconfigured builder yields a memory-only facade.
//!
//! # Example: Memory-Only Facade
//!
//! ```rust,no_run
//! use stampede_cache::CacheFacadeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheFacadeBuilder::new()
//!         .namespace("geo")
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: With Redis
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stampede_cache::CacheFacadeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheFacadeBuilder::new()
//!         .namespace("geo")
//!         .default_ttl(Duration::from_secs(600))
//!         .memory_max_items(5000)
//!         .distributed_url("redis://127.0.0.1:6379")
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::backends::MemoryStore;
use crate::facade::CacheFacade;
use crate::traits::DistributedStore;

#[cfg(feature = "redis")]
use crate::backends::RedisStore;

/// Builder for [`CacheFacade`].
///
/// # Defaults
///
/// | Option | Default |
/// |---|---|
/// | `namespace` | `"cache"` |
/// | `default_ttl` | 300 seconds |
/// | `memory_max_items` | 1000 |
/// | `distributed_url` | none (memory-only) |
pub struct CacheFacadeBuilder {
    namespace: String,
    default_ttl: Duration,
    memory_max_items: usize,
    #[cfg(feature = "redis")]
    distributed_url: Option<String>,
    distributed: Option<Arc<dyn DistributedStore>>,
}

impl CacheFacadeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespace: "cache".to_string(),
            default_ttl: Duration::from_secs(300),
            memory_max_items: 1000,
            #[cfg(feature = "redis")]
            distributed_url: None,
            distributed: None,
        }
    }

    /// Key prefix isolating this facade's data from others sharing a
    /// backend.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// TTL applied when callers omit one.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Eviction threshold for the in-process store.
    #[must_use]
    pub fn memory_max_items(mut self, max_items: usize) -> Self {
        self.memory_max_items = max_items;
        self
    }

    /// Connection target for the Redis backend. When never called, all
    /// operations use the in-process store. The connection itself is
    /// established lazily on first use.
    #[cfg(feature = "redis")]
    #[must_use]
    pub fn distributed_url(mut self, url: impl Into<String>) -> Self {
        self.distributed_url = Some(url.into());
        self
    }

    /// Plug in a custom distributed backend. Takes precedence over
    /// `distributed_url`.
    #[must_use]
    pub fn with_distributed(mut self, store: Arc<dyn DistributedStore>) -> Self {
        self.distributed = Some(store);
        self
    }

    /// Construct the facade.
    ///
    /// # Errors
    ///
    /// Fails only on a malformed distributed store URL (configuration
    /// fault). An unreachable but well-formed target is not an error:
    /// operations fall back to the in-process store until it recovers.
    pub async fn build(self) -> Result<CacheFacade> {
        let remote = self.resolve_distributed()?;

        info!(
            namespace = %self.namespace,
            default_ttl_secs = %self.default_ttl.as_secs(),
            memory_max_items = %self.memory_max_items,
            distributed = %remote.is_some(),
            "Initializing cache facade"
        );

        let memory = Arc::new(MemoryStore::new(self.memory_max_items));
        Ok(CacheFacade::new(self.namespace, self.default_ttl, memory, remote))
    }

    #[cfg(feature = "redis")]
    fn resolve_distributed(&self) -> Result<Option<Arc<dyn DistributedStore>>> {
        if let Some(store) = &self.distributed {
            return Ok(Some(Arc::clone(store)));
        }
        match &self.distributed_url {
            Some(url) => Ok(Some(Arc::new(RedisStore::new(url)?))),
            None => Ok(None),
        }
    }

    #[cfg(not(feature = "redis"))]
    fn resolve_distributed(&self) -> Result<Option<Arc<dyn DistributedStore>>> {
        Ok(self.distributed.as_ref().map(Arc::clone))
    }
}

impl Default for CacheFacadeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
