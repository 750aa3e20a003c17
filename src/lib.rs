//! Stampede Cache
//!
//! A stampede-safe cache facade for data-serving endpoints, featuring:
//! - **Bounded in-process store**: insertion-order eviction, lazy expiry
//! - **Optional Redis backend**: lazy connection, health tracking,
//!   transparent fallback to the in-process store when unreachable
//! - **Stampede protection**: per-key self-expiring locks so that at most
//!   one caller computes a missing value while others wait for it
//! - **Namespacing**: key prefixes isolating facades that share a backend,
//!   with cursor-based namespace flush
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stampede_cache::CacheFacadeBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheFacadeBuilder::new()
//!         .namespace("geo")
//!         .distributed_url("redis://127.0.0.1:6379")
//!         .build()
//!         .await?;
//!
//!     // Read-through with stampede protection: concurrent misses for the
//!     // same key coalesce onto a single fetch.
//!     let hotels: Vec<String> = cache
//!         .with_cache("nearby_hotels:48.85:2.35:5000", || async {
//!             Ok(vec!["hotel-a".to_string(), "hotel-b".to_string()])
//!         })
//!         .await?;
//!
//!     tracing::info!(count = hotels.len(), "served hotels");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Caller → CacheFacade → Redis (healthy?) → value | fetcher()
//!                      ↘ MemoryStore (fallback / memory-only)
//! ```
//!
//! # Guarantees
//!
//! The cache is a best-effort accelerator: availability failures of the
//! distributed backend are absorbed by the fallback store and never reach
//! callers, and stampede protection reduces duplicate work without
//! promising exactly-once computation. System correctness must rest on the
//! fetcher's own result, never on a cache hit.

pub mod backends;
pub mod builder;
pub mod facade;
pub mod traits;

pub use backends::MemoryStore;

#[cfg(feature = "redis")]
pub use backends::RedisStore;

pub use builder::CacheFacadeBuilder;
pub use facade::{CacheFacade, CacheInfo, WithCacheOptions};
pub use traits::{CacheStore, DistributedStore};

// Re-export async_trait for custom backend implementations
pub use async_trait::async_trait;
