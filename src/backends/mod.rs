//! Cache Store Implementations
//!
//! # Available Backends
//!
//! ## In-Process
//! - **Memory** - bounded store with insertion-order eviction, always
//!   available, used directly or as the fallback tier
//!
//! ## Distributed
//! - **Redis** - remote store with lazy connection and health tracking
//!   (feature: `redis`, enabled by default)
//!
//! Custom distributed backends can be plugged in through the
//! [`DistributedStore`](crate::traits::DistributedStore) trait and
//! [`CacheFacadeBuilder::with_distributed`](crate::builder::CacheFacadeBuilder::with_distributed).

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
