//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! TierGuard - Tiered Caching and Bounded Concurrency
//!
//! Keeps expensive lookups cached across runs and keeps concurrent outbound
//! work within limits.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use tierguard::prelude::*;` to import all commonly used types.
//!
//! ## Cache
//!
//! - [`MemoryBackend`] - bounded in-memory LRU store (L1)
//! - [`PersistentBackend`] - one checksummed record file per key (L2)
//! - [`HybridCache`] - L1 in front of L2 with promotion on L2 hits
//! - [`CacheManager`] - enable switch, compute-if-absent, periodic cleanup
//!
//! ## Concurrency
//!
//! - [`RateLimiter`] - sliding-window call rate limit
//! - [`BoundedExecutor`] - runs batches of tasks with bounded parallelism
//! - [`ConnectionPool`] - caps concurrently open network operations
//!
//! ## Wiring
//!
//! - [`Settings`] - YAML/TOML/JSON configuration
//! - [`ServiceContext`] - every component built from one `Settings`
//! - [`PerformanceMonitor`] - per-operation timing and cache hit rates
//!
//! # Examples
//!
//! ```rust
//! use tierguard::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(MemoryBackend::<String>::new(100));
//!     let cache: CacheManager<String> = CacheManager::new(backend);
//!
//!     let banner = cache
//!         .get_or_compute("banner:10.0.0.1", Some(Duration::from_secs(60)), || async {
//!             Ok::<_, TierGuardError>("SSH-2.0-OpenSSH_9.6".to_string())
//!         })
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(cache.get("banner:10.0.0.1").await, Some(banner));
//! }
//! ```
//!
//! # Features
//!
//! - `telemetry`: installs a `tracing-subscriber` formatter (see [`telemetry`])

pub mod prelude;

pub mod batch;
pub mod cache;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod executor;
pub mod limiters;
pub mod monitor;
pub mod pool;
#[cfg(feature = "telemetry")]
pub mod telemetry;

// Re-export commonly used types
pub use batch::BatchReader;
pub use cache::{
    cache_key, BackendStats, CacheBackend, CacheEntry, CacheManager, CacheStats, CacheValue,
    CleanupTask, EvictionPolicy, HybridCache, HybridCacheConfig, HybridStats, MemoryBackend,
    MemoryBackendConfig, PersistentBackend, PersistentBackendConfig,
};
pub use config::{BackendKind, CacheSettings, PerformanceSettings, Settings};
pub use context::ServiceContext;
pub use error::{StorageError, TierGuardError};
pub use executor::{BoundedExecutor, GateStats, Permit, PermitGate};
pub use limiters::{RateLimiter, RateLimiterStats};
pub use monitor::{OperationMetrics, PerformanceMonitor};
pub use pool::{ConnectionPool, PoolStats};
#[cfg(feature = "telemetry")]
pub use telemetry::init_logging;
