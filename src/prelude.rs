//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Prelude module - Commonly used types for quick imports
//!
//! `use tierguard::prelude::*;` brings in the types most applications need.

// Cache
pub use crate::cache::{
    cache_key, CacheBackend, CacheManager, CacheStats, HybridCache, HybridCacheConfig,
    MemoryBackend, PersistentBackend,
};

// Concurrency
pub use crate::executor::BoundedExecutor;
pub use crate::limiters::RateLimiter;
pub use crate::pool::ConnectionPool;

// Wiring
pub use crate::config::{BackendKind, Settings};
pub use crate::context::ServiceContext;
pub use crate::error::TierGuardError;
pub use crate::monitor::PerformanceMonitor;

#[cfg(feature = "telemetry")]
pub use crate::telemetry::init_logging;
