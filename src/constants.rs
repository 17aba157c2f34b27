//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for TierGuard.
//!
//! Every default used by the settings layer and the component constructors is
//! defined here with its purpose and usage context.

// ============================================================================
// Cache Constants
// ============================================================================

/// Default capacity of a standalone memory backend.
///
/// Used when the `memory` strategy is selected.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1_000;

/// Default capacity of the L1 tier of a hybrid cache.
pub const DEFAULT_L1_CAPACITY: usize = 100;

/// Default TTL of the L1 tier (5 minutes).
///
/// Kept short so the hot path never serves values much older than the
/// durable tier would.
pub const DEFAULT_L1_TTL_SECS: u64 = 300;

/// Default TTL for cache entries (1 hour).
///
/// Applies to the memory and file strategies and to the L2 tier of a hybrid
/// cache.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;

/// Default interval of the background expiry sweep (1 hour).
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3_600;

/// Directory name used under the platform cache directory.
pub const DEFAULT_CACHE_DIR_NAME: &str = "tierguard";

/// File extension of persisted cache records.
pub const CACHE_FILE_EXTENSION: &str = "cache";

/// Number of lock stripes guarding on-disk records.
///
/// Operations on keys whose digests share a stripe are serialized.
pub const PERSISTENT_LOCK_STRIPES: usize = 64;

// ============================================================================
// Concurrency Constants
// ============================================================================

/// Default executor capacity.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default connection pool size.
pub const DEFAULT_CONNECTION_POOL_SIZE: usize = 100;

/// Default rate limiter period (1 minute).
pub const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;

// ============================================================================
// Batch Constants
// ============================================================================

/// Default number of lines per batch when reading line-oriented inputs.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
