//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 缓存模块
//!
//! 多级 TTL 缓存：内存 LRU 后端（L1）、磁盘持久化后端（L2）、
//! 两者组合的混合缓存，以及应用使用的 [`CacheManager`] 门面。

pub mod entry;
pub mod format;
pub mod hybrid;
pub mod manager;
pub mod memory;
pub mod persistent;
pub mod single_flight;
pub mod stats;

use crate::config::BackendKind;
use crate::error::TierGuardError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub use entry::CacheEntry;
pub use hybrid::{HybridCache, HybridCacheConfig, HybridCounters};
pub use manager::{CacheManager, CleanupTask};
pub use memory::{EvictionPolicy, MemoryBackend, MemoryBackendConfig};
pub use persistent::{PersistentBackend, PersistentBackendConfig};
pub use stats::{BackendStats, CacheCounters, CacheStats, HybridStats};

/// 可存放在任意后端（包括磁盘）中的值。
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// 缓存后端 trait
///
/// `get` 从不失败：读取错误和损坏记录会被记录日志并视为未命中。
/// 写入失败返回 [`TierGuardError::CacheWrite`]（拒绝策略的内存后端
/// 返回 [`TierGuardError::CapacityExceeded`]）。
#[async_trait]
pub trait CacheBackend<V>: Send + Sync {
    /// 返回 `key` 对应的存活值，并记录访问。
    async fn get(&self, key: &str) -> Option<V>;

    /// 插入或覆盖。`None` 使用后端的默认 TTL。
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), TierGuardError>;

    /// 是否删除了条目。
    async fn delete(&self, key: &str) -> bool;

    /// 删除所有条目并重置命中/未命中计数。
    async fn clear(&self) -> Result<(), TierGuardError>;

    /// 存在性检查，不更新访问元数据和 LRU 顺序。
    async fn exists(&self, key: &str) -> bool;

    /// 删除过期条目，返回删除数量。
    async fn sweep_expired(&self) -> usize;

    async fn stats(&self) -> CacheStats;

    fn kind(&self) -> BackendKind;
}

/// 由多个部分构建缓存键，以 `:` 连接。
///
/// ```
/// use tierguard::cache::cache_key;
///
/// assert_eq!(cache_key(&["whois", "example.com"]), "whois:example.com");
/// ```
pub fn cache_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| part.as_ref())
        .collect::<Vec<_>>()
        .join(":")
}
