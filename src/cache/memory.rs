//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 内存后端（L1）
//!
//! 由 `parking_lot::Mutex` 保护的有界 LRU 存储。过期条目在读取时惰性删除，
//! 也可由 [`MemoryBackend::purge_expired`] 主动清理。
//!
//! # 示例
//!
//! ```no_run
//! use tierguard::cache::{CacheBackend, MemoryBackend, MemoryBackendConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache: MemoryBackend<String> = MemoryBackend::with_config(
//!         MemoryBackendConfig::new()
//!             .capacity(100)
//!             .default_ttl(Duration::from_secs(300)),
//!     );
//!
//!     cache.set("key1", "value1".to_string(), None).await.unwrap();
//!     assert_eq!(cache.get("key1").await, Some("value1".to_string()));
//! }
//! ```

use crate::cache::entry::CacheEntry;
use crate::cache::stats::{BackendStats, CacheCounters, CacheStats};
use crate::cache::CacheBackend;
use crate::config::BackendKind;
use crate::constants::DEFAULT_MEMORY_CAPACITY;
use crate::error::TierGuardError;
use async_trait::async_trait;
use chrono::Utc;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::{debug, trace};

/// 存储已满时新键到来的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// 淘汰最久未使用的条目
    #[default]
    Lru,
    /// 以 `CapacityExceeded` 拒绝写入
    Reject,
}

/// 内存后端配置
#[derive(Debug, Clone)]
pub struct MemoryBackendConfig {
    /// 最大条目数
    pub capacity: usize,
    /// `set` 未指定 TTL 时使用的 TTL
    pub default_ttl: Option<Duration>,
    pub eviction_policy: EvictionPolicy,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl: None,
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

impl MemoryBackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }
}

/// 内存 LRU 后端
pub struct MemoryBackend<V> {
    data: parking_lot::Mutex<lru::LruCache<String, CacheEntry<V>>>,
    config: MemoryBackendConfig,
    counters: CacheCounters,
}

impl<V> MemoryBackend<V> {
    /// 创建最多容纳 `capacity` 个条目的后端；除非 `set` 时指定 TTL，
    /// 条目永不过期。
    pub fn new(capacity: usize) -> Self {
        Self::with_config(MemoryBackendConfig::new().capacity(capacity))
    }

    pub fn with_config(config: MemoryBackendConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            data: parking_lot::Mutex::new(lru::LruCache::new(capacity)),
            config,
            counters: CacheCounters::default(),
        }
    }

    pub fn config(&self) -> &MemoryBackendConfig {
        &self.config
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    pub fn capacity(&self) -> usize {
        self.data.lock().cap().get()
    }

    /// 存活条目数。
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.data
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 删除所有过期条目，返回删除数量。
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut cache = self.data.lock();

        let expired_keys: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();
        for key in expired_keys {
            cache.pop(&key);
        }
        drop(cache);

        if count > 0 {
            self.counters.record_expirations(count as u64);
            debug!("purged {} expired entries from memory backend", count);
        }

        count
    }

    fn snapshot(&self) -> BackendStats {
        BackendStats::from_counters(
            BackendKind::Memory,
            &self.counters,
            self.len(),
            Some(self.config.capacity.max(1)),
        )
    }
}

impl<V: Clone> MemoryBackend<V> {
    /// 查找存活条目并记录访问。
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let mut cache = self.data.lock();

        let hit = match cache.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.record_access();
                Some(entry.clone())
            }
            Some(_) => {
                cache.pop(key);
                self.counters.record_expiration();
                None
            }
            None => None,
        };
        drop(cache);

        match hit {
            Some(entry) => {
                self.counters.record_hit();
                trace!("memory hit: {}", key);
                Some(entry)
            }
            None => {
                self.counters.record_miss();
                trace!("memory miss: {}", key);
                None
            }
        }
    }

    /// 存储值，按策略淘汰或拒绝。
    pub fn insert(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), TierGuardError> {
        let ttl = ttl.or(self.config.default_ttl);
        let entry = CacheEntry::new(key, value, ttl);

        let mut cache = self.data.lock();

        if !cache.contains(key) && cache.len() >= cache.cap().get() {
            // 过期条目不占用容量
            let now = Utc::now();
            let expired_key = cache
                .iter()
                .find(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone());

            match expired_key {
                Some(expired_key) => {
                    cache.pop(&expired_key);
                    self.counters.record_expiration();
                }
                None if self.config.eviction_policy == EvictionPolicy::Reject => {
                    return Err(TierGuardError::CapacityExceeded(format!(
                        "memory backend is full ({} entries)",
                        cache.cap()
                    )));
                }
                None => {}
            }
        }

        // `push` 返回被替换的条目：要么是该键的旧值，
        // 要么是被淘汰的 LRU 条目。
        if let Some((evicted_key, evicted)) = cache.push(key.to_string(), entry) {
            if evicted_key != key {
                if evicted.is_expired() {
                    self.counters.record_expiration();
                } else {
                    self.counters.record_eviction();
                    debug!("evicted least recently used key: {}", evicted_key);
                }
            }
        }
        drop(cache);

        self.counters.record_write();
        Ok(())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.data.lock().pop(key).is_some()
    }

    /// 存在性检查，不改变 LRU 顺序和访问统计。
    pub fn contains(&self, key: &str) -> bool {
        self.data
            .lock()
            .peek(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    pub fn clear_all(&self) {
        self.data.lock().clear();
        self.counters.reset();
    }
}

#[async_trait]
impl<V> CacheBackend<V> for MemoryBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), TierGuardError> {
        self.insert(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> bool {
        self.remove(key)
    }

    async fn clear(&self) -> Result<(), TierGuardError> {
        self.clear_all();
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.contains(key)
    }

    async fn sweep_expired(&self) -> usize {
        self.purge_expired()
    }

    async fn stats(&self) -> CacheStats {
        CacheStats::Single(self.snapshot())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
