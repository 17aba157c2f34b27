//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 混合缓存
//!
//! 内存 L1 位于持久化 L2 之前。
//!
//! - **读路径**：L1 -> L2 -> 未命中。L2 命中会以 L1 默认 TTL 提升到 L1。
//! - **写路径**：写穿透，先写 L1。L2 以长 TTL 作为权威数据，提升的条目只是副本。
//! - **失败处理**：L2 写入失败会返回给调用方；L1 副本保留。

use crate::cache::memory::{MemoryBackend, MemoryBackendConfig};
use crate::cache::persistent::{PersistentBackend, PersistentBackendConfig};
use crate::cache::stats::{hit_rate, CacheStats, HybridStats};
use crate::cache::{CacheBackend, CacheValue};
use crate::config::{BackendKind, CacheSettings};
use crate::constants::{DEFAULT_CACHE_TTL_SECS, DEFAULT_L1_CAPACITY, DEFAULT_L1_TTL_SECS};
use crate::error::TierGuardError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// 混合缓存配置
#[derive(Debug, Clone)]
pub struct HybridCacheConfig {
    /// L1 最大条目数
    pub l1_capacity: usize,
    /// L1 默认 TTL，也用于提升的条目
    pub l1_ttl: Duration,
    /// L2 目录
    pub l2_dir: PathBuf,
    /// L2 默认 TTL
    pub l2_ttl: Duration,
}

impl HybridCacheConfig {
    pub fn new(l2_dir: impl Into<PathBuf>) -> Self {
        Self {
            l1_capacity: DEFAULT_L1_CAPACITY,
            l1_ttl: Duration::from_secs(DEFAULT_L1_TTL_SECS),
            l2_dir: l2_dir.into(),
            l2_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            l1_capacity: settings.l1_capacity,
            l1_ttl: settings.l1_ttl(),
            l2_dir: settings.resolved_dir(),
            l2_ttl: settings.ttl(),
        }
    }

    pub fn l1_capacity(mut self, capacity: usize) -> Self {
        self.l1_capacity = capacity;
        self
    }

    pub fn l1_ttl(mut self, ttl: Duration) -> Self {
        self.l1_ttl = ttl;
        self
    }

    pub fn l2_ttl(mut self, ttl: Duration) -> Self {
        self.l2_ttl = ttl;
        self
    }
}

/// 混合缓存统计
#[derive(Debug, Default)]
pub struct HybridCounters {
    /// L1 命中次数
    l1_hits: AtomicU64,
    /// L2 命中次数
    l2_hits: AtomicU64,
    /// 两级均未命中次数
    misses: AtomicU64,
    /// 复制到 L1 的 L2 命中次数
    promotions: AtomicU64,
}

impl HybridCounters {
    pub fn l1_hits(&self) -> u64 {
        self.l1_hits.load(Ordering::Relaxed)
    }

    pub fn l2_hits(&self) -> u64 {
        self.l2_hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.l1_hits() + self.l2_hits(), self.misses())
    }

    fn reset(&self) {
        self.l1_hits.store(0, Ordering::Relaxed);
        self.l2_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.promotions.store(0, Ordering::Relaxed);
    }
}

/// 两级缓存
pub struct HybridCache<V> {
    l1: MemoryBackend<V>,
    l2: PersistentBackend<V>,
    config: HybridCacheConfig,
    counters: HybridCounters,
}

impl<V: CacheValue> HybridCache<V> {
    pub fn new(config: HybridCacheConfig) -> Result<Self, TierGuardError> {
        let l1 = MemoryBackend::with_config(
            MemoryBackendConfig::new()
                .capacity(config.l1_capacity)
                .default_ttl(config.l1_ttl),
        );
        let l2 = PersistentBackend::new(
            PersistentBackendConfig::new(config.l2_dir.clone()).default_ttl(config.l2_ttl),
        )?;

        debug!(
            "hybrid cache: l1_capacity={}, l1_ttl={:?}, l2_ttl={:?}, l2_dir={}",
            config.l1_capacity,
            config.l1_ttl,
            config.l2_ttl,
            config.l2_dir.display()
        );

        Ok(Self {
            l1,
            l2,
            config,
            counters: HybridCounters::default(),
        })
    }

    pub fn l1(&self) -> &MemoryBackend<V> {
        &self.l1
    }

    pub fn l2(&self) -> &PersistentBackend<V> {
        &self.l2
    }

    pub fn config(&self) -> &HybridCacheConfig {
        &self.config
    }

    pub fn counters(&self) -> &HybridCounters {
        &self.counters
    }
}

#[async_trait]
impl<V: CacheValue> CacheBackend<V> for HybridCache<V> {
    async fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.l1.get_entry(key) {
            self.counters.l1_hits.fetch_add(1, Ordering::Relaxed);
            trace!("L1 hit: {}", key);
            return Some(entry.value);
        }

        match self.l2.get_entry(key).await {
            Some(entry) => {
                self.counters.l2_hits.fetch_add(1, Ordering::Relaxed);
                trace!("L2 hit: {}", key);

                // 以 L1 默认 TTL 提升
                match self.l1.insert(key, entry.value.clone(), None) {
                    Ok(()) => {
                        self.counters.promotions.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => debug!("promotion of {} failed: {}", key, e),
                }

                Some(entry.value)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                trace!("hybrid miss: {}", key);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), TierGuardError> {
        let l1_ttl = ttl.map(|ttl| ttl.min(self.config.l1_ttl));
        self.l1.insert(key, value.clone(), l1_ttl)?;
        self.l2.insert(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> bool {
        let in_l1 = self.l1.remove(key);
        let in_l2 = self.l2.remove(key).await;
        in_l1 || in_l2
    }

    async fn clear(&self) -> Result<(), TierGuardError> {
        self.l1.clear_all();
        self.counters.reset();
        self.l2.clear_all().await.map_err(TierGuardError::CacheWrite)
    }

    async fn exists(&self, key: &str) -> bool {
        self.l1.contains(key) || self.l2.contains(key).await
    }

    async fn sweep_expired(&self) -> usize {
        let l1_removed = self.l1.purge_expired();
        let l2_removed = CacheBackend::sweep_expired(&self.l2).await;
        l1_removed + l2_removed
    }

    async fn stats(&self) -> CacheStats {
        let l1 = match CacheBackend::stats(&self.l1).await {
            CacheStats::Single(stats) => stats,
            CacheStats::Hybrid(stats) => stats.l1,
        };
        let l2 = match CacheBackend::stats(&self.l2).await {
            CacheStats::Single(stats) => stats,
            CacheStats::Hybrid(stats) => stats.l2,
        };

        let l1_hits = self.counters.l1_hits();
        let l2_hits = self.counters.l2_hits();
        let misses = self.counters.misses();
        let total_hits = l1_hits + l2_hits;

        CacheStats::Hybrid(HybridStats {
            l1,
            l2,
            l1_hits,
            l2_hits,
            misses,
            promotions: self.counters.promotions(),
            total_hits,
            total_requests: total_hits + misses,
            hit_rate: hit_rate(total_hits, misses),
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Hybrid
    }
}
