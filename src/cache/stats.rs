//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 缓存统计
//!
//! 后端维护无锁计数器（[`CacheCounters`]），并提供可序列化的快照
//! （[`BackendStats`]、[`HybridStats`]）。

use crate::config::BackendKind;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// 所有后端共用的计数器
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
    writes: AtomicU64,
    corruptions: AtomicU64,
}

impl CacheCounters {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn corruptions(&self) -> u64 {
        self.corruptions.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits(), self.misses())
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corruption(&self) {
        self.corruptions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.corruptions.store(0, Ordering::Relaxed);
    }
}

/// `hits / (hits + misses)`，首次请求前为 0.0。
pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// 单个后端的快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStats {
    pub backend: BackendKind,
    /// 存活（未过期）条目数
    pub size: usize,
    /// 条目容量；无界存储为 None
    pub capacity: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_requests: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub writes: u64,
    pub corruptions: u64,
    /// 磁盘占用字节数，仅持久化后端
    pub disk_bytes: Option<u64>,
    /// 存储目录，仅持久化后端
    pub location: Option<PathBuf>,
}

impl BackendStats {
    pub(crate) fn from_counters(
        backend: BackendKind,
        counters: &CacheCounters,
        size: usize,
        capacity: Option<usize>,
    ) -> Self {
        let hits = counters.hits();
        let misses = counters.misses();
        Self {
            backend,
            size,
            capacity,
            hits,
            misses,
            hit_rate: hit_rate(hits, misses),
            total_requests: hits + misses,
            expirations: counters.expirations(),
            evictions: counters.evictions(),
            writes: counters.writes(),
            corruptions: counters.corruptions(),
            disk_bytes: None,
            location: None,
        }
    }
}

/// 混合缓存的快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridStats {
    pub l1: BackendStats,
    pub l2: BackendStats,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub total_hits: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
}

/// 任意后端报告的统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheStats {
    Single(BackendStats),
    Hybrid(HybridStats),
}

impl CacheStats {
    pub fn backend(&self) -> BackendKind {
        match self {
            CacheStats::Single(stats) => stats.backend,
            CacheStats::Hybrid(_) => BackendKind::Hybrid,
        }
    }

    /// 存活条目数；混合缓存以持久层为准。
    pub fn size(&self) -> usize {
        match self {
            CacheStats::Single(stats) => stats.size,
            CacheStats::Hybrid(stats) => stats.l2.size,
        }
    }

    pub fn hits(&self) -> u64 {
        match self {
            CacheStats::Single(stats) => stats.hits,
            CacheStats::Hybrid(stats) => stats.total_hits,
        }
    }

    pub fn misses(&self) -> u64 {
        match self {
            CacheStats::Single(stats) => stats.misses,
            CacheStats::Hybrid(stats) => stats.misses,
        }
    }

    pub fn hit_rate(&self) -> f64 {
        match self {
            CacheStats::Single(stats) => stats.hit_rate,
            CacheStats::Hybrid(stats) => stats.hit_rate,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BackendStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: size={}", self.backend, self.size)?;
        if let Some(capacity) = self.capacity {
            write!(f, "/{}", capacity)?;
        }
        write!(
            f,
            " hits={} misses={} hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.hit_rate * 100.0
        )?;
        if let Some(bytes) = self.disk_bytes {
            write!(f, " disk={:.2}MB", bytes as f64 / 1e6)?;
        }
        Ok(())
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStats::Single(stats) => stats.fmt(f),
            CacheStats::Hybrid(stats) => write!(
                f,
                "hybrid: l1_hits={} l2_hits={} misses={} promotions={} hit_rate={:.1}%\n  L1 {}\n  L2 {}",
                stats.l1_hits,
                stats.l2_hits,
                stats.misses,
                stats.promotions,
                stats.hit_rate * 100.0,
                stats.l1,
                stats.l2
            ),
        }
    }
}
