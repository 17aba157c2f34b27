//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 缓存管理器
//!
//! 所配置后端的门面。支持运行时开关、带单飞合并的按需计算，
//! 以及周期性的过期清理。
//!
//! # 示例
//!
//! ```no_run
//! use tierguard::cache::{cache_key, CacheManager};
//! use tierguard::config::CacheSettings;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager: CacheManager = CacheManager::from_settings(&CacheSettings::default())?;
//!
//!     let key = cache_key(&["whois", "example.com"]);
//!     let record = manager
//!         .get_or_compute(&key, None, || async {
//!             Ok::<_, std::io::Error>(serde_json::json!({ "registrar": "example" }))
//!         })
//!         .await?;
//!     println!("{}", record);
//!     Ok(())
//! }
//! ```

use crate::cache::hybrid::{HybridCache, HybridCacheConfig};
use crate::cache::memory::{MemoryBackend, MemoryBackendConfig};
use crate::cache::persistent::{PersistentBackend, PersistentBackendConfig};
use crate::cache::single_flight::{Flight, SingleFlight};
use crate::cache::stats::CacheStats;
use crate::cache::{CacheBackend, CacheValue};
use crate::config::{BackendKind, CacheSettings};
use crate::error::TierGuardError;
use crate::monitor::PerformanceMonitor;
use ahash::AHashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// 缓存管理器
pub struct CacheManager<V = serde_json::Value> {
    backend: Arc<dyn CacheBackend<V>>,
    enabled: AtomicBool,
    flights: SingleFlight<V>,
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl<V: CacheValue> CacheManager<V> {
    /// 包装已构建好的后端。缓存默认启用。
    pub fn new(backend: Arc<dyn CacheBackend<V>>) -> Self {
        Self {
            backend,
            enabled: AtomicBool::new(true),
            flights: SingleFlight::new(),
            monitor: None,
        }
    }

    /// 根据 `settings` 构建所选的后端。
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, TierGuardError> {
        settings.validate().map_err(TierGuardError::ConfigError)?;

        let backend: Arc<dyn CacheBackend<V>> = match settings.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::with_config(
                MemoryBackendConfig::new()
                    .capacity(settings.memory_capacity)
                    .default_ttl(settings.ttl()),
            )),
            BackendKind::File => Arc::new(PersistentBackend::new(
                PersistentBackendConfig::new(settings.resolved_dir()).default_ttl(settings.ttl()),
            )?),
            BackendKind::Hybrid => Arc::new(HybridCache::new(HybridCacheConfig::from_settings(
                settings,
            ))?),
        };

        info!(
            "cache manager initialized: backend={}, enabled={}, ttl={}s",
            settings.backend, settings.enabled, settings.ttl_secs
        );

        let manager = Self::new(backend);
        manager.set_enabled(settings.enabled);
        Ok(manager)
    }

    /// 将 `get_or_compute` 调用记录到 `monitor`。
    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend<V>> {
        &self.backend
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            info!("caching {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    /// 返回缓存值；未命中或缓存禁用时返回 `None`。
    pub async fn get(&self, key: &str) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        self.backend.get(key).await
    }

    /// 存储值。缓存禁用时不做任何操作。
    pub async fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
    ) -> Result<(), TierGuardError> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.backend.set(key, value, ttl).await
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.backend.delete(key).await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.is_enabled() && self.backend.exists(key).await
    }

    pub async fn clear(&self) -> Result<(), TierGuardError> {
        self.backend.clear().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.backend.stats().await
    }

    /// 删除后端中的过期条目。
    pub async fn cleanup_expired(&self) -> usize {
        let removed = self.backend.sweep_expired().await;
        debug!("cleanup removed {} expired entries", removed);
        removed
    }

    /// 返回所有命中键的值；未命中的键不包含在结果中。
    pub async fn get_many(&self, keys: &[&str]) -> AHashMap<String, V> {
        let mut result = AHashMap::new();
        for key in keys {
            if let Some(value) = self.get(key).await {
                result.insert(key.to_string(), value);
            }
        }
        result
    }

    /// 存储所有条目。某次写入失败不影响其余条目；返回第一个错误。
    pub async fn set_many(
        &self,
        items: Vec<(String, V, Option<Duration>)>,
    ) -> Result<(), TierGuardError> {
        let mut first_error = None;
        for (key, value, ttl) in items {
            if let Err(e) = self.set(&key, value, ttl).await {
                warn!("cache write failed for key {}: {}", key, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 返回 `key` 的缓存值，或 `producer` 的结果（随后以 `ttl` 缓存）。
    ///
    /// producer 的错误原样返回且不缓存。缓存写入失败只记录日志，
    /// 仍返回计算出的值。
    /// 同一键上的并发未命中只运行一个 producer；若其失败，
    /// 每个等待者各自运行自己的 producer。
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let start = Instant::now();

        if !self.is_enabled() {
            let result = producer().await;
            self.record(key, start, result.is_err(), None);
            return result;
        }

        if let Some(value) = self.backend.get(key).await {
            self.record(key, start, false, Some(true));
            return Ok(value);
        }

        let result = match self.flights.join(key) {
            Flight::Leader(leader) => {
                // 上一次计算可能在我们未命中之后已写入了值
                if self.backend.exists(key).await {
                    if let Some(value) = self.backend.get(key).await {
                        leader.complete(value.clone());
                        self.record(key, start, false, Some(true));
                        return Ok(value);
                    }
                }

                let result = producer().await;
                if let Ok(value) = &result {
                    self.store(key, value.clone(), ttl).await;
                    leader.complete(value.clone());
                }
                // 失败的 leader 在此处被丢弃，释放其 follower
                result
            }
            Flight::Follower(follower) => match follower.wait().await {
                Some(value) => Ok(value),
                None => {
                    debug!("in-flight computation for {} failed, computing locally", key);
                    let result = producer().await;
                    if let Ok(value) = &result {
                        self.store(key, value.clone(), ttl).await;
                    }
                    result
                }
            },
        };

        self.record(key, start, result.is_err(), Some(false));
        result
    }

    async fn store(&self, key: &str, value: V, ttl: Option<Duration>) {
        match self.backend.set(key, value, ttl).await {
            Ok(()) => trace!("cached computed value: {}", key),
            Err(e) => warn!("failed to cache computed value for {}: {}", key, e),
        }
    }

    /// 操作名取键的第一段。
    fn record(&self, key: &str, start: Instant, error: bool, cache_hit: Option<bool>) {
        if let Some(monitor) = &self.monitor {
            let operation = key.split(':').next().unwrap_or(key);
            monitor.record(operation, start.elapsed(), error, cache_hit);
        }
    }

    /// 在当前 tokio 运行时上每隔 `interval` 执行一次
    /// [`cleanup_expired`](Self::cleanup_expired)。返回的句柄被丢弃时任务停止。
    pub fn start_cleanup_task(&self, interval: Duration) -> CleanupTask {
        let backend = Arc::clone(&self.backend);

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let removed = backend.sweep_expired().await;
                if removed > 0 {
                    info!("periodic cleanup removed {} expired entries", removed);
                } else {
                    debug!("periodic cleanup found nothing to remove");
                }
            }
        });

        CleanupTask { handle }
    }
}

/// 周期清理任务的句柄
pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl CleanupTask {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
