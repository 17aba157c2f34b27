//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 服务上下文
//!
//! 持有一个应用共享的缓存管理器、执行器、连接池、可选的限流器和
//! 性能监控器。由 [`Settings`] 构建一次后分发克隆；不存在进程级全局实例。

use crate::cache::{CacheManager, CacheValue, CleanupTask};
use crate::config::Settings;
use crate::error::TierGuardError;
use crate::executor::BoundedExecutor;
use crate::limiters::RateLimiter;
use crate::monitor::PerformanceMonitor;
use crate::pool::ConnectionPool;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// 共享服务上下文
pub struct ServiceContext<V = serde_json::Value> {
    settings: Arc<Settings>,
    cache: Arc<CacheManager<V>>,
    executor: BoundedExecutor,
    pool: ConnectionPool,
    limiter: Option<Arc<RateLimiter>>,
    monitor: Arc<PerformanceMonitor>,
}

impl<V> Clone for ServiceContext<V> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            cache: Arc::clone(&self.cache),
            executor: self.executor.clone(),
            pool: self.pool.clone(),
            limiter: self.limiter.clone(),
            monitor: Arc::clone(&self.monitor),
        }
    }
}

impl<V: CacheValue> ServiceContext<V> {
    /// 校验 `settings` 并据此构建所有组件。缓存管理器和执行器记录到
    /// 共享的监控器中。
    pub fn from_settings(settings: Settings) -> Result<Self, TierGuardError> {
        settings.validate().map_err(TierGuardError::ConfigError)?;

        let monitor = Arc::new(PerformanceMonitor::new());
        let cache =
            CacheManager::from_settings(&settings.cache)?.with_monitor(Arc::clone(&monitor));
        let executor =
            BoundedExecutor::from_settings(&settings.performance).with_monitor(Arc::clone(&monitor));
        let pool = ConnectionPool::from_settings(&settings.performance);
        let limiter = RateLimiter::from_settings(&settings.performance).map(Arc::new);

        info!(
            "service context ready: backend={}, workers={}, pool={}, rate_limited={}",
            settings.cache.backend,
            executor.max_workers(),
            pool.size(),
            limiter.is_some()
        );

        Ok(Self {
            settings: Arc::new(settings),
            cache: Arc::new(cache),
            executor,
            pool,
            limiter,
            monitor,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<CacheManager<V>> {
        &self.cache
    }

    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// 执行一次外部操作：先等待限流器（若有），然后在执行期间
    /// 持有一个连接池槽位。
    pub async fn call<F, T>(&self, operation: F) -> Result<T, TierGuardError>
    where
        F: Future<Output = T>,
    {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await?;
        }
        self.pool.with_slot(operation).await
    }

    /// 按配置的间隔启动周期性过期清理。
    pub fn start_cleanup(&self) -> CleanupTask {
        self.cache
            .start_cleanup_task(self.settings.cache.cleanup_interval())
    }
}
