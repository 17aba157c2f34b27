//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 连接池
//!
//! 限制同时打开的网络操作数量。连接池发放的是槽位而非连接；
//! 调用方在持有槽位期间自行打开所需的连接。

use crate::config::PerformanceSettings;
use crate::error::TierGuardError;
use crate::executor::{GateStats, Permit, PermitGate};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// 连接池快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub active: usize,
    pub available: usize,
    pub total_acquired: u64,
    pub peak_active: usize,
}

impl From<GateStats> for PoolStats {
    fn from(stats: GateStats) -> Self {
        Self {
            size: stats.capacity,
            active: stats.active,
            available: stats.available,
            total_acquired: stats.total_acquired,
            peak_active: stats.peak_active,
        }
    }
}

/// 连接池
///
/// # 示例
/// ```rust
/// use tierguard::pool::ConnectionPool;
///
/// #[tokio::main]
/// async fn main() {
///     let pool = ConnectionPool::new(10);
///     {
///         let _slot = pool.acquire().await.unwrap();
///         assert_eq!(pool.stats().active, 1);
///     }
///     assert_eq!(pool.stats().available, 10);
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionPool {
    gate: PermitGate,
}

impl ConnectionPool {
    pub fn new(size: usize) -> Self {
        Self {
            gate: PermitGate::new(size),
        }
    }

    pub fn from_settings(settings: &PerformanceSettings) -> Self {
        let pool = Self::new(settings.connection_pool_size);
        match settings.acquire_timeout() {
            Some(timeout) => pool.with_acquire_timeout(timeout),
            None => pool,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.gate = self.gate.with_timeout(timeout);
        self
    }

    pub fn size(&self) -> usize {
        self.gate.capacity()
    }

    /// 等待空闲槽位。许可被丢弃时归还槽位。
    pub async fn acquire(&self) -> Result<Permit, TierGuardError> {
        let permit = self.gate.acquire().await?;
        trace!("pool slot acquired");
        Ok(permit)
    }

    pub fn try_acquire(&self) -> Option<Permit> {
        self.gate.try_acquire()
    }

    /// 持有一个槽位运行 `operation`。
    pub async fn with_slot<F, T>(&self, operation: F) -> Result<T, TierGuardError>
    where
        F: Future<Output = T>,
    {
        let _slot = self.acquire().await?;
        Ok(operation.await)
    }

    pub fn stats(&self) -> PoolStats {
        self.gate.stats().into()
    }
}
