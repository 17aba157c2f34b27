//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 有界执行器
//!
//! [`PermitGate`] 封装固定容量的信号量并发放 RAII [`Permit`]。
//! [`BoundedExecutor`] 通过许可门运行批量任务，同时运行的任务不超过
//! `max_workers` 个，失败只影响各自的结果槽位。

use crate::config::PerformanceSettings;
use crate::error::TierGuardError;
use crate::monitor::PerformanceMonitor;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinSet;
use tracing::{debug, instrument, trace, warn};

struct GateState {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    active: AtomicUsize,
    total_acquired: AtomicU64,
    peak_active: AtomicUsize,
}

/// 固定容量的许可门
///
/// 克隆得到指向同一许可门的另一个句柄。
#[derive(Clone)]
pub struct PermitGate {
    state: Arc<GateState>,
    acquire_timeout: Option<Duration>,
}

/// 许可门快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub capacity: usize,
    /// 当前持有的许可数
    pub active: usize,
    pub available: usize,
    pub total_acquired: u64,
    /// 同时持有许可数的最高值
    pub peak_active: usize,
}

/// 已占用的容量；丢弃时恰好释放一次。
pub struct Permit {
    _permit: OwnedSemaphorePermit,
    state: Arc<GateState>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("capacity", &self.state.capacity)
            .finish()
    }
}

impl PermitGate {
    /// 创建拥有 `capacity` 个许可的许可门。容量为 0 时提升为 1。
    pub fn new(capacity: usize) -> Self {
        let capacity = match capacity {
            0 => {
                warn!("permit gate configured with 0 permits, using 1");
                1
            }
            n => n.min(Semaphore::MAX_PERMITS),
        };

        Self {
            state: Arc::new(GateState {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                active: AtomicUsize::new(0),
                total_acquired: AtomicU64::new(0),
                peak_active: AtomicUsize::new(0),
            }),
            acquire_timeout: None,
        }
    }

    /// 等待超过 `timeout` 时 `acquire` 以 `Timeout` 失败。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout
    }

    fn grant(&self, permit: OwnedSemaphorePermit) -> Permit {
        let state = &self.state;
        let active = state.active.fetch_add(1, Ordering::Relaxed) + 1;
        state.total_acquired.fetch_add(1, Ordering::Relaxed);
        state.peak_active.fetch_max(active, Ordering::Relaxed);

        Permit {
            _permit: permit,
            state: Arc::clone(state),
        }
    }

    /// 等待许可。
    ///
    /// 等待期间丢弃返回的 future 不会占用任何许可。
    pub async fn acquire(&self) -> Result<Permit, TierGuardError> {
        let semaphore = Arc::clone(&self.state.semaphore);

        let acquired = match self.acquire_timeout {
            Some(timeout) => tokio::time::timeout(timeout, semaphore.acquire_owned())
                .await
                .map_err(|_| {
                    TierGuardError::Timeout(format!("permit wait exceeded {:?}", timeout))
                })?,
            None => semaphore.acquire_owned().await,
        };

        let permit =
            acquired.map_err(|_| TierGuardError::TaskFailure("semaphore closed".to_string()))?;
        Ok(self.grant(permit))
    }

    /// 仅当现在有空闲许可时才获取。
    pub fn try_acquire(&self) -> Option<Permit> {
        match Arc::clone(&self.state.semaphore).try_acquire_owned() {
            Ok(permit) => Some(self.grant(permit)),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    pub fn stats(&self) -> GateStats {
        let state = &self.state;
        let active = state.active.load(Ordering::Relaxed);

        GateStats {
            capacity: state.capacity,
            active,
            available: state.capacity.saturating_sub(active),
            total_acquired: state.total_acquired.load(Ordering::Relaxed),
            peak_active: state.peak_active.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 有界执行器
///
/// # 示例
/// ```rust
/// use tierguard::executor::BoundedExecutor;
///
/// #[tokio::main]
/// async fn main() {
///     let executor = BoundedExecutor::new(2);
///     let tasks: Vec<_> = (0..5u32)
///         .map(|i| async move { if i == 3 { Err("bad input") } else { Ok(i * 2) } })
///         .collect();
///
///     let results = executor.run_all(tasks).await;
///     assert_eq!(results.len(), 5);
///     assert!(results[3].is_err());
///     assert_eq!(results[4].as_ref().unwrap(), &8);
/// }
/// ```
#[derive(Clone)]
pub struct BoundedExecutor {
    gate: PermitGate,
    name: String,
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl BoundedExecutor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            gate: PermitGate::new(max_workers),
            name: "executor".to_string(),
            monitor: None,
        }
    }

    pub fn from_settings(settings: &PerformanceSettings) -> Self {
        let executor = Self::new(settings.max_workers);
        match settings.acquire_timeout() {
            Some(timeout) => executor.with_acquire_timeout(timeout),
            None => executor,
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.gate = self.gate.with_timeout(timeout);
        self
    }

    /// 记录到监控器时使用的操作名。
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_workers(&self) -> usize {
        self.gate.capacity()
    }

    /// 占用执行器的一个容量单位。
    pub async fn acquire(&self) -> Result<Permit, TierGuardError> {
        self.gate.acquire().await
    }

    /// 在许可下运行 `task`。
    #[instrument(skip(self, task), fields(executor = %self.name))]
    pub async fn run<F, T>(&self, task: F) -> Result<T, TierGuardError>
    where
        F: Future<Output = T>,
    {
        let _permit = self.gate.acquire().await?;
        let start = Instant::now();
        let output = task.await;

        if let Some(monitor) = &self.monitor {
            monitor.record(&self.name, start.elapsed(), false, None);
        }
        Ok(output)
    }

    /// 运行所有任务，同时运行的任务不超过 `max_workers` 个。
    ///
    /// 结果按输入顺序返回。任务的错误或 panic 在其槽位中变为
    /// [`TierGuardError::TaskFailure`]，等待许可超时变为
    /// [`TierGuardError::Timeout`]；其他槽位不受影响。丢弃返回的 future
    /// 会中止所有仍在等待或运行的任务。
    #[instrument(skip(self, tasks), fields(executor = %self.name, tasks = tasks.len()))]
    pub async fn run_all<F, T, E>(&self, tasks: Vec<F>) -> Vec<Result<T, TierGuardError>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let total = tasks.len();
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let gate = self.gate.clone();
            let monitor = self.monitor.clone();
            let name = self.name.clone();

            join_set.spawn(async move {
                let _permit = match gate.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return (index, Err(e)),
                };

                trace!("task {} started", index);
                let start = Instant::now();
                let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(TierGuardError::TaskFailure(e.to_string())),
                    Err(payload) => Err(TierGuardError::TaskFailure(format!(
                        "task panicked: {}",
                        panic_message(payload)
                    ))),
                };

                if let Some(monitor) = &monitor {
                    monitor.record(&name, start.elapsed(), outcome.is_err(), None);
                }
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<Result<T, TierGuardError>>> =
            std::iter::repeat_with(|| None).take(total).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Err(e) = &outcome {
                        debug!("task {} failed: {}", index, e);
                    }
                    slots[index] = Some(outcome);
                }
                Err(e) => warn!("executor task did not complete: {}", e),
            }
        }

        let results: Vec<_> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(TierGuardError::TaskFailure(
                        "task did not complete".to_string(),
                    ))
                })
            })
            .collect();

        let failed = results.iter().filter(|result| result.is_err()).count();
        debug!("{} tasks finished, {} failed", total, failed);
        results
    }

    pub fn stats(&self) -> GateStats {
        self.gate.stats()
    }
}
