//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 限流器模块
//!
//! 滑动窗口限流器，限制任意最近 `period` 内开始的调用数。
//! 超出限制的调用方会被挂起，而不是被拒绝。

use crate::config::PerformanceSettings;
use crate::error::TierGuardError;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// 滑动窗口限流器
///
/// 记录每次放行调用的开始时间。只有当最近 `period` 内已有 `calls`
/// 个时间戳时调用方才会被挂起，且恰好挂起 `period - (now - oldest)`。
/// 等待中的调用方按到达顺序放行。
///
/// # 示例
/// ```rust
/// use tierguard::limiters::RateLimiter;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
/// 每分钟最多 100 次调用
///     let limiter = RateLimiter::new(100, Duration::from_secs(60));
///
///     limiter.acquire().await.unwrap();
///     assert_eq!(limiter.stats().in_window, 1);
/// }
/// ```
pub struct RateLimiter {
    /// 每个周期允许的调用数
    calls: usize,
    /// 窗口长度
    period: Duration,
    /// `acquire` 最长等待时间（可选）
    timeout: Option<Duration>,
    /// 已放行调用的开始时间，最早的在前
    window: parking_lot::Mutex<VecDeque<Instant>>,
    /// 按到达顺序串行化等待中的获取者
    queue: tokio::sync::Mutex<()>,
    total_acquired: AtomicU64,
    total_delayed: AtomicU64,
}

/// 限流器快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    pub calls: usize,
    #[serde(serialize_with = "as_secs")]
    pub period: Duration,
    /// 最近一个周期内记录的调用数
    pub in_window: usize,
    pub total_acquired: u64,
    /// 需要等待的调用数
    pub total_delayed: u64,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl RateLimiter {
    /// 创建每个 `period` 放行 `calls` 次的限流器。`calls` 为 0 时提升为 1。
    pub fn new(calls: usize, period: Duration) -> Self {
        let calls = if calls == 0 {
            warn!("rate limiter configured with 0 calls per period, using 1");
            1
        } else {
            calls
        };

        Self {
            calls,
            period,
            timeout: None,
            window: parking_lot::Mutex::new(VecDeque::with_capacity(calls.min(1024))),
            queue: tokio::sync::Mutex::new(()),
            total_acquired: AtomicU64::new(0),
            total_delayed: AtomicU64::new(0),
        }
    }

    /// 等待超过 `timeout` 时 `acquire` 以 `Timeout` 失败。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 根据 `settings` 构建限流器（若配置了限流）。
    pub fn from_settings(settings: &PerformanceSettings) -> Option<Self> {
        let calls = settings.rate_limit_calls_per_period?;
        let limiter = Self::new(calls, settings.rate_limit_period());
        Some(match settings.acquire_timeout() {
            Some(timeout) => limiter.with_timeout(timeout),
            None => limiter,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 丢弃已离开窗口的时间戳。
    fn prune(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = window.front() {
            if now.duration_since(front) >= self.period {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// 窗口有空位时记录调用；否则返回需要等待的时长。
    fn try_record(&self) -> Result<(), Duration> {
        let mut window = self.window.lock();
        let now = Instant::now();
        self.prune(&mut window, now);

        if window.len() < self.calls {
            window.push_back(now);
            self.total_acquired.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let oldest = window.front().copied().unwrap_or(now);
        Err(self.period.saturating_sub(now.duration_since(oldest)))
    }

    async fn acquire_in_order(&self) {
        let _turn = self.queue.lock().await;
        let mut delayed = false;

        loop {
            match self.try_record() {
                Ok(()) => break,
                Err(wait) => {
                    if !delayed {
                        delayed = true;
                        self.total_delayed.fetch_add(1, Ordering::Relaxed);
                        debug!("rate limit reached, waiting {:?}", wait);
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }

        trace!("rate limiter admitted call");
    }

    /// 等待直到可以开始调用，然后记录。
    ///
    /// 配置了超时时，超时后以 [`TierGuardError::Timeout`] 放弃，
    /// 且不记录任何调用。
    pub async fn acquire(&self) -> Result<(), TierGuardError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.acquire_in_order())
                .await
                .map_err(|_| {
                    TierGuardError::Timeout(format!("rate limiter wait exceeded {:?}", timeout))
                }),
            None => {
                self.acquire_in_order().await;
                Ok(())
            }
        }
    }

    /// 仅当现在即可开始且无人等待时才记录调用。
    pub fn try_acquire(&self) -> bool {
        let Ok(_turn) = self.queue.try_lock() else {
            return false;
        };
        self.try_record().is_ok()
    }

    /// 获取后运行 `work`。无论 `work` 返回什么，该调用都计入窗口。
    pub async fn run<F, T>(&self, work: F) -> Result<T, TierGuardError>
    where
        F: Future<Output = T>,
    {
        self.acquire().await?;
        Ok(work.await)
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let in_window = self
            .window
            .lock()
            .iter()
            .filter(|ts| now.duration_since(**ts) < self.period)
            .count();

        RateLimiterStats {
            calls: self.calls,
            period: self.period,
            in_window,
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_delayed: self.total_delayed.load(Ordering::Relaxed),
        }
    }
}
