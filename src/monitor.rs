//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 性能监控器
//!
//! 按操作统计耗时、错误和缓存命中。缓存管理器和有界执行器会记录到
//! 所挂载的监控器中；应用也可以记录自己的操作。

use ahash::AHashMap;
use serde::{Serialize, Serializer};
use std::fmt::Write as _;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::trace;

/// 单个操作的指标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationMetrics {
    pub operation: String,
    pub count: u64,
    #[serde(serialize_with = "as_secs")]
    pub total_time: Duration,
    #[serde(serialize_with = "as_secs")]
    pub min_time: Duration,
    #[serde(serialize_with = "as_secs")]
    pub max_time: Duration,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl OperationMetrics {
    fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            count: 0,
            total_time: Duration::ZERO,
            min_time: Duration::MAX,
            max_time: Duration::ZERO,
            errors: 0,
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub fn avg_time(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_time / u32::try_from(self.count).unwrap_or(u32::MAX)
        }
    }

    /// 缓存查询的命中比例；没有记录时为 0.0。
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// 性能监控器
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    metrics: parking_lot::Mutex<AHashMap<String, OperationMetrics>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录 `operation` 的一次执行。
    ///
    /// 不涉及缓存的操作 `cache_hit` 为 `None`。
    pub fn record(&self, operation: &str, duration: Duration, error: bool, cache_hit: Option<bool>) {
        let mut metrics = self.metrics.lock();
        let metric = metrics
            .entry(operation.to_string())
            .or_insert_with(|| OperationMetrics::new(operation));

        metric.count += 1;
        metric.total_time += duration;
        metric.min_time = metric.min_time.min(duration);
        metric.max_time = metric.max_time.max(duration);

        if error {
            metric.errors += 1;
        }

        match cache_hit {
            Some(true) => metric.cache_hits += 1,
            Some(false) => metric.cache_misses += 1,
            None => {}
        }

        trace!("recorded {} in {:?} (error={})", operation, duration, error);
    }

    /// 等待 `fut` 完成，记录其耗时及是否失败。
    pub async fn time<F, T, E>(&self, operation: &str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record(operation, start.elapsed(), result.is_err(), None);
        result
    }

    /// 单个操作的指标；为 `None` 时返回所有操作。
    pub fn metrics(&self, operation: Option<&str>) -> Vec<OperationMetrics> {
        let metrics = self.metrics.lock();
        match operation {
            Some(operation) => metrics.get(operation).cloned().into_iter().collect(),
            None => metrics.values().cloned().collect(),
        }
    }

    /// 清除单个操作；为 `None` 时清除全部。
    pub fn reset(&self, operation: Option<&str>) {
        let mut metrics = self.metrics.lock();
        match operation {
            Some(operation) => {
                metrics.remove(operation);
            }
            None => metrics.clear(),
        }
    }

    /// 所有操作的文本表格，按总耗时降序排列。
    pub fn report(&self) -> String {
        let mut metrics: Vec<OperationMetrics> = self
            .metrics(None)
            .into_iter()
            .filter(|metric| metric.count > 0)
            .collect();
        metrics.sort_by(|a, b| b.total_time.cmp(&a.total_time));

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<24} {:>8} {:>10} {:>10} {:>10} {:>8} {:>12}",
            "Operation", "Count", "Avg Time", "Min", "Max", "Errors", "Cache Hit %"
        );

        for metric in metrics {
            let hit_rate = if metric.cache_hits + metric.cache_misses > 0 {
                format!("{:.1}%", metric.cache_hit_rate() * 100.0)
            } else {
                "-".to_string()
            };

            let _ = writeln!(
                out,
                "{:<24} {:>8} {:>9.3}s {:>9.3}s {:>9.3}s {:>8} {:>12}",
                metric.operation,
                metric.count,
                metric.avg_time().as_secs_f64(),
                metric.min_time.as_secs_f64(),
                metric.max_time.as_secs_f64(),
                metric.errors,
                hit_rate
            );
        }

        out
    }
}
