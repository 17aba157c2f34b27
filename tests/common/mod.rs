//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 测试通用工具模块

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tierguard::{
    cache::{CacheBackend, CacheStats, MemoryBackend},
    config::{BackendKind, CacheSettings},
    error::{StorageError, TierGuardError},
};

/// 安装一次测试用订阅者；后续调用不做任何操作。
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tierguard=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// 模拟调用方通常缓存的值类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: String,
    pub open_ports: Vec<u16>,
    pub banner: Option<String>,
}

pub fn scan_result(target: &str, ports: &[u16]) -> ScanResult {
    ScanResult {
        target: target.to_string(),
        open_ports: ports.to_vec(),
        banner: None,
    }
}

/// 以 `dir` 为根目录的缓存配置
pub fn cache_settings(dir: &Path, backend: BackendKind) -> CacheSettings {
    CacheSettings::default().backend(backend).dir(dir)
}

/// 统计调用次数、可配置为写入失败的内存后端
pub struct RecordingBackend<V> {
    inner: MemoryBackend<V>,
    gets: AtomicU64,
    sets: AtomicU64,
    fail_writes: AtomicBool,
}

impl<V> RecordingBackend<V> {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(1000),
            gets: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn failing_writes() -> Self {
        let backend = Self::new();
        backend.fail_writes.store(true, Ordering::SeqCst);
        backend
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::SeqCst)
    }

    /// 到达后端的所有调用次数。
    pub fn calls(&self) -> u64 {
        self.gets() + self.sets()
    }
}

#[async_trait]
impl<V> CacheBackend<V> for RecordingBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), TierGuardError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TierGuardError::CacheWrite(StorageError::Io(
                "disk full".to_string(),
            )));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> bool {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), TierGuardError> {
        self.inner.clear().await
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }

    async fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired().await
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
