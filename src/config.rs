//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置模块
//!
//! 应用配置加载器使用的设置。支持 YAML、TOML 和 JSON 格式；
//! 每个字段都有默认值，因此可以只写部分字段。

use crate::constants::{
    DEFAULT_CACHE_DIR_NAME, DEFAULT_CACHE_TTL_SECS, DEFAULT_CLEANUP_INTERVAL_SECS,
    DEFAULT_CONNECTION_POOL_SIZE, DEFAULT_L1_CAPACITY, DEFAULT_L1_TTL_SECS, DEFAULT_MAX_WORKERS,
    DEFAULT_MEMORY_CAPACITY, DEFAULT_RATE_LIMIT_PERIOD_SECS,
};
use crate::error::TierGuardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub version: String,
    pub cache: CacheSettings,
    pub performance: PerformanceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            cache: CacheSettings::default(),
            performance: PerformanceSettings::default(),
        }
    }
}

impl Settings {
    /// 校验配置
    pub fn validate(&self) -> Result<(), String> {
        if self.version.is_empty() {
            return Err("version must not be empty".to_string());
        }

        self.cache
            .validate()
            .map_err(|e| format!("cache: {}", e))?;
        self.performance
            .validate()
            .map_err(|e| format!("performance: {}", e))?;

        Ok(())
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, TierGuardError> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, TierGuardError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, TierGuardError> {
        Ok(serde_json::from_str(input)?)
    }

    /// 加载并校验配置文件，根据扩展名选择解析器。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TierGuardError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        let settings = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            Some("toml") => Self::from_toml_str(&contents)?,
            Some("json") => Self::from_json_str(&contents)?,
            other => {
                return Err(TierGuardError::ConfigError(format!(
                    "unsupported settings format: {:?}, expected yaml, toml or json",
                    other
                )))
            }
        };

        settings.validate().map_err(TierGuardError::ConfigError)?;
        Ok(settings)
    }
}

/// 缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 有界内存 LRU 存储
    Memory,
    /// 磁盘存储，每个键一条记录
    File,
    /// 内存 L1 + 文件 L2
    Hybrid,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "hybrid" => Ok(BackendKind::Hybrid),
            other => Err(format!(
                "invalid cache backend: {}, valid values: {:?}",
                other,
                ["memory", "file", "hybrid"]
            )),
        }
    }
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(alias = "cacheBackend")]
    pub backend: BackendKind,
    #[serde(alias = "cachingEnabled")]
    pub enabled: bool,
    /// 默认 TTL；混合缓存中即 L2 的 TTL
    #[serde(alias = "cacheTTLSeconds")]
    pub ttl_secs: u64,
    /// 文件和混合策略使用的缓存目录
    pub dir: Option<PathBuf>,
    /// 内存策略的容量
    pub memory_capacity: usize,
    pub l1_capacity: usize,
    pub l1_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Hybrid,
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            dir: None,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            l1_capacity: DEFAULT_L1_CAPACITY,
            l1_ttl_secs: DEFAULT_L1_TTL_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("ttl_secs must be greater than 0".to_string());
        }

        if self.memory_capacity == 0 {
            return Err("memory_capacity must be greater than 0".to_string());
        }

        if self.l1_capacity == 0 {
            return Err("l1_capacity must be greater than 0".to_string());
        }

        if self.l1_ttl_secs == 0 {
            return Err("l1_ttl_secs must be greater than 0".to_string());
        }

        if self.backend == BackendKind::Hybrid && self.l1_ttl_secs > self.ttl_secs {
            return Err(format!(
                "l1_ttl_secs ({}) must not exceed ttl_secs ({})",
                self.l1_ttl_secs, self.ttl_secs
            ));
        }

        if self.cleanup_interval_secs == 0 {
            return Err("cleanup_interval_secs must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// 已配置的目录，或 `<平台缓存目录>/tierguard`。
    pub fn resolved_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(DEFAULT_CACHE_DIR_NAME),
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }
}

/// 并发配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceSettings {
    #[serde(alias = "maxWorkers")]
    pub max_workers: usize,
    pub connection_pool_size: usize,
    #[serde(alias = "rateLimitCallsPerPeriod")]
    pub rate_limit_calls_per_period: Option<usize>,
    pub rate_limit_period_secs: u64,
    /// 获取许可和限流等待的超时时间
    pub acquire_timeout_secs: Option<u64>,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            connection_pool_size: DEFAULT_CONNECTION_POOL_SIZE,
            rate_limit_calls_per_period: None,
            rate_limit_period_secs: DEFAULT_RATE_LIMIT_PERIOD_SECS,
            acquire_timeout_secs: None,
        }
    }
}

impl PerformanceSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }

        if self.connection_pool_size == 0 {
            return Err("connection_pool_size must be greater than 0".to_string());
        }

        if self.rate_limit_calls_per_period == Some(0) {
            return Err("rate_limit_calls_per_period must be greater than 0".to_string());
        }

        if self.rate_limit_period_secs == 0 {
            return Err("rate_limit_period_secs must be greater than 0".to_string());
        }

        if self.acquire_timeout_secs == Some(0) {
            return Err("acquire_timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit_period_secs)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_secs.map(Duration::from_secs)
    }
}
