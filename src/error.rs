//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。后端层面的失败由 [`StorageError`] 描述，
//! 它实现了 `Clone`，可以在等待者之间共享；公开 API 返回的都是
//! [`TierGuardError`]。

use thiserror::Error;

/// TierGuard 错误类型
#[derive(Error, Debug)]
pub enum TierGuardError {
    /// 后端读取失败。`get` 从不返回它，而是记录日志并降级为未命中。
    /// 当存储目录无法列出时，`PersistentBackend::purge_expired`
    /// 会返回此错误。
    #[error("cache read failed: {0}")]
    CacheRead(StorageError),

    /// 后端写入失败。调用方计算出的值不受影响。
    #[error("cache write failed: {0}")]
    CacheWrite(StorageError),

    /// 配置为拒绝而非淘汰的有界结构已满。
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// 挂起点超过了配置的超时时间。
    #[error("timed out: {0}")]
    Timeout(String),

    /// 提交给执行器的任务失败或 panic。
    #[error("task failed: {0}")]
    TaskFailure(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// IO错误
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON错误
    #[error("json error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("yaml parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("toml parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl TierGuardError {
    /// 错误是否不影响调用方的主要计算。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TierGuardError::CacheRead(_) | TierGuardError::CacheWrite(_)
        )
    }
}

/// 后端存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 文件系统错误
    #[error("io error: {0}")]
    Io(String),

    /// 记录存在但无法解码
    #[error("corrupted record: {0}")]
    Corrupted(String),

    /// 值无法编码
    #[error("serialization error: {0}")]
    Serialization(String),

    /// 未找到
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            _ => StorageError::Io(err.to_string()),
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
