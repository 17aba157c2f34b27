//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 带元数据的缓存条目

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 缓存条目
///
/// 时间戳使用挂钟时间，条目持久化后被其他进程读回时含义不变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// 存储时使用的键
    pub key: String,
    /// 缓存值
    pub value: V,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 过期时间（None 表示永不过期）
    pub expires_at: Option<DateTime<Utc>>,
    /// 成功读取次数
    pub access_count: u64,
    /// 最近一次成功读取时间
    pub last_accessed: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    /// 创建一个在 `ttl` 后过期的新条目。
    pub fn new(key: impl Into<String>, value: V, ttl: Option<Duration>) -> Self {
        let created_at = Utc::now();
        let expires_at = ttl.map(|ttl| {
            // 超出 chrono 范围的时长饱和为"遥远的未来"。
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| created_at.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        Self {
            key: key.into(),
            value,
            created_at,
            expires_at,
            access_count: 0,
            last_accessed: None,
        }
    }

    /// 条目是否已过期。
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// 距离过期的剩余时间；永不过期的条目返回 `None`。
    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| {
            (expires_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    /// 记录一次成功读取。
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed = Some(Utc::now());
    }
}
