//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 持久化后端（L2）
//!
//! 缓存目录中每个键对应一个记录文件，命名为 `hex(sha256(key)).cache`。
//! 记录格式见 [`crate::cache::format`]。写入先落到唯一命名的临时文件，
//! 再重命名覆盖目标文件，读取方不会看到写了一半的记录。
//!
//! 损坏的记录不会暴露给调用方：记录日志、删除并视为未命中。

use crate::cache::entry::CacheEntry;
use crate::cache::format::{decode_record, encode_record, verify_record, RecordHeader};
use crate::cache::stats::{BackendStats, CacheCounters, CacheStats};
use crate::cache::{CacheBackend, CacheValue};
use crate::config::BackendKind;
use crate::constants::{CACHE_FILE_EXTENSION, PERSISTENT_LOCK_STRIPES};
use crate::error::{StorageError, TierGuardError};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// 持久化后端配置
#[derive(Debug, Clone)]
pub struct PersistentBackendConfig {
    /// 存放记录文件的目录
    pub dir: PathBuf,
    /// `set` 未指定 TTL 时使用的 TTL
    pub default_ttl: Option<Duration>,
}

impl PersistentBackendConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            default_ttl: None,
        }
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

/// 磁盘后端
pub struct PersistentBackend<V> {
    config: PersistentBackendConfig,
    /// 分段锁；键映射到摘要首字节对应的分段
    locks: Vec<Mutex<()>>,
    counters: CacheCounters,
    _marker: PhantomData<fn() -> V>,
}

impl<V> PersistentBackend<V> {
    /// 在 `config.dir` 上打开后端，目录不存在时自动创建。
    pub fn new(config: PersistentBackendConfig) -> Result<Self, TierGuardError> {
        std::fs::create_dir_all(&config.dir)?;
        debug!("persistent cache directory: {}", config.dir.display());

        Ok(Self {
            config,
            locks: (0..PERSISTENT_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            counters: CacheCounters::default(),
            _marker: PhantomData,
        })
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TierGuardError> {
        Self::new(PersistentBackendConfig::new(dir))
    }

    pub fn config(&self) -> &PersistentBackendConfig {
        &self.config
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// `key` 对应的记录文件。
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.config
            .dir
            .join(format!("{}.{}", hex::encode(digest), CACHE_FILE_EXTENSION))
    }

    fn stripe_for_key(&self, key: &str) -> &Mutex<()> {
        let digest = Sha256::digest(key.as_bytes());
        &self.locks[digest[0] as usize % self.locks.len()]
    }

    /// 记录文件对应的分段，由文件名开头的十六进制字节决定。
    fn stripe_for_path(&self, path: &Path) -> Option<&Mutex<()>> {
        let stem = path.file_stem()?.to_str()?;
        let first = u8::from_str_radix(stem.get(0..2)?, 16).ok()?;
        Some(&self.locks[first as usize % self.locks.len()])
    }

    /// 目录中当前的记录文件。
    async fn record_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.config.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if is_record_file(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn remove_record(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("failed to remove cache record {}: {}", path.display(), e);
            }
        }
    }

    /// 删除所有过期或无法读取的记录。
    ///
    /// 仅在目录无法列出时返回 `CacheRead`；无法读取的单条记录
    /// 会记录日志并跳过。
    pub async fn purge_expired(&self) -> Result<usize, TierGuardError> {
        let now = Utc::now();
        let mut removed = 0;

        let files = self
            .record_files()
            .await
            .map_err(TierGuardError::CacheRead)?;

        for path in files {
            let Some(stripe) = self.stripe_for_path(&path) else {
                continue;
            };
            let _guard = stripe.lock().await;

            match read_verified(&path).await {
                Ok(header) if header.is_expired_at(now) => {
                    self.remove_record(&path).await;
                    self.counters.record_expiration();
                    removed += 1;
                }
                Ok(_) => {}
                Err(StorageError::NotFound(_)) => {}
                Err(StorageError::Corrupted(reason)) => {
                    warn!("removing corrupt cache record {}: {}", path.display(), reason);
                    self.remove_record(&path).await;
                    self.counters.record_corruption();
                    removed += 1;
                }
                Err(e) => {
                    warn!("failed to read cache record {}: {}", path.display(), e);
                }
            }
        }

        if removed > 0 {
            debug!("swept {} records from {}", removed, self.config.dir.display());
        }

        Ok(removed)
    }

    /// 删除所有记录和残留的临时文件。
    pub async fn clear_all(&self) -> Result<(), StorageError> {
        let mut first_error = None;
        let mut dir = fs::read_dir(&self.config.dir).await?;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if !is_record_file(&path) && !is_temp_file(&path) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != ErrorKind::NotFound && first_error.is_none() {
                    first_error = Some(StorageError::from(e));
                }
            }
        }

        self.counters.reset();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 未过期且校验和正确的记录计为存活。载荷通过校验但无法解码为 `V`
    /// 的记录只有在读取时才会被发现。
    async fn snapshot(&self) -> BackendStats {
        let now = Utc::now();
        let mut live = 0;
        let mut disk_bytes = 0;

        match self.record_files().await {
            Ok(files) => {
                for path in files {
                    if let Ok(metadata) = fs::metadata(&path).await {
                        disk_bytes += metadata.len();
                    }
                    if let Ok(header) = read_verified(&path).await {
                        if !header.is_expired_at(now) {
                            live += 1;
                        }
                    }
                }
            }
            Err(e) => warn!("failed to list {}: {}", self.config.dir.display(), e),
        }

        let mut stats = BackendStats::from_counters(BackendKind::File, &self.counters, live, None);
        stats.disk_bytes = Some(disk_bytes);
        stats.location = Some(self.config.dir.clone());
        stats
    }
}

impl<V: Serialize + DeserializeOwned> PersistentBackend<V> {
    async fn load(&self, path: &Path) -> Result<Option<CacheEntry<V>>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => decode_record(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 通过临时文件和重命名将 `entry` 写入 `path`。
    async fn store(&self, path: &Path, entry: &CacheEntry<V>) -> Result<(), StorageError> {
        let bytes = encode_record(entry)?;
        let temp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&temp_path, &bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// 查找存活条目，并在磁盘上记录访问。
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let path = self.path_for(key);
        let _guard = self.stripe_for_key(key).lock().await;

        let entry = match self.load(&path).await {
            Ok(Some(entry)) if entry.key != key => {
                debug!("digest collision on {}, stored key differs", path.display());
                None
            }
            Ok(Some(entry)) if entry.is_expired() => {
                self.remove_record(&path).await;
                self.counters.record_expiration();
                None
            }
            Ok(Some(mut entry)) => {
                entry.record_access();
                if let Err(e) = self.store(&path, &entry).await {
                    debug!("failed to rewrite access metadata for {}: {}", key, e);
                }
                Some(entry)
            }
            Ok(None) => None,
            Err(StorageError::Corrupted(reason)) => {
                warn!("corrupt cache record for key {}: {}", key, reason);
                self.remove_record(&path).await;
                self.counters.record_corruption();
                None
            }
            Err(e) => {
                warn!("cache read failed for key {}: {}", key, e);
                None
            }
        };

        match entry {
            Some(entry) => {
                self.counters.record_hit();
                trace!("file hit: {}", key);
                Some(entry)
            }
            None => {
                self.counters.record_miss();
                trace!("file miss: {}", key);
                None
            }
        }
    }

    pub async fn insert(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
    ) -> Result<(), TierGuardError> {
        let ttl = ttl.or(self.config.default_ttl);
        let entry = CacheEntry::new(key, value, ttl);
        let path = self.path_for(key);

        let _guard = self.stripe_for_key(key).lock().await;
        self.store(&path, &entry)
            .await
            .map_err(TierGuardError::CacheWrite)?;

        self.counters.record_write();
        trace!("file set: {}", key);
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> bool {
        let path = self.path_for(key);
        let _guard = self.stripe_for_key(key).lock().await;

        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!("failed to delete cache record for key {}: {}", key, e);
                false
            }
        }
    }

    /// 存在性检查，不更新访问元数据。
    pub async fn contains(&self, key: &str) -> bool {
        let path = self.path_for(key);
        let _guard = self.stripe_for_key(key).lock().await;

        match self.load(&path).await {
            Ok(Some(entry)) => entry.key == key && !entry.is_expired(),
            _ => false,
        }
    }
}

#[async_trait]
impl<V: CacheValue> CacheBackend<V> for PersistentBackend<V> {
    async fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), TierGuardError> {
        self.insert(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> bool {
        self.remove(key).await
    }

    async fn clear(&self) -> Result<(), TierGuardError> {
        self.clear_all().await.map_err(TierGuardError::CacheWrite)
    }

    async fn exists(&self, key: &str) -> bool {
        self.contains(key).await
    }

    async fn sweep_expired(&self) -> usize {
        match self.purge_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("cache sweep failed: {}", e);
                0
            }
        }
    }

    async fn stats(&self) -> CacheStats {
        CacheStats::Single(self.snapshot().await)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}

fn is_record_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(CACHE_FILE_EXTENSION)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.contains(".tmp."))
        .unwrap_or(false)
}

/// 校验和正确的记录头部；不解码值。
async fn read_verified(path: &Path) -> Result<RecordHeader, StorageError> {
    let bytes = fs::read(path).await?;
    verify_record(&bytes)
}
