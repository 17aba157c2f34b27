//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 磁盘记录格式
//!
//! 每条持久化条目由固定 32 字节的小端头部和完整 [`CacheEntry`] 的
//! bincode 编码组成：
//!
//! | 偏移   | 大小 | 字段                                   |
//! |--------|------|----------------------------------------|
//! | 0      | 4    | 魔数 `0x54475243`                      |
//! | 4      | 2    | 格式版本                               |
//! | 6      | 2    | 标志位（bit 0：有过期时间）            |
//! | 8      | 8    | 过期时间，unix 微秒（无过期时为 0）    |
//! | 16     | 8    | 载荷长度                               |
//! | 24     | 4    | 载荷 CRC32C                            |
//! | 28     | 4    | 字节 0..28 的 CRC32C                   |
//!
//! 仅凭头部即可判断是否过期；清理和统计还会校验载荷校验和，但从不解码值。
//! 过期时间向上取整到微秒，因此头部判定过期的时间不会早于其承载的条目。

use crate::cache::entry::CacheEntry;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use crc32c::crc32c;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// 记录文件魔数："TGRC"
pub const RECORD_MAGIC: u32 = 0x5447_5243;

/// 当前记录格式版本
pub const RECORD_VERSION: u16 = 2;

/// 固定头部大小
pub const HEADER_LEN: usize = 32;

const FLAG_HAS_EXPIRY: u16 = 1 << 0;

/// 解码后的记录头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u16,
    pub flags: u16,
    /// 过期时间（unix 微秒）；仅在设置过期标志时有效
    pub expires_at_micros: i64,
    pub payload_len: u64,
    pub payload_crc: u32,
}

impl RecordHeader {
    fn new(expires_at: Option<DateTime<Utc>>, payload: &[u8]) -> Self {
        let (flags, expires_at_micros) = match expires_at {
            Some(expires_at) => (FLAG_HAS_EXPIRY, micros_ceil(expires_at)),
            None => (0, 0),
        };

        Self {
            version: RECORD_VERSION,
            flags,
            expires_at_micros,
            payload_len: payload.len() as u64,
            payload_crc: crc32c(payload),
        }
    }

    pub fn has_expiry(&self) -> bool {
        self.flags & FLAG_HAS_EXPIRY != 0
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if !self.has_expiry() {
            return None;
        }
        Some(
            DateTime::<Utc>::from_timestamp_micros(self.expires_at_micros)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    /// 与 [`CacheEntry::is_expired_at`] 规则相同，精度为微秒。
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.has_expiry() && now.timestamp_micros() >= self.expires_at_micros
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.expires_at_micros.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.payload_crc.to_le_bytes());
        let header_crc = crc32c(&bytes[0..28]);
        bytes[28..32].copy_from_slice(&header_crc.to_le_bytes());
        bytes
    }

    /// 解析并校验 `bytes` 开头的头部。
    pub fn parse(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < HEADER_LEN {
            return Err(StorageError::Corrupted(format!(
                "record too short: {} bytes",
                bytes.len()
            )));
        }

        let magic = u32::from_le_bytes(field(bytes, 0));
        if magic != RECORD_MAGIC {
            return Err(StorageError::Corrupted(format!(
                "invalid magic number: expected {:08x}, got {:08x}",
                RECORD_MAGIC, magic
            )));
        }

        let version = u16::from_le_bytes(field(bytes, 4));
        if version != RECORD_VERSION {
            return Err(StorageError::Corrupted(format!(
                "unsupported record version: {}",
                version
            )));
        }

        let expected_crc = crc32c(&bytes[0..28]);
        let header_crc = u32::from_le_bytes(field(bytes, 28));
        if header_crc != expected_crc {
            return Err(StorageError::Corrupted(format!(
                "header crc mismatch: expected {:08x}, got {:08x}",
                expected_crc, header_crc
            )));
        }

        Ok(Self {
            version,
            flags: u16::from_le_bytes(field(bytes, 6)),
            expires_at_micros: i64::from_le_bytes(field(bytes, 8)),
            payload_len: u64::from_le_bytes(field(bytes, 16)),
            payload_crc: u32::from_le_bytes(field(bytes, 24)),
        })
    }
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// 将条目编码为头部 + 载荷。
pub fn encode_record<V: Serialize>(entry: &CacheEntry<V>) -> Result<Vec<u8>, StorageError> {
    let payload = bincode::serialize(entry)?;
    let header = RecordHeader::new(entry.expires_at, &payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// 解码完整记录，校验两个校验和。
pub fn decode_record<V: DeserializeOwned>(bytes: &[u8]) -> Result<CacheEntry<V>, StorageError> {
    verify_record(bytes)?;
    bincode::deserialize(&bytes[HEADER_LEN..])
        .map_err(|e| StorageError::Corrupted(format!("payload decode failed: {}", e)))
}

/// 校验两个校验和及载荷长度，不解码值。
pub fn verify_record(bytes: &[u8]) -> Result<RecordHeader, StorageError> {
    let header = RecordHeader::parse(bytes)?;
    let payload = &bytes[HEADER_LEN..];

    if payload.len() as u64 != header.payload_len {
        return Err(StorageError::Corrupted(format!(
            "payload length mismatch: header says {}, found {}",
            header.payload_len,
            payload.len()
        )));
    }

    let payload_crc = crc32c(payload);
    if payload_crc != header.payload_crc {
        return Err(StorageError::Corrupted(format!(
            "payload crc mismatch: expected {:08x}, got {:08x}",
            header.payload_crc, payload_crc
        )));
    }

    Ok(header)
}

fn micros_ceil(at: DateTime<Utc>) -> i64 {
    let micros = at.timestamp_micros();
    if at.timestamp_subsec_nanos() % 1_000 == 0 {
        micros
    } else {
        micros.saturating_add(1)
    }
}
