//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 批量行读取器
//!
//! 以固定大小的批次惰性读取按行组织的输入（字典、目标列表）。
//! 每行会去除首尾空白并跳过空行；无效 UTF-8 会被替换而不是拒绝。
//! 读取器是有限的，不能回退。

use crate::constants::DEFAULT_BATCH_SIZE;
use crate::error::TierGuardError;
use futures::stream::{self, Stream};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

/// 非空行批次的游标
pub struct BatchReader<R> {
    reader: R,
    batch_size: usize,
    buf: Vec<u8>,
    lines_read: u64,
    finished: bool,
}

impl BatchReader<BufReader<File>> {
    /// 打开 `path` 进行批量读取。`batch_size` 为 0 时使用默认值。
    pub async fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self, TierGuardError> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        debug!("reading {} in batches of {}", path.display(), batch_size);
        Ok(Self::from_reader(BufReader::new(file), batch_size))
    }
}

impl<R: AsyncBufRead + Unpin> BatchReader<R> {
    pub fn from_reader(reader: R, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };

        Self {
            reader,
            batch_size,
            buf: Vec::new(),
            lines_read: 0,
            finished: false,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 目前已返回的非空行数。
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 下一批；输入读完后返回 `None`。只有最后一批可能少于
    /// `batch_size` 行。
    pub async fn next_batch(&mut self) -> Result<Option<Vec<String>>, TierGuardError> {
        if self.finished {
            return Ok(None);
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                self.finished = true;
                break;
            }

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim();
            if !line.is_empty() {
                batch.push(line.to_string());
            }
        }

        self.lines_read += batch.len() as u64;
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    /// 将读取器转换为批次流。遇到第一个错误后流结束。
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<String>, TierGuardError>> {
        stream::unfold(Some(self), |state| async move {
            let mut reader = state?;
            match reader.next_batch().await {
                Ok(Some(batch)) => Some((Ok(batch), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
