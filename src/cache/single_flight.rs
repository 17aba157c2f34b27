//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 单飞协调
//!
//! 同一键上的并发未命中会被合并：第一个调用方成为 leader 并计算值，
//! 后续调用方作为 follower 等待结果。失败或被丢弃的 leader 不发布任何值；
//! 其 follower 收到 `None` 后自行计算。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// 按缓存键记录的进行中计算
pub struct SingleFlight<V> {
    flights: Arc<DashMap<String, watch::Receiver<Option<V>>>>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }
}

/// 调用方在一次计算中的角色
pub enum Flight<V> {
    Leader(FlightLeader<V>),
    Follower(FlightFollower<V>),
}

impl<V> SingleFlight<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入 `key` 的计算；若没有进行中的计算则发起一个。
    pub fn join(&self, key: &str) -> Flight<V> {
        match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                trace!("joining in-flight computation: {}", key);
                Flight::Follower(FlightFollower {
                    rx: entry.get().clone(),
                })
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(rx);
                Flight::Leader(FlightLeader {
                    flights: Arc::clone(&self.flights),
                    key: key.to_string(),
                    tx,
                })
            }
        }
    }

    /// 正在计算的键数量。
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

/// 计算的 leader；丢弃即结束本次计算。
pub struct FlightLeader<V> {
    flights: Arc<DashMap<String, watch::Receiver<Option<V>>>>,
    key: String,
    tx: watch::Sender<Option<V>>,
}

impl<V> FlightLeader<V> {
    /// 将计算出的值发布给所有 follower。
    pub fn complete(self, value: V) {
        let _ = self.tx.send(Some(value));
    }
}

impl<V> Drop for FlightLeader<V> {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}

/// 计算的 follower
pub struct FlightFollower<V> {
    rx: watch::Receiver<Option<V>>,
}

impl<V: Clone> FlightFollower<V> {
    /// 等待 leader。`None` 表示 leader 已放弃。
    pub async fn wait(mut self) -> Option<V> {
        loop {
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Some(value);
            }
            if self.rx.changed().await.is_err() {
                // leader 已丢弃，但可能在此之前已发布了值
                return self.rx.borrow().clone();
            }
        }
    }
}
