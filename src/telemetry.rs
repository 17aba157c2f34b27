//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 监控和追踪模块
//!
//! 可选的 `tracing-subscriber` 初始化，供二进制程序使用。库本身只产生事件；
//! 除非调用 [`init_logging`]，否则不会安装任何订阅者。

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 安装按 `RUST_LOG` 过滤的格式化订阅者；未设置时回退到
/// `default_directive`（如 `"tierguard=info"`）。
///
/// 已安装全局订阅者或指令无效时返回错误。
pub fn init_logging(default_directive: &str) -> Result<(), String> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| format!("invalid log directive {:?}: {}", default_directive, e))?,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_level(true)
                .with_target(true)
                .with_thread_ids(true),
        )
        .with(filter)
        .try_init()
        .map_err(|e| format!("failed to install tracing subscriber: {}", e))
}
