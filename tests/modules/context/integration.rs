//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 服务上下文集成测试

use crate::common::*;
use tempfile::TempDir;
use tierguard::config::{BackendKind, Settings};
use tierguard::context::ServiceContext;
use tierguard::error::TierGuardError;

fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.cache = cache_settings(dir.path(), BackendKind::Hybrid);
    settings.performance.max_workers = 2;
    settings
}

#[tokio::test]
async fn test_clones_share_components() {
    let dir = TempDir::new().unwrap();
    let ctx = ServiceContext::<ScanResult>::from_settings(settings(&dir)).unwrap();
    let other = ctx.clone();

    ctx.cache()
        .set("scan:a", scan_result("a", &[22]), None)
        .await
        .unwrap();
    assert_eq!(
        other.cache().get("scan:a").await,
        Some(scan_result("a", &[22]))
    );

    let _permit = ctx.executor().acquire().await.unwrap();
    assert_eq!(other.executor().stats().active, 1);
}

#[tokio::test]
async fn test_disabled_caching_from_settings() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(&dir);
    settings.cache.enabled = false;

    let ctx = ServiceContext::<u32>::from_settings(settings).unwrap();
    assert!(!ctx.cache().is_enabled());

    ctx.cache().set("k", 1, None).await.unwrap();
    assert_eq!(ctx.cache().get("k").await, None);

    ctx.cache().set_enabled(true);
    assert_eq!(ctx.cache().get("k").await, None);
}

#[tokio::test]
async fn test_monitor_report_covers_cache_and_executor() {
    let dir = TempDir::new().unwrap();
    let ctx = ServiceContext::<u32>::from_settings(settings(&dir)).unwrap();

    for _ in 0..3 {
        ctx.cache()
            .get_or_compute("dns:example.com", None, || async {
                Ok::<_, TierGuardError>(1)
            })
            .await
            .unwrap();
    }
    let tasks: Vec<_> = (0..2).map(|_| async { Ok::<_, String>(()) }).collect();
    ctx.executor().run_all(tasks).await;

    let metrics = ctx.monitor().metrics(Some("dns"));
    let dns = &metrics[0];
    assert_eq!(dns.count, 3);
    assert_eq!(dns.cache_hits, 2);
    assert_eq!(dns.cache_misses, 1);

    let report = ctx.monitor().report();
    assert!(report.contains("dns"));
    assert!(report.contains("executor"));
}
