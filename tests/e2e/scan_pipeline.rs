//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 分批读取目标列表，每批通过执行器并发执行带限流和缓存的查询。

use crate::common::*;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tierguard::batch::BatchReader;
use tierguard::cache::cache_key;
use tierguard::config::{BackendKind, Settings};
use tierguard::context::ServiceContext;
use tierguard::error::TierGuardError;

fn target_list(count: usize, unreachable_every: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..count {
        if i % unreachable_every == 0 {
            writeln!(file, "unreachable-{}.example", i).unwrap();
        } else {
            writeln!(file, "host-{}.example", i).unwrap();
        }
        if i % 10 == 0 {
            // 多余的空行会被跳过
            writeln!(file).unwrap();
        }
    }
    file.flush().unwrap();
    file
}

async fn lookup(target: String) -> Result<ScanResult, String> {
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    if target.starts_with("unreachable") {
        Err(format!("{}: connection refused", target))
    } else {
        Ok(scan_result(&target, &[80]))
    }
}

async fn scan(
    ctx: &ServiceContext<ScanResult>,
    path: &Path,
    lookups: &Arc<AtomicUsize>,
) -> (usize, usize) {
    let mut reader = BatchReader::open(path, 8).await.unwrap();
    let (mut ok, mut failed) = (0, 0);

    while let Some(batch) = reader.next_batch().await.unwrap() {
        let tasks: Vec<_> = batch
            .into_iter()
            .map(|target| {
                let ctx = ctx.clone();
                let lookups = Arc::clone(lookups);
                async move {
                    let key = cache_key(&["scan", target.as_str()]);
                    ctx.cache()
                        .get_or_compute(&key, None, || async {
                            lookups.fetch_add(1, Ordering::SeqCst);
                            ctx.call(lookup(target.clone()))
                                .await
                                .map_err(|e| e.to_string())?
                        })
                        .await
                }
            })
            .collect();

        for result in ctx.executor().run_all(tasks).await {
            match result {
                Ok(_) => ok += 1,
                Err(TierGuardError::TaskFailure(_)) => failed += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    (ok, failed)
}

#[tokio::test]
async fn test_pipeline_isolates_failures_and_caches_successes() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let targets = target_list(40, 7);

    let mut settings = Settings::default();
    settings.cache = cache_settings(dir.path(), BackendKind::Hybrid);
    settings.performance.max_workers = 4;
    settings.performance.connection_pool_size = 2;
    settings.performance.rate_limit_calls_per_period = Some(1000);
    settings.performance.rate_limit_period_secs = 1;
    let ctx = ServiceContext::<ScanResult>::from_settings(settings).unwrap();
    let lookups = Arc::new(AtomicUsize::new(0));

    // 0、7、14、21、28、35 不可达
    let (ok, failed) = scan(&ctx, targets.path(), &lookups).await;
    assert_eq!((ok, failed), (34, 6));
    assert_eq!(lookups.load(Ordering::SeqCst), 40);

    let executor = ctx.executor().stats();
    assert!(executor.peak_active <= 4);
    assert_eq!(executor.active, 0);
    assert!(ctx.pool().stats().peak_active <= 2);

    // 成功结果被缓存，失败的会重试
    let (ok, failed) = scan(&ctx, targets.path(), &lookups).await;
    assert_eq!((ok, failed), (34, 6));
    assert_eq!(lookups.load(Ordering::SeqCst), 46);
    assert_eq!(ctx.cache().stats().await.size(), 34);
}
