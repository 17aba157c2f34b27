//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 并发一致性检查
//!
//! 在并发负载下验证缓存、执行器、连接池和限流器，并报告观察结果。
//! 可以将配置文件（YAML、TOML 或 JSON）作为第一个参数传入以替代默认配置。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tierguard::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tierguard::telemetry::init_logging("tierguard=info,concurrency_check=info")?;

    let scratch = std::env::temp_dir().join(format!("tierguard-check-{}", uuid::Uuid::new_v4()));
    let mut settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if settings.cache.dir.is_none() {
        settings.cache.dir = Some(scratch.clone());
    }

    println!("=== Concurrency consistency check ===");
    let ctx: ServiceContext<String> = ServiceContext::from_settings(settings)?;

    check_cache(&ctx).await?;
    check_executor(&ctx).await?;
    check_pool(&ctx).await?;
    check_rate_limiter().await?;

    println!("\n--- Performance report ---");
    print!("{}", ctx.monitor().report());

    if scratch.exists() {
        std::fs::remove_dir_all(&scratch)?;
    }
    Ok(())
}

async fn check_cache(ctx: &ServiceContext<String>) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Cache: concurrent writers on distinct keys ---");

    let keys = 200;
    let computed = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(keys);

    for i in 0..keys {
        let cache = Arc::clone(ctx.cache());
        let computed = Arc::clone(&computed);
        handles.push(tokio::spawn(async move {
            let key = cache_key(&["check", i.to_string().as_str()]);
            cache
                .get_or_compute(&key, None, || async move {
                    computed.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, TierGuardError>(format!("value-{}", i))
                })
                .await
        }));
    }

    for handle in handles {
        handle.await??;
    }

    let mut lost = 0;
    for i in 0..keys {
        let key = cache_key(&["check", i.to_string().as_str()]);
        if ctx.cache().get(&key).await.as_deref() != Some(format!("value-{}", i).as_str()) {
            lost += 1;
        }
    }

    let stats = ctx.cache().stats().await;
    println!("producers run: {}", computed.load(Ordering::Relaxed));
    println!("lost updates:  {}", lost);
    println!("stats:         {}", stats);
    info!("cache check finished with {} lost updates", lost);
    Ok(())
}

async fn check_executor(ctx: &ServiceContext<String>) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Executor: partial failure isolation ---");

    let tasks: Vec<_> = (0..20u64)
        .map(|i| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if i % 7 == 3 {
                Err(format!("target {} unreachable", i))
            } else {
                Ok(i)
            }
        })
        .collect();

    let start = Instant::now();
    let results = ctx.executor().run_all(tasks).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    let stats = ctx.executor().stats();

    println!("tasks:       {}", results.len());
    println!("failed:      {}", failed);
    println!("peak active: {} / {}", stats.peak_active, stats.capacity);
    println!("elapsed:     {:?}", start.elapsed());
    Ok(())
}

async fn check_pool(ctx: &ServiceContext<String>) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Pool: slots held by concurrent calls ---");

    let calls = ctx.pool().size() * 2;
    let mut handles = Vec::with_capacity(calls);
    for _ in 0..calls {
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            ctx.call(tokio::time::sleep(Duration::from_millis(5))).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let stats = ctx.pool().stats();
    println!("calls:       {}", stats.total_acquired);
    println!("peak active: {} / {}", stats.peak_active, stats.size);
    println!("active now:  {}", stats.active);
    Ok(())
}

async fn check_rate_limiter() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n--- Rate limiter: 5 calls per 200ms ---");

    let limiter = Arc::new(RateLimiter::new(5, Duration::from_millis(200)));
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..20 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move { limiter.acquire().await }));
    }
    for handle in handles {
        handle.await??;
    }

    let stats = limiter.stats();
    println!("acquired: {}", stats.total_acquired);
    println!("delayed:  {}", stats.total_delayed);
    println!("elapsed:  {:?} (expected >= 600ms)", start.elapsed());
    Ok(())
}
