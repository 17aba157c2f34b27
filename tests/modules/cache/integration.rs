//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 缓存集成测试

use crate::common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tierguard::cache::{
    CacheBackend, CacheManager, CacheStats, EvictionPolicy, HybridCache, HybridCacheConfig,
    MemoryBackend, MemoryBackendConfig, PersistentBackend,
};
use tierguard::config::BackendKind;
use tierguard::error::TierGuardError;

fn backends(dir: &TempDir) -> Vec<Arc<dyn CacheBackend<ScanResult>>> {
    vec![
        Arc::new(MemoryBackend::<ScanResult>::new(100)),
        Arc::new(PersistentBackend::<ScanResult>::open(dir.path().join("file")).unwrap()),
        Arc::new(
            HybridCache::<ScanResult>::new(HybridCacheConfig::new(dir.path().join("hybrid")))
                .unwrap(),
        ),
    ]
}

#[tokio::test]
async fn test_round_trip_all_backends() {
    init_test_logging();
    let dir = TempDir::new().unwrap();

    for backend in backends(&dir) {
        let value = scan_result("10.0.0.1", &[22, 80, 443]);
        backend.set("scan:10.0.0.1", value.clone(), None).await.unwrap();
        assert_eq!(backend.get("scan:10.0.0.1").await, Some(value), "{}", backend.kind());
    }
}

#[tokio::test]
async fn test_ttl_boundaries_all_backends() {
    let dir = TempDir::new().unwrap();

    for backend in backends(&dir) {
        let value = scan_result("host", &[80]);
        backend
            .set("short", value.clone(), Some(Duration::from_millis(300)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.get("short").await, Some(value), "{}", backend.kind());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(backend.get("short").await, None, "{}", backend.kind());
    }
}

#[tokio::test]
async fn test_lru_evicts_least_recently_accessed() {
    let cache = MemoryBackend::<u32>::new(3);
    cache.set("a", 1, None).await.unwrap();
    cache.set("b", 2, None).await.unwrap();
    cache.set("c", 3, None).await.unwrap();

    // 访问 "a"，使 "b" 成为最久未使用的条目
    assert_eq!(cache.get("a").await, Some(1));
    cache.set("d", 4, None).await.unwrap();

    assert!(cache.exists("a").await);
    assert!(!cache.exists("b").await);
    assert!(cache.exists("c").await);
    assert!(cache.exists("d").await);
    assert_eq!(cache.counters().evictions(), 1);
}

#[tokio::test]
async fn test_reject_policy_reports_capacity_exceeded() {
    let cache = MemoryBackend::<u32>::with_config(
        MemoryBackendConfig::new()
            .capacity(1)
            .eviction_policy(EvictionPolicy::Reject),
    );

    cache.set("a", 1, None).await.unwrap();
    let result = cache.set("b", 2, None).await;

    assert!(matches!(result, Err(TierGuardError::CapacityExceeded(_))));
    assert_eq!(cache.get("a").await, Some(1));
}

#[tokio::test]
async fn test_hybrid_promotion_serves_from_l1() {
    let dir = TempDir::new().unwrap();
    let cache = HybridCache::<u32>::new(HybridCacheConfig::new(dir.path())).unwrap();

    cache.set("k", 7, None).await.unwrap();
    cache.l1().remove("k");

    assert_eq!(cache.get("k").await, Some(7));
    assert_eq!(cache.counters().l2_hits(), 1);
    assert_eq!(cache.counters().promotions(), 1);

    let l2_hits_before = cache.l2().counters().hits();
    assert_eq!(cache.get("k").await, Some(7));
    assert_eq!(cache.counters().l1_hits(), 1);
    assert_eq!(cache.l2().counters().hits(), l2_hits_before);
}

#[tokio::test]
async fn test_concurrent_distinct_keys() {
    let dir = TempDir::new().unwrap();

    for backend in backends(&dir) {
        let mut handles = vec![];
        for i in 0..50 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                let key = format!("host-{}", i);
                let value = scan_result(&key, &[i as u16]);
                backend.set(&key, value.clone(), None).await.unwrap();
                assert_eq!(backend.get(&key).await, Some(value));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(backend.stats().await.size(), 50, "{}", backend.kind());
    }
}

#[tokio::test]
async fn test_persistent_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let value = scan_result("192.168.1.1", &[21, 22]);

    {
        let cache = PersistentBackend::<ScanResult>::open(dir.path()).unwrap();
        cache.set("scan:192.168.1.1", value.clone(), None).await.unwrap();
    }

    let reopened = PersistentBackend::<ScanResult>::open(dir.path()).unwrap();
    assert_eq!(reopened.get("scan:192.168.1.1").await, Some(value));
}

#[tokio::test]
async fn test_corrupt_file_is_a_miss_and_removed() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let cache = PersistentBackend::<u32>::open(dir.path()).unwrap();

    cache.set("k", 1, None).await.unwrap();
    let path = cache.path_for("k");
    std::fs::write(&path, b"definitely not a cache record").unwrap();

    assert_eq!(cache.get("k").await, None);
    assert!(!path.exists());
    assert_eq!(cache.counters().corruptions(), 1);
}

#[tokio::test]
async fn test_stats_report_and_json() {
    let dir = TempDir::new().unwrap();
    let cache = HybridCache::<u32>::new(HybridCacheConfig::new(dir.path())).unwrap();

    cache.set("a", 1, None).await.unwrap();
    cache.get("a").await;
    cache.get("missing").await;

    let stats = cache.stats().await;
    assert_eq!(stats.backend(), BackendKind::Hybrid);
    assert_eq!(stats.hits(), 1);
    assert_eq!(stats.misses(), 1);
    assert_eq!(stats.hit_rate(), 0.5);

    let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
    assert_eq!(json["kind"], "hybrid");
    assert_eq!(json["l1_hits"], 1);
    assert!(json["l2"]["disk_bytes"].as_u64().unwrap() > 0);

    match stats {
        CacheStats::Hybrid(hybrid) => assert_eq!(hybrid.l2.size, 1),
        CacheStats::Single(_) => panic!("expected hybrid stats"),
    }
}

#[tokio::test]
async fn test_manager_from_settings_per_backend() {
    let dir = TempDir::new().unwrap();

    for kind in [BackendKind::Memory, BackendKind::File, BackendKind::Hybrid] {
        let settings = cache_settings(&dir.path().join(kind.to_string()), kind);
        let manager = CacheManager::<ScanResult>::from_settings(&settings).unwrap();
        assert_eq!(manager.kind(), kind);

        let value = scan_result("a", &[1]);
        manager.set("k", value.clone(), None).await.unwrap();
        assert_eq!(manager.get("k").await, Some(value));
    }
}

#[tokio::test]
async fn test_get_or_compute_computes_once() {
    let backend = Arc::new(RecordingBackend::<u32>::new());
    let manager = CacheManager::<u32>::new(backend.clone());
    let computed = AtomicUsize::new(0);

    for _ in 0..3 {
        let value = manager
            .get_or_compute("whois:example.com", None, || async {
                computed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TierGuardError>(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    assert_eq!(computed.load(Ordering::SeqCst), 1);
    assert_eq!(backend.sets(), 1);
}

#[tokio::test]
async fn test_get_or_compute_producer_error_not_cached() {
    let backend = Arc::new(RecordingBackend::<u32>::new());
    let manager = CacheManager::<u32>::new(backend.clone());

    let result = manager
        .get_or_compute("k", None, || async { Err::<u32, _>("lookup failed") })
        .await;

    assert_eq!(result, Err("lookup failed"));
    assert_eq!(backend.sets(), 0);
    assert!(!manager.exists("k").await);
}

#[tokio::test]
async fn test_get_or_compute_write_failure_still_returns_value() {
    init_test_logging();
    let backend = Arc::new(RecordingBackend::<u32>::failing_writes());
    let manager = CacheManager::<u32>::new(backend.clone());

    let value = manager
        .get_or_compute("k", None, || async { Ok::<_, TierGuardError>(9) })
        .await
        .unwrap();

    assert_eq!(value, 9);
    assert_eq!(backend.sets(), 1);
}

#[tokio::test]
async fn test_disabled_cache_passthrough() {
    let backend = Arc::new(RecordingBackend::<u32>::new());
    let manager = CacheManager::<u32>::new(backend.clone());
    manager.set_enabled(false);
    let computed = AtomicUsize::new(0);

    for _ in 0..3 {
        manager
            .get_or_compute("k", None, || async {
                computed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TierGuardError>(1)
            })
            .await
            .unwrap();
    }

    assert_eq!(computed.load(Ordering::SeqCst), 3);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_get_or_compute_single_flight() {
    let backend = Arc::new(RecordingBackend::<u32>::new());
    let manager = Arc::new(CacheManager::<u32>::new(backend.clone()));
    let computed = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for _ in 0..10 {
        let manager = Arc::clone(&manager);
        let computed = Arc::clone(&computed);
        handles.push(tokio::spawn(async move {
            manager
                .get_or_compute("slow", None, || async move {
                    computed.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, TierGuardError>(5)
                })
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 5);
    }
    assert_eq!(computed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cleanup_expired_and_batch_operations() {
    let manager = CacheManager::<u32>::new(Arc::new(MemoryBackend::<u32>::new(100)));

    manager
        .set_many(vec![
            ("a".to_string(), 1, None),
            ("b".to_string(), 2, Some(Duration::from_millis(20))),
            ("c".to_string(), 3, Some(Duration::from_millis(20))),
        ])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(manager.cleanup_expired().await, 2);

    let found = manager.get_many(&["a", "b", "missing"]).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found.get("a"), Some(&1));
}
