//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 执行器与连接池集成测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tierguard::error::TierGuardError;
use tierguard::executor::{BoundedExecutor, PermitGate};
use tierguard::pool::ConnectionPool;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_isolation_under_multi_thread_runtime() {
    let executor = BoundedExecutor::new(3);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..10usize)
        .map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);

                if i == 3 {
                    Err("connection refused")
                } else {
                    Ok(i * 10)
                }
            }
        })
        .collect();

    let results = executor.run_all(tasks).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 9);
    assert!(matches!(results[3], Err(TierGuardError::TaskFailure(_))));
    assert_eq!(results[9].as_ref().unwrap(), &90);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(executor.stats().peak_active <= 3);
}

#[tokio::test]
async fn test_empty_batch() {
    let executor = BoundedExecutor::new(2);
    let tasks: Vec<std::future::Ready<Result<u32, String>>> = Vec::new();

    assert!(executor.run_all(tasks).await.is_empty());
    assert_eq!(executor.stats().total_acquired, 0);
}

#[tokio::test]
async fn test_executor_and_pool_share_nothing() {
    let executor = BoundedExecutor::new(1);
    let pool = ConnectionPool::new(1);

    let _permit = executor.acquire().await.unwrap();
    // 持有执行器许可不会阻塞连接池
    let slot = pool.try_acquire();
    assert!(slot.is_some());
}

#[tokio::test]
async fn test_permit_released_when_task_panics() {
    let gate = PermitGate::new(1);
    let task_gate = gate.clone();

    let handle = tokio::spawn(async move {
        let _permit = task_gate.acquire().await.unwrap();
        panic!("task failed while holding a permit");
    });
    assert!(handle.await.is_err());

    let stats = gate.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.available, 1);
    assert!(gate.try_acquire().is_some());
}

#[tokio::test]
async fn test_pool_waiters_proceed_in_turn() {
    let pool = ConnectionPool::new(1).with_acquire_timeout(Duration::from_secs(5));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let held = pool.acquire().await.unwrap();
    let mut handles = vec![];
    for i in 0..3 {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let _slot = pool.acquire().await.unwrap();
            order.lock().push(i);
        }));
        tokio::task::yield_now().await;
    }

    drop(held);
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock(), vec![0, 1, 2]);
    assert_eq!(pool.stats().total_acquired, 4);
}
