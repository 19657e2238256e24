use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, timeout};
use wirebox::sync::{LockError, ReentrantAsyncLock};

#[tokio::test]
async fn reentrant_acquisition_does_not_block() {
    let lock = ReentrantAsyncLock::new();

    let outer = lock.acquire().await;
    let inner = lock.acquire().await;
    assert!(lock.is_owner());
    assert!(lock.is_locked());
    assert_eq!(lock.depth(), 2);

    drop(inner);
    assert!(lock.is_locked());
    drop(outer);
    assert!(!lock.is_locked());
    assert_eq!(lock.depth(), 0);
}

#[tokio::test]
async fn lock_provides_mutual_exclusion() {
    let lock = Arc::new(ReentrantAsyncLock::new());
    let active = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let lock = lock.clone();
        let active = active.clone();
        let peak = peak.clone();
        handles.push(tokio::spawn(async move {
            let _guard = lock.acquire().await;
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(2)).await;
            active.fetch_sub(1, Ordering::SeqCst);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(!lock.is_locked());
    assert_eq!(lock.waiter_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn waiters_acquire_in_fifo_order() {
    let lock = Arc::new(ReentrantAsyncLock::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    // Holder keeps the lock while the waiters line up.
    let holder = {
        let lock = lock.clone();
        tokio::spawn(async move {
            let _guard = lock.acquire().await;
            sleep(Duration::from_millis(100)).await;
        })
    };

    sleep(Duration::from_millis(5)).await;

    let mut handles = Vec::new();
    for i in 0..5u32 {
        let lock = lock.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            // Staggered arrival times pin the queue order.
            sleep(Duration::from_millis(u64::from(i) * 5)).await;
            let _guard = lock.acquire().await;
            order.lock().unwrap().push(i);
        }));
    }

    holder.await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_is_skipped() {
    let lock = Arc::new(ReentrantAsyncLock::new());
    let acquired = Arc::new(AtomicU32::new(0));

    let holder = {
        let lock = lock.clone();
        tokio::spawn(async move {
            let _guard = lock.acquire().await;
            sleep(Duration::from_millis(50)).await;
        })
    };

    sleep(Duration::from_millis(5)).await;

    let doomed = {
        let lock = lock.clone();
        tokio::spawn(async move {
            let _guard = lock.acquire().await;
            unreachable!("cancelled waiter must never acquire");
        })
    };

    let survivor = {
        let lock = lock.clone();
        let acquired = acquired.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(5)).await;
            let _guard = lock.acquire().await;
            acquired.fetch_add(1, Ordering::SeqCst);
        })
    };

    sleep(Duration::from_millis(10)).await;
    assert_eq!(lock.waiter_count(), 2);
    doomed.abort();
    let _ = doomed.await;

    holder.await.unwrap();
    survivor.await.unwrap();

    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert!(!lock.is_locked());
    assert_eq!(lock.waiter_count(), 0);
}

#[tokio::test]
async fn releasing_an_unheld_lock_fails() {
    let lock = ReentrantAsyncLock::new();
    assert_eq!(lock.release(), Err(LockError::UnownedRelease));
    assert_eq!(
        LockError::UnownedRelease.to_string(),
        "Cannot release un-acquired lock."
    );
}

#[tokio::test]
async fn releasing_a_foreign_lock_fails() {
    let lock = Arc::new(ReentrantAsyncLock::new());
    let (held_tx, held_rx) = tokio::sync::oneshot::channel();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    let owner = {
        let lock = lock.clone();
        tokio::spawn(async move {
            lock.acquire().await.forget();
            held_tx.send(()).unwrap();
            done_rx.await.unwrap();
            lock.release().unwrap();
        })
    };

    held_rx.await.unwrap();
    assert_eq!(lock.release(), Err(LockError::ForeignRelease));
    assert_eq!(
        LockError::ForeignRelease.to_string(),
        "Cannot release foreign lock."
    );

    done_tx.send(()).unwrap();
    owner.await.unwrap();
    assert!(!lock.is_locked());
}

#[tokio::test]
async fn handover_assigns_ownership_before_waking() {
    let lock = Arc::new(ReentrantAsyncLock::new());

    let first = lock.acquire().await;

    let second = {
        let lock = lock.clone();
        tokio::spawn(async move {
            let _guard = lock.acquire().await;
            assert!(lock.is_owner());
        })
    };

    // Give the waiter time to enqueue, then release; a late arrival must
    // queue behind it rather than steal the lock.
    sleep(Duration::from_millis(5)).await;
    assert_eq!(lock.waiter_count(), 1);
    drop(first);

    assert!(timeout(Duration::from_secs(1), second).await.is_ok());
    assert!(!lock.is_locked());
}

#[tokio::test]
async fn stress_many_tasks_count_correctly() {
    let lock = Arc::new(ReentrantAsyncLock::new());
    let counter = Arc::new(Mutex::new(0u64));

    let mut handles = Vec::new();
    for _ in 0..50 {
        let lock = lock.clone();
        let counter = counter.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                let _guard = lock.acquire().await;
                let mut value = counter.lock().unwrap();
                *value += 1;
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*counter.lock().unwrap(), 1000);
    assert!(!lock.is_locked());
    assert_eq!(lock.waiter_count(), 0);
}
