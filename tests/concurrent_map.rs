use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use wirebox::sync::AsyncConcurrentMap;
use wirebox::DiResult;

#[tokio::test]
async fn get_or_add_computes_and_stores() {
    let map: AsyncConcurrentMap<u32, String> = AsyncConcurrentMap::new();

    assert!(map.get(&1).is_none());

    let value = map
        .get_or_add(1, |key| async move { Ok(format!("value-{}", key)) })
        .await
        .unwrap();
    assert_eq!(value, "value-1");
    assert_eq!(map.get(&1), Some("value-1".to_string()));

    // A second call observes the stored value without recomputing.
    let value = map
        .get_or_add(1, |_| async move { Ok("other".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "value-1");
}

#[tokio::test]
async fn first_insertion_wins_under_contention() {
    let map: Arc<AsyncConcurrentMap<&'static str, u32>> = Arc::new(AsyncConcurrentMap::new());
    let attempts = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let map = map.clone();
        let attempts = attempts.clone();
        handles.push(tokio::spawn(async move {
            map.get_or_add("shared", |_| async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(2)).await;
                Ok(i)
            })
            .await
            .unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    // The factory may have raced, but everyone observes one winner.
    let stored = map.get(&"shared").unwrap();
    assert!(results.iter().all(|result| *result == stored));
    assert!(attempts.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn upsert_and_remove_mutate_under_the_lock() {
    let map: AsyncConcurrentMap<&'static str, u32> = AsyncConcurrentMap::new();

    map.upsert("a", 1).await;
    map.upsert("a", 2).await;
    assert_eq!(map.get(&"a"), Some(2));

    map.try_remove(&"a").await;
    assert!(map.get(&"a").is_none());

    // Removing a missing key is a no-op.
    map.try_remove(&"a").await;
}

#[tokio::test]
async fn factory_may_reenter_the_map() {
    let map: Arc<AsyncConcurrentMap<u32, u32>> = Arc::new(AsyncConcurrentMap::new());

    let inner_map = map.clone();
    let value = map
        .get_or_add(1, |_| async move {
            // The compute step runs outside the lock, so nested operations
            // on the same map make progress.
            inner_map.upsert(2, 20).await;
            let nested = inner_map.get_or_add(3, |_| async move { Ok(30) }).await?;
            Ok(nested + 1)
        })
        .await
        .unwrap();

    assert_eq!(value, 31);
    assert_eq!(map.get(&2), Some(20));
    assert_eq!(map.get(&3), Some(30));
}

#[tokio::test]
async fn factory_errors_are_not_cached() {
    let map: AsyncConcurrentMap<u32, u32> = AsyncConcurrentMap::new();

    let failed: DiResult<u32> = map
        .get_or_add(7, |_| async move {
            Err(wirebox::DiError::DisposalFailed("boom".to_string()))
        })
        .await;
    assert!(failed.is_err());
    assert!(map.get(&7).is_none());

    let value = map.get_or_add(7, |_| async move { Ok(70) }).await.unwrap();
    assert_eq!(value, 70);
}
