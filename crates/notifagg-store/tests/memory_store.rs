// Concurrency tests for the in-memory bucket store
//
// Several tasks hammer the same keys from a multi-threaded runtime to check
// that the single-key primitives stay atomic.

use futures::future::join_all;
use notifagg_store::{BucketStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn set_if_absent_has_exactly_one_winner() {
    for round in 0..20 {
        let store = Arc::new(MemoryStore::new());
        let tasks = (0..16).map(|worker| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .set_if_absent("lock", &format!("worker-{worker}"), Duration::from_secs(60))
                    .await
                    .unwrap()
            })
        });

        let winners = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1, "round {round} had {winners} lock holders");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_set_adds_keep_members_unique() {
    let store = Arc::new(MemoryStore::new());
    let tasks = (0..64).map(|i| {
        let store = Arc::clone(&store);
        // Four distinct members, each added sixteen times
        tokio::spawn(async move { store.set_add("actors", &format!("a{}", i % 4)).await })
    });
    let newly_added = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|added| *added)
        .count();

    assert_eq!(newly_added, 4);
    assert_eq!(store.set_card("actors").await.unwrap(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_hash_incr_is_atomic() {
    let store = Arc::new(MemoryStore::new());
    let tasks = (0..100).map(|_| {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.hash_incr("meta", "overflow", 1).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }
    assert_eq!(
        store.hash_get("meta", "overflow").await.unwrap().as_deref(),
        Some("100")
    );
}
