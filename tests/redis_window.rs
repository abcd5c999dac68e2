//! 需要真实 Redis：`REDIS_URL=redis://127.0.0.1:6379/0 cargo test -- --ignored`

use std::sync::Arc;

use futures_util::future::join_all;
use throttle_cache::{
    RateLimit, RateLimiter,
    cache::keys::rate_limit_key,
    clock::SystemClock,
    store::{AtomicCounterStore, RedisStore},
};

fn redis_store() -> Option<Arc<RedisStore>> {
    let url = std::env::var("REDIS_URL").ok()?;
    let namespace = format!("throttle_test_{}_", uuid::Uuid::new_v4().simple());
    Some(Arc::new(RedisStore::open(&url, namespace).unwrap()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_redis_concurrent_admissions_admit_exactly_the_limit() {
    const LIMIT: u32 = 7;
    const CALLERS: usize = 50;

    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    let limiter = RateLimiter::new(store.clone(), Arc::new(SystemClock));
    let limit = RateLimit::per_secs(LIMIT, 60).unwrap();
    let key = rate_limit_key("203.0.113.7", "login");

    let tasks = (0..CALLERS).map(|_| {
        let limiter = limiter.clone();
        let key = key.clone();
        tokio::spawn(async move { limiter.admit(&key, &limit).await })
    });
    let decisions: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let admitted = decisions.iter().filter(|d| d.admitted).count();
    assert_eq!(admitted, LIMIT as usize);
    assert!(decisions.iter().all(|d| d.limit == LIMIT));

    // 每次请求都写入窗口，被拒绝的也算
    let windows = store.scan_prefix("rate_limit:").await.unwrap();
    assert_eq!(windows, vec![key.as_str().to_string()]);
    store.delete(&windows).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_redis_window_round_trip() {
    let Some(store) = redis_store() else {
        eprintln!("REDIS_URL not set, skipping");
        return;
    };
    store.ping().await.unwrap();

    let limiter = RateLimiter::new(store.clone(), Arc::new(SystemClock));
    let limit = RateLimit::per_secs(2, 60).unwrap();
    let key = rate_limit_key("10.0.0.1", "search");

    let remaining: Vec<_> = [
        limiter.admit(&key, &limit).await,
        limiter.admit(&key, &limit).await,
        limiter.admit(&key, &limit).await,
    ]
    .iter()
    .map(|d| (d.admitted, d.remaining))
    .collect();
    assert_eq!(remaining, vec![(true, 1), (true, 0), (false, 0)]);

    store.delete(&[key.as_str().to_string()]).await.unwrap();
}
