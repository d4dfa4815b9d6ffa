use super::*;
use crate::retrieval::Diagnostics;

fn payload(match_query: &str, fallback: bool) -> Retrieval {
    Retrieval {
        chunks: Vec::new(),
        diagnostics: Diagnostics {
            match_query: Some(match_query.to_string()),
            from_cache: false,
            fallback,
        },
    }
}

#[test]
fn key_depends_on_limit_and_query() {
    let key = RetrievalCache::key(6, "mensa*");

    assert_eq!(key.len(), 64);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(key, RetrievalCache::key(6, "mensa*"));
    assert_ne!(key, RetrievalCache::key(5, "mensa*"));
    assert_ne!(key, RetrievalCache::key(6, "mensa* OR preise*"));
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_ttl() {
    let cache = RetrievalCache::new(Duration::from_secs(300), 10);
    cache.insert("k".to_string(), payload("mensa*", false)).await;

    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(cache.get("k").await, Some(payload("mensa*", false)));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get("k").await, None);
    assert!(cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn oldest_entry_is_evicted_over_capacity() {
    let cache = RetrievalCache::new(Duration::from_secs(300), 2);

    for key in ["a", "b", "c"] {
        cache.insert(key.to_string(), payload(key, false)).await;
        tokio::time::advance(Duration::from_millis(10)).await;
    }

    assert_eq!(cache.len().await, 2);
    assert_eq!(cache.get("a").await, None);
    assert!(cache.get("b").await.is_some());
    assert!(cache.get("c").await.is_some());
}

#[tokio::test]
async fn clear_empties_cache() {
    let cache = RetrievalCache::default();
    cache.insert("k".to_string(), payload("mensa*", true)).await;
    assert_eq!(cache.len().await, 1);

    cache.clear().await;

    assert!(cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn reads_do_not_protect_oldest_entry() {
    let cache = RetrievalCache::new(Duration::from_secs(300), 2);
    cache.insert("a".to_string(), payload("a", false)).await;
    cache.insert("b".to_string(), payload("b", false)).await;

    assert!(cache.get("a").await.is_some());
    cache.insert("c".to_string(), payload("c", false)).await;

    assert_eq!(cache.get("a").await, None);
    assert!(cache.get("b").await.is_some());
    assert!(cache.get("c").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn reinsert_refreshes_entry() {
    let cache = RetrievalCache::new(Duration::from_secs(300), 2);
    cache.insert("a".to_string(), payload("a", false)).await;
    cache.insert("b".to_string(), payload("b", false)).await;

    tokio::time::advance(Duration::from_secs(200)).await;
    cache.insert("a".to_string(), payload("a", true)).await;
    cache.insert("c".to_string(), payload("c", false)).await;

    assert_eq!(cache.get("b").await, None);
    assert_eq!(cache.get("a").await, Some(payload("a", true)));

    // Re-stamped on insert, so still fresh past the original TTL
    tokio::time::advance(Duration::from_secs(150)).await;
    assert!(cache.get("a").await.is_some());
}

#[tokio::test]
async fn zero_capacity_holds_one_entry() {
    let cache = RetrievalCache::new(Duration::from_secs(300), 0);
    cache.insert("a".to_string(), payload("a", false)).await;
    cache.insert("b".to_string(), payload("b", false)).await;

    assert_eq!(cache.len().await, 1);
    assert!(cache.get("b").await.is_some());
}
