//! Integration tests for the two-tier cache wired through the context

mod common;

use brixsport_resilience::{CachedValue, CircuitState, RemoteStore};
use common::{harness, harness_with, test_config};
use std::time::Duration;

#[tokio::test]
async fn test_set_then_get_respects_ttl() {
    let h = harness();
    let cache = h.context.cache();

    assert!(cache.set_raw("match:1", "live", Some(Duration::from_secs(1))).await);
    assert_eq!(cache.get("match:1").await, Some(CachedValue::raw("live")));

    h.clock.advance(Duration::from_millis(1_100));
    assert_eq!(cache.get("match:1").await, None);
}

#[tokio::test]
async fn test_l1_holds_exactly_max_size_entries() {
    let mut config = test_config();
    config.cache.l1_max_size = 50;
    let h = harness_with(config);
    let cache = h.context.cache();

    for i in 0..=50 {
        cache.set_raw(&format!("player:{i}"), "x", None).await;
    }

    let stats = cache.stats();
    assert_eq!(stats.l1_entries, 50);
    assert_eq!(stats.l1_capacity, 50);
    assert_eq!(stats.l1_evictions, 1);
}

#[tokio::test]
async fn test_lru_keeps_recently_read_keys() {
    let mut config = test_config();
    config.cache.l1_max_size = 2;
    // Without L2 every read is answered by L1 alone
    let h = harness_with(config);
    h.store.set_available(false);
    let cache = h.context.cache();

    cache.set_raw("a", "1", None).await;
    cache.set_raw("b", "2", None).await;
    assert!(cache.get("a").await.is_some());
    cache.set_raw("c", "3", None).await;

    assert!(cache.get("a").await.is_some());
    assert!(cache.get("b").await.is_none());
    assert!(cache.get("c").await.is_some());
}

#[tokio::test]
async fn test_delete_pattern_leaves_other_keys() {
    let h = harness();
    let cache = h.context.cache();

    for key in ["user:1", "user:2", "user:admin", "team:1", "users"] {
        cache.set_raw(key, "v", None).await;
    }

    assert_eq!(cache.delete_pattern("user:*").await, 3);
    for key in ["user:1", "user:2", "user:admin"] {
        assert_eq!(cache.get(key).await, None, "{key} should be gone");
    }
    assert!(cache.get("team:1").await.is_some());
    assert!(cache.get("users").await.is_some());
    assert!(h.store.get("brixsport:team:1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_remote_outage_is_invisible_to_callers() {
    let h = harness();
    let cache = h.context.cache();
    cache.set_raw("fixture:9", "sat 15:00", None).await;

    h.store.set_available(false);

    assert!(cache.set_raw("fixture:10", "sun 13:30", None).await);
    assert_eq!(cache.get("fixture:9").await, Some(CachedValue::raw("sat 15:00")));
    assert_eq!(cache.get("fixture:11").await, None);
    assert_eq!(cache.delete("fixture:9").await, 1);
    cache.clear().await;

    assert_eq!(cache.stats().breaker_state, CircuitState::Open);
    let metrics = h.context.metrics().get_metrics();
    assert_eq!(metrics.errors, 2);
    assert_eq!(metrics.misses, 1);
}

#[tokio::test]
async fn test_recovers_after_breaker_timeout() {
    let h = harness();
    let cache = h.context.cache();

    h.store.set_available(false);
    cache.get("a").await;
    cache.get("b").await;
    assert_eq!(cache.stats().breaker_state, CircuitState::Open);

    h.store.set_available(true);
    h.store.set("brixsport:standings", "json:[1,2,3]", 60).await.unwrap();

    // Still open: L2 is not consulted
    assert_eq!(cache.get("standings").await, None);

    h.clock.advance(Duration::from_secs(5));
    let standings: Option<Vec<u32>> = cache.get_json("standings").await.unwrap();
    assert_eq!(standings, Some(vec![1, 2, 3]));
    assert_eq!(cache.stats().breaker_state, CircuitState::Closed);
}

#[tokio::test]
async fn test_values_keep_their_encoding_across_tiers() {
    let h = harness();
    let cache = h.context.cache();

    // A raw value that happens to be valid JSON stays raw
    cache.set_raw("note", "\"quoted\"", None).await;
    cache.set_json("score", &serde_json::json!({"home": 2}), None).await.unwrap();

    assert_eq!(
        h.store.get("brixsport:note").await.unwrap().as_deref(),
        Some("raw:\"quoted\"")
    );

    // A second instance has a cold L1 and reads through L2
    let fresh = brixsport_resilience::ResilienceContext::builder(test_config())
        .remote_store(h.store.clone())
        .clock(h.clock.clone())
        .build()
        .unwrap();

    assert_eq!(fresh.cache().get("note").await, Some(CachedValue::raw("\"quoted\"")));
    let score: Option<serde_json::Value> = fresh.cache().get_json("score").await.unwrap();
    assert_eq!(score, Some(serde_json::json!({"home": 2})));
}

#[tokio::test]
async fn test_background_sweeper_purges_cold_keys() {
    let h = harness();
    let cache = h.context.cache();
    cache.set_raw("cold", "v", Some(Duration::from_millis(10))).await;
    assert_eq!(cache.stats().l1_entries, 1);

    h.clock.advance(Duration::from_secs(1));
    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.stats().l1_entries, 0);
}
