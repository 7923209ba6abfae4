//! Integration tests for cache warming through the context

mod common;

use async_trait::async_trait;
use brixsport_resilience::{
    CachedValue, FnStrategy, TwoTierCache, WarmAllOutcome, WarmError, WarmingStrategy,
};
use common::harness;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

/// Loads the league table the way a real strategy would
struct StandingsStrategy {
    teams: Vec<&'static str>,
}

#[async_trait]
impl WarmingStrategy for StandingsStrategy {
    fn name(&self) -> &str {
        "standings"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn warm(&self, cache: &Arc<TwoTierCache>) -> anyhow::Result<()> {
        cache.set_json("standings", &self.teams, None).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_warmed_keys_are_served_from_cache() {
    let h = harness();
    let warmer = h.context.warmer();
    warmer.register_strategy(Arc::new(StandingsStrategy {
        teams: vec!["Lions", "Eagles"],
    }));
    warmer.register_strategy(Arc::new(FnStrategy::new(
        "live_matches",
        20,
        |cache| async move {
            cache.set_raw("live:count", "3", None).await;
            Ok::<(), anyhow::Error>(())
        },
    )));

    let WarmAllOutcome::Completed(summary) = warmer.warm_all().await else {
        panic!("no other pass is running");
    };
    assert_eq!(summary.succeeded, vec!["live_matches", "standings"]);
    assert!(summary.is_success());

    let cache = h.context.cache();
    assert_eq!(cache.get("live:count").await, Some(CachedValue::raw("3")));
    let teams: Option<Vec<String>> = assert_ok!(cache.get_json("standings").await);
    assert_eq!(teams, Some(vec!["Lions".to_string(), "Eagles".to_string()]));

    // Written through to the shared store as well
    assert_eq!(h.store.len(), 2);
}

#[tokio::test]
async fn test_failing_strategy_does_not_block_others() {
    let h = harness();
    let warmer = h.context.warmer();
    warmer.register_strategy(Arc::new(FnStrategy::new("flaky", 5, |_cache| async {
        anyhow::bail!("upstream feed timed out")
    })));
    warmer.register_strategy(Arc::new(StandingsStrategy {
        teams: vec!["Lions"],
    }));

    let WarmAllOutcome::Completed(summary) = warmer.warm_all().await else {
        panic!("warm_all should not overlap with itself here");
    };
    assert_eq!(summary.succeeded, vec!["standings"]);
    assert_eq!(summary.failed, vec!["flaky"]);

    let err = assert_err!(warmer.warm_by_strategy("flaky").await);
    assert!(matches!(err, WarmError::StrategyFailed { ref strategy, .. } if strategy == "flaky"));

    let stats = warmer.stats("flaky").unwrap();
    assert_eq!(stats.failure_count, 2);
    assert_eq!(stats.success_count, 0);
}

#[tokio::test]
async fn test_disabled_strategy_only_runs_on_demand() {
    let h = harness();
    let warmer = h.context.warmer();
    warmer.register_strategy(Arc::new(
        FnStrategy::new("archive", 1, |cache| async move {
            cache.set_raw("archive:2023", "ready", None).await;
            Ok::<(), anyhow::Error>(())
        })
        .disabled(),
    ));

    warmer.warm_all().await;
    assert_eq!(h.context.cache().get("archive:2023").await, None);

    warmer.warm_by_strategy("archive").await.unwrap();
    assert_eq!(
        h.context.cache().get("archive:2023").await,
        Some(CachedValue::raw("ready"))
    );
}
