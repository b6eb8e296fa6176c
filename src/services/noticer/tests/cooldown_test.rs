//! Cooldown window behavior against the in-process store
//!
//! The runtime clock is paused so windows can be crossed instantly.

mod common;

use common::{cooldown, ding_gate};
use futures::future::join_all;
use noticer::{CooldownDecision, DispatchMetrics, Endpoint, MemoryStore};
use noticer::config::MetricsConfig;
use noticer::ChannelKind;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_attempts_within_limit_are_open() {
    let gate = ding_gate(Arc::new(MemoryStore::new()), cooldown(19, 61));
    let robot = Endpoint::new("robot-a");

    for expected in 1..=19 {
        let decision = gate.check(&robot).await.unwrap();
        assert_eq!(decision, CooldownDecision::Open { count: expected });
    }

    assert!(gate.is_cooling_down(&robot).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_window_resets_after_expiry() {
    let store = Arc::new(MemoryStore::new());
    let gate = ding_gate(store.clone(), cooldown(19, 61));
    let robot = Endpoint::new("robot-a");

    for _ in 0..30 {
        gate.check(&robot).await.unwrap();
    }
    assert!(gate.is_cooling_down(&robot).await.unwrap());
    assert_eq!(store.count("dog.dinggroup.sleep.robot-a"), Some(31));

    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(
        gate.check(&robot).await.unwrap(),
        CooldownDecision::Open { count: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_counts_from_first_attempt() {
    let gate = ding_gate(Arc::new(MemoryStore::new()), cooldown(1, 61));
    let robot = Endpoint::new("robot-a");

    gate.check(&robot).await.unwrap();
    tokio::time::advance(Duration::from_secs(20)).await;

    assert_eq!(
        gate.check(&robot).await.unwrap(),
        CooldownDecision::CoolingDown {
            count: 2,
            retry_after: Some(Duration::from_secs(41)),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_counter_without_expiry_heals_itself() {
    let store = Arc::new(MemoryStore::new());
    store.insert("dog.dinggroup.sleep.robot-a", 57, None);

    let metrics = Arc::new(DispatchMetrics::new(&MetricsConfig::default()).unwrap());
    let gate = ding_gate(store.clone(), cooldown(19, 61)).with_metrics(metrics.clone());
    let robot = Endpoint::new("robot-a");

    let decision = gate.check(&robot).await.unwrap();
    assert_eq!(decision, CooldownDecision::Repaired { count: 58 });
    assert!(!decision.is_cooling_down());
    assert_eq!(metrics.counter_repairs(ChannelKind::DingGroup), 1);

    // the next attempt opens a fresh window with an expiry
    assert_eq!(
        gate.check(&robot).await.unwrap(),
        CooldownDecision::Open { count: 1 }
    );
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(store.count("dog.dinggroup.sleep.robot-a"), None);
}

#[tokio::test(start_paused = true)]
async fn test_endpoints_have_independent_windows() {
    let gate = ding_gate(Arc::new(MemoryStore::new()), cooldown(2, 61));
    let busy = Endpoint::new("robot-a");
    let idle = Endpoint::new("robot-b");

    for _ in 0..3 {
        gate.check(&busy).await.unwrap();
    }

    assert!(gate.is_cooling_down(&busy).await.unwrap());
    assert!(!gate.is_cooling_down(&idle).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_checks_count_every_attempt() {
    let store = Arc::new(MemoryStore::new());
    let gate = ding_gate(store.clone(), cooldown(19, 61));
    let robot = Endpoint::new("robot-a");

    let decisions = join_all((0..40).map(|_| gate.check(&robot))).await;
    let mut counts: Vec<i64> = decisions
        .into_iter()
        .map(|decision| decision.unwrap().count())
        .collect();
    counts.sort_unstable();

    assert_eq!(counts, (1..=40).collect::<Vec<i64>>());
    assert_eq!(store.count("dog.dinggroup.sleep.robot-a"), Some(40));
}
