//! Score ledger behaviour over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use mathdrill_core::config::LedgerConfig;
use mathdrill_core::ledger::ScoreLedger;
use mathdrill_core::model::{Attempt, Tier, Window};
use mathdrill_core::traits::{HistoryStore, RankStore};
use mathdrill_core::{DrillError, StoreError};
use mathdrill_stores::{Faulty, MemoryHistoryStore, MemoryRankStore};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn attempt(user: &str, correct: bool, created_at: DateTime<Utc>) -> Attempt {
    Attempt {
        id: Uuid::new_v4(),
        user_id: user.into(),
        question_id: format!("q-{}", Uuid::new_v4()),
        expression: "6 × 7".into(),
        submitted_answer: 42.0,
        correct_answer: 42.0,
        correct,
        tier: Tier::Medium,
        time_spent_secs: None,
        created_at,
    }
}

fn ledger_over(
    ranks: Arc<dyn RankStore>,
    history: Arc<dyn HistoryStore>,
) -> ScoreLedger {
    ScoreLedger::new(ranks, history, LedgerConfig::default()).unwrap()
}

#[tokio::test]
async fn correct_answers_add_150_to_every_active_window() {
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), Arc::new(MemoryHistoryStore::new()));

    for _ in 0..4 {
        ledger.increment_on_answer("7", true).await.unwrap();
    }

    assert_eq!(ranks.score(Window::Hourly, "7").await.unwrap(), Some(600.0));
    assert_eq!(ranks.score(Window::Daily, "7").await.unwrap(), Some(600.0));
    // Weekly is not active by default.
    assert_eq!(ranks.score(Window::Weekly, "7").await.unwrap(), None);
}

#[tokio::test]
async fn incorrect_answers_add_the_base_only() {
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), Arc::new(MemoryHistoryStore::new()));

    ledger.increment_on_answer("7", false).await.unwrap();
    ledger.increment_on_answer("7", true).await.unwrap();

    assert_eq!(ranks.score(Window::Daily, "7").await.unwrap(), Some(200.0));
}

#[tokio::test]
async fn configured_windows_are_respected() {
    let ranks = Arc::new(MemoryRankStore::new());
    let config = LedgerConfig {
        windows: vec![Window::Weekly],
        ..Default::default()
    };
    let ledger =
        ScoreLedger::new(ranks.clone(), Arc::new(MemoryHistoryStore::new()), config).unwrap();

    ledger.increment_on_answer("7", true).await.unwrap();

    assert_eq!(ranks.score(Window::Weekly, "7").await.unwrap(), Some(150.0));
    assert_eq!(ranks.score(Window::Hourly, "7").await.unwrap(), None);
}

#[tokio::test]
async fn rebuild_applies_exponential_decay() {
    let now = base_time();
    let history = MemoryHistoryStore::with_attempts(vec![
        attempt("a", true, now),
        attempt("a", true, now - chrono::Duration::hours(24)),
        attempt("b", false, now - chrono::Duration::hours(48)),
    ]);
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), Arc::new(history));

    let summary = ledger.rebuild_at(now).await.unwrap();
    assert_eq!(summary.attempts_scanned, 3);
    assert_eq!(summary.users_scored, 2);
    assert_eq!(summary.windows_replaced, 2);

    let a = ranks.score(Window::Hourly, "a").await.unwrap().unwrap();
    let b = ranks.score(Window::Hourly, "b").await.unwrap().unwrap();
    assert!((a - (2.0 + 2.0 * (-1.0f64).exp())).abs() < 1e-9, "a = {a}");
    assert!((b - (-2.0f64).exp()).abs() < 1e-9, "b = {b}");
}

#[tokio::test]
async fn rebuild_is_idempotent_for_a_fixed_instant() {
    let now = base_time();
    let attempts: Vec<Attempt> = (0..40)
        .map(|i| {
            attempt(
                &format!("u{}", i % 6),
                i % 4 != 0,
                now - chrono::Duration::minutes(i * 53),
            )
        })
        .collect();
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), Arc::new(MemoryHistoryStore::with_attempts(attempts)));

    ledger.rebuild_at(now).await.unwrap();
    let first = ranks.top(Window::Daily, 100).await.unwrap();
    ledger.rebuild_at(now).await.unwrap();
    let second = ranks.top(Window::Daily, 100).await.unwrap();

    assert_eq!(first.len(), 6);
    assert_eq!(first.len(), second.len());
    for (x, y) in first.iter().zip(&second) {
        assert_eq!(x.user_id, y.user_id);
        assert_eq!(x.score.to_bits(), y.score.to_bits());
    }
}

#[tokio::test]
async fn rebuild_overwrites_increments() {
    let now = base_time();
    let history = Arc::new(MemoryHistoryStore::with_attempts(vec![attempt("a", true, now)]));
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), history);

    ledger.increment_on_answer("a", true).await.unwrap();
    ledger.increment_on_answer("ghost", true).await.unwrap();
    ledger.rebuild_at(now).await.unwrap();

    assert_eq!(ranks.score(Window::Hourly, "a").await.unwrap(), Some(2.0));
    assert_eq!(ranks.score(Window::Hourly, "ghost").await.unwrap(), None);
}

#[tokio::test]
async fn rebuild_of_empty_history_clears_windows() {
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), Arc::new(MemoryHistoryStore::new()));

    ledger.increment_on_answer("a", true).await.unwrap();
    let summary = ledger.rebuild_from_history().await.unwrap();

    assert_eq!(summary.users_scored, 0);
    assert!(ranks.top(Window::Daily, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn top_n_orders_by_score_then_member() {
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), Arc::new(MemoryHistoryStore::new()));

    ledger.increment_on_answer("b", true).await.unwrap();
    ledger.increment_on_answer("a", true).await.unwrap();
    ledger.increment_on_answer("c", false).await.unwrap();

    let top = ledger.top_n(Window::Hourly, 2).await.unwrap();
    let ids: Vec<&str> = top.iter().map(|e| e.user_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
}

#[tokio::test]
async fn repeated_window_is_rejected() {
    let config = LedgerConfig {
        windows: vec![Window::Daily, Window::Daily],
        ..Default::default()
    };
    let result = ScoreLedger::new(
        Arc::new(MemoryRankStore::new()),
        Arc::new(MemoryHistoryStore::new()),
        config,
    );
    assert!(matches!(result, Err(DrillError::InvalidConfig(_))));
}

#[tokio::test]
async fn score_reads_one_member() {
    let ledger = ledger_over(
        Arc::new(MemoryRankStore::new()),
        Arc::new(MemoryHistoryStore::new()),
    );
    ledger.increment_on_answer("7", false).await.unwrap();

    assert_eq!(ledger.score(Window::Hourly, "7").await.unwrap(), Some(50.0));
    assert_eq!(ledger.score(Window::Hourly, "8").await.unwrap(), None);
    let err = ledger.score(Window::Weekly, "7").await.unwrap_err();
    assert!(matches!(err, DrillError::UnknownWindow(_)));
}

#[tokio::test]
async fn top_n_rejects_inactive_window() {
    let ledger = ledger_over(
        Arc::new(MemoryRankStore::new()),
        Arc::new(MemoryHistoryStore::new()),
    );
    let err = ledger.top_n(Window::Weekly, 10).await.unwrap_err();
    assert!(matches!(err, DrillError::UnknownWindow(_)));
}

#[tokio::test]
async fn failed_increment_is_reported() {
    let ranks = Arc::new(Faulty::failing(MemoryRankStore::new()));
    let ledger = ledger_over(ranks.clone(), Arc::new(MemoryHistoryStore::new()));

    let err = ledger.increment_on_answer("7", true).await.unwrap_err();
    assert!(matches!(err, DrillError::Store(StoreError::Unavailable(_))));
    // Both windows were attempted.
    assert_eq!(ranks.call_count(), 2);
}

#[tokio::test]
async fn failed_scan_leaves_windows_untouched() {
    let history = Arc::new(Faulty::failing(MemoryHistoryStore::new()));
    let ranks = Arc::new(MemoryRankStore::new());
    let ledger = ledger_over(ranks.clone(), history);

    ledger.increment_on_answer("7", true).await.unwrap();
    assert!(ledger.rebuild_from_history().await.is_err());
    assert_eq!(ranks.score(Window::Daily, "7").await.unwrap(), Some(150.0));
}

#[tokio::test(start_paused = true)]
async fn slow_rank_store_times_out() {
    let ranks = Arc::new(Faulty::new(MemoryRankStore::new()));
    ranks.set_delay(Duration::from_secs(10));
    let config = LedgerConfig {
        store_timeout_ms: 500,
        ..Default::default()
    };
    let ledger = ScoreLedger::new(ranks, Arc::new(MemoryHistoryStore::new()), config).unwrap();

    let err = ledger.increment_on_answer("7", true).await.unwrap_err();
    assert!(matches!(err, DrillError::Store(StoreError::Timeout(500))));
}
