//! Time-decayed "hot score" leaderboards.
//!
//! Scores move two ways. Every graded answer adds a flat increment to each
//! active window. Periodically the whole ledger is recomputed from history
//! with exponential decay, which also corrects the drift the increments
//! accumulate because they never decay on their own. Increments applied
//! after the last persisted attempt are overwritten by a rebuild and
//! reappear with the next real increment.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::config::LedgerConfig;
use crate::error::DrillError;
use crate::model::{Attempt, ScoreEntry, Window};
use crate::traits::{with_timeout, HistoryStore, RankStore};

/// Weight of one attempt before decay.
pub fn attempt_weight(correct: bool) -> f64 {
    if correct {
        2.0
    } else {
        1.0
    }
}

/// Per-user `Σ weight × exp(-elapsed / decay)` over `attempts`.
///
/// Attempts dated after `now` count as zero elapsed. Summation follows the
/// order of `attempts`, so equal input gives bit-identical output.
pub fn hot_scores(attempts: &[Attempt], now: DateTime<Utc>, decay_secs: f64) -> BTreeMap<String, f64> {
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for attempt in attempts {
        let elapsed = (now - attempt.created_at).num_milliseconds().max(0) as f64 / 1000.0;
        let contribution = attempt_weight(attempt.correct) * (-elapsed / decay_secs).exp();
        *scores.entry(attempt.user_id.clone()).or_insert(0.0) += contribution;
    }
    scores
}

/// What a rebuild did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildSummary {
    pub attempts_scanned: usize,
    pub users_scored: usize,
    pub windows_replaced: usize,
}

/// Ranked, time-decayed per-user scores across independent windows.
pub struct ScoreLedger {
    ranks: Arc<dyn RankStore>,
    history: Arc<dyn HistoryStore>,
    config: LedgerConfig,
}

impl ScoreLedger {
    pub fn new(
        ranks: Arc<dyn RankStore>,
        history: Arc<dyn HistoryStore>,
        config: LedgerConfig,
    ) -> Result<Self, DrillError> {
        config.validate()?;
        Ok(Self {
            ranks,
            history,
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn windows(&self) -> &[Window] {
        &self.config.windows
    }

    /// Amount one graded answer adds to every window.
    pub fn increment_amount(&self, correct: bool) -> f64 {
        if correct {
            self.config.base_increment + self.config.correct_bonus
        } else {
            self.config.base_increment
        }
    }

    /// Add the answer's increment to every active window.
    ///
    /// All windows are attempted even if one fails; the first failure is
    /// returned.
    pub async fn increment_on_answer(&self, user_id: &str, correct: bool) -> Result<(), DrillError> {
        let amount = self.increment_amount(correct);
        let timeout = self.config.store_timeout();
        let results = join_all(self.config.windows.iter().map(|&window| {
            with_timeout(timeout, self.ranks.increment(window, user_id, amount))
        }))
        .await;

        let mut first_error = None;
        for (window, result) in self.config.windows.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("increment of {window} for user {user_id} failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Recompute every window from history as of now.
    pub async fn rebuild_from_history(&self) -> Result<RebuildSummary, DrillError> {
        self.rebuild_at(Utc::now()).await
    }

    /// Recompute every window from history as of `now`.
    pub async fn rebuild_at(&self, now: DateTime<Utc>) -> Result<RebuildSummary, DrillError> {
        let timeout = self.config.store_timeout();
        let attempts = with_timeout(timeout, self.history.scan()).await?;
        let scores = hot_scores(&attempts, now, self.config.decay_secs);
        let entries: Vec<(String, f64)> = scores.into_iter().collect();

        for &window in &self.config.windows {
            with_timeout(timeout, self.ranks.replace_all(window, entries.clone())).await?;
        }

        let summary = RebuildSummary {
            attempts_scanned: attempts.len(),
            users_scored: entries.len(),
            windows_replaced: self.config.windows.len(),
        };
        tracing::info!(
            attempts = summary.attempts_scanned,
            users = summary.users_scored,
            windows = summary.windows_replaced,
            "rebuilt leaderboards from history"
        );
        Ok(summary)
    }

    /// Top `n` entries of an active window, highest score first.
    pub async fn top_n(&self, window: Window, n: usize) -> Result<Vec<ScoreEntry>, DrillError> {
        if !self.config.windows.contains(&window) {
            return Err(DrillError::UnknownWindow(window.to_string()));
        }
        let entries = with_timeout(self.config.store_timeout(), self.ranks.top(window, n)).await?;
        Ok(entries)
    }

    /// One user's current score in an active window, if they have one.
    pub async fn score(&self, window: Window, user_id: &str) -> Result<Option<f64>, DrillError> {
        if !self.config.windows.contains(&window) {
            return Err(DrillError::UnknownWindow(window.to_string()));
        }
        let score = with_timeout(self.config.store_timeout(), self.ranks.score(window, user_id)).await?;
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tier;
    use chrono::Duration;
    use uuid::Uuid;

    fn attempt(user: &str, correct: bool, created_at: DateTime<Utc>) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            user_id: user.into(),
            question_id: "q".into(),
            expression: "2 + 2".into(),
            submitted_answer: 4.0,
            correct_answer: 4.0,
            correct,
            tier: Tier::Easy,
            time_spent_secs: None,
            created_at,
        }
    }

    const DAY: f64 = 86_400.0;

    #[test]
    fn weights() {
        assert_eq!(attempt_weight(true), 2.0);
        assert_eq!(attempt_weight(false), 1.0);
    }

    #[test]
    fn fresh_attempts_score_their_weight() {
        let now = Utc::now();
        let scores = hot_scores(
            &[attempt("a", true, now), attempt("a", false, now), attempt("b", false, now)],
            now,
            DAY,
        );
        assert_eq!(scores["a"], 3.0);
        assert_eq!(scores["b"], 1.0);
    }

    #[test]
    fn one_decay_constant_scales_by_e_inverse() {
        let now = Utc::now();
        let scores = hot_scores(&[attempt("a", true, now - Duration::hours(24))], now, DAY);
        let expected = 2.0 * (-1.0f64).exp();
        assert!((scores["a"] - expected).abs() < 1e-12, "got {}", scores["a"]);
    }

    #[test]
    fn future_attempts_do_not_grow() {
        let now = Utc::now();
        let scores = hot_scores(&[attempt("a", true, now + Duration::hours(3))], now, DAY);
        assert_eq!(scores["a"], 2.0);
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let now = Utc::now();
        let attempts: Vec<Attempt> = (0..50)
            .map(|i| attempt(&format!("u{}", i % 7), i % 3 == 0, now - Duration::minutes(i * 37)))
            .collect();
        let first = hot_scores(&attempts, now, DAY);
        let second = hot_scores(&attempts, now, DAY);
        for (user, score) in &first {
            assert_eq!(score.to_bits(), second[user].to_bits());
        }
    }
}
