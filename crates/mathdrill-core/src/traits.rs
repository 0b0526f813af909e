//! Store trait definitions.
//!
//! The core treats every store as a black box with atomic per-key
//! operations. Implementations live in `mathdrill-stores`; a single-process
//! map and a networked cache are interchangeable behind these traits.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreError;
use crate::model::{Attempt, Question, ScoreEntry, Tier, Window};

// ---------------------------------------------------------------------------
// Question cache
// ---------------------------------------------------------------------------

/// TTL key-value store of issued-but-unanswered questions.
#[async_trait]
pub trait QuestionCache: Send + Sync {
    /// Store a question; it disappears once `ttl` elapses.
    async fn put(&self, question: &Question, ttl: Duration) -> Result<(), StoreError>;

    /// Read a live question without consuming it.
    async fn get(&self, id: &str) -> Result<Option<Question>, StoreError>;

    /// Atomically read and delete a live question. Of two concurrent calls
    /// for the same id, at most one returns `Some`.
    async fn take(&self, id: &str) -> Result<Option<Question>, StoreError>;
}

// ---------------------------------------------------------------------------
// History store
// ---------------------------------------------------------------------------

/// Narrows a user's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub tier: Option<Tier>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    /// The 24 hours of `date` in UTC.
    pub fn on_date(date: NaiveDate) -> Self {
        let start = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        Self {
            tier: None,
            since: start,
            until: start.map(|s| s + chrono::Duration::hours(24)),
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn matches(&self, attempt: &Attempt) -> bool {
        self.tier.map_or(true, |t| attempt.tier == t)
            && self.since.map_or(true, |s| attempt.created_at >= s)
            && self.until.map_or(true, |u| attempt.created_at < u)
    }
}

/// Append-only log of graded attempts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, attempt: &Attempt) -> Result<(), StoreError>;

    /// Every attempt, oldest first.
    async fn scan(&self) -> Result<Vec<Attempt>, StoreError>;

    /// A user's attempts matching `filter`, newest first.
    async fn for_user(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<Attempt>, StoreError>;

    /// Number of distinct question ids a user attempted, optionally per tier.
    async fn distinct_questions(
        &self,
        user_id: &str,
        tier: Option<Tier>,
    ) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// Ranked structure
// ---------------------------------------------------------------------------

/// Per-window ranked sets of `(member, score)`.
#[async_trait]
pub trait RankStore: Send + Sync {
    /// Add `amount` to a member's score, creating it at zero. Returns the
    /// new score.
    async fn increment(
        &self,
        window: Window,
        member: &str,
        amount: f64,
    ) -> Result<f64, StoreError>;

    /// Replace every member of a window in one step.
    async fn replace_all(
        &self,
        window: Window,
        entries: Vec<(String, f64)>,
    ) -> Result<(), StoreError>;

    /// The first `limit` entries by descending score; equal scores are
    /// ordered by member id.
    async fn top(&self, window: Window, limit: usize) -> Result<Vec<ScoreEntry>, StoreError>;

    async fn score(&self, window: Window, member: &str) -> Result<Option<f64>, StoreError>;
}

// ---------------------------------------------------------------------------
// User directory
// ---------------------------------------------------------------------------

/// Resolves user ids to display names.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

/// Name shown for users the directory cannot resolve.
pub fn placeholder_name(user_id: &str) -> String {
    format!("user{user_id}")
}

/// Bound a store call by `limit`, mapping expiry to [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit.as_millis() as u64)),
    }
}
