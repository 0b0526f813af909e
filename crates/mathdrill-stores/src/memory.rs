//! Single-process store backends.
//!
//! Every store guards its state with one mutex that is never held across an
//! await point, so each trait call is atomic with respect to the others.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use mathdrill_core::model::{Attempt, Question, ScoreEntry, Tier, Window};
use mathdrill_core::traits::{HistoryFilter, HistoryStore, QuestionCache, RankStore, UserDirectory};
use mathdrill_core::StoreError;

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable(format!("{what} lock poisoned")))
}

// ---------------------------------------------------------------------------
// Question cache
// ---------------------------------------------------------------------------

struct CachedQuestion {
    question: Question,
    deadline: Instant,
}

/// Every this many puts, expired entries are swept while the lock is held.
const SWEEP_EVERY: u64 = 64;

/// In-memory question cache with per-entry expiry.
///
/// Expiry is measured on the tokio clock, so paused-time tests can advance
/// past a TTL without sleeping. Entries that are never fetched again are
/// dropped by a sweep on every [`SWEEP_EVERY`]th put, which bounds the map
/// by the questions issued within one TTL plus one sweep interval.
#[derive(Default)]
pub struct MemoryQuestionCache {
    entries: Mutex<HashMap<String, CachedQuestion>>,
    puts: AtomicU64,
}

impl MemoryQuestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries, excluding any that have expired but not been purged.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        match self.entries.lock() {
            Ok(entries) => entries.values().filter(|e| e.deadline > now).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = lock(&self.entries, "question cache")?;
        let before = entries.len();
        entries.retain(|_, e| e.deadline > now);
        Ok(before - entries.len())
    }
}

#[async_trait]
impl QuestionCache for MemoryQuestionCache {
    async fn put(&self, question: &Question, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        let entry = CachedQuestion {
            question: question.clone(),
            deadline: now + ttl,
        };
        let mut entries = lock(&self.entries, "question cache")?;
        entries.insert(question.id.clone(), entry);
        if self.puts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            let before = entries.len();
            entries.retain(|_, e| e.deadline > now);
            tracing::debug!(removed = before - entries.len(), "swept expired questions");
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Question>, StoreError> {
        let now = Instant::now();
        let mut entries = lock(&self.entries, "question cache")?;
        match entries.get(id) {
            Some(entry) if entry.deadline > now => Ok(Some(entry.question.clone())),
            Some(_) => {
                entries.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn take(&self, id: &str) -> Result<Option<Question>, StoreError> {
        let now = Instant::now();
        let removed = lock(&self.entries, "question cache")?.remove(id);
        Ok(removed
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.question))
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Append-only attempt log kept in memory.
#[derive(Default)]
pub struct MemoryHistoryStore {
    attempts: Mutex<Vec<Attempt>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log, as if each attempt had been appended in order.
    pub fn with_attempts(attempts: Vec<Attempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, attempt: &Attempt) -> Result<(), StoreError> {
        lock(&self.attempts, "history")?.push(attempt.clone());
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Attempt>, StoreError> {
        let mut attempts = lock(&self.attempts, "history")?.clone();
        // Stable, so equal timestamps keep append order.
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }

    async fn for_user(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<Attempt>, StoreError> {
        let attempts = lock(&self.attempts, "history")?;
        let mut matching: Vec<Attempt> = attempts
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn distinct_questions(
        &self,
        user_id: &str,
        tier: Option<Tier>,
    ) -> Result<u64, StoreError> {
        let attempts = lock(&self.attempts, "history")?;
        let ids: HashSet<&str> = attempts
            .iter()
            .filter(|a| a.user_id == user_id && tier.map_or(true, |t| a.tier == t))
            .map(|a| a.question_id.as_str())
            .collect();
        Ok(ids.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Ranked sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Standing {
    score: f64,
    last_updated: DateTime<Utc>,
}

/// Sorted-set style leaderboards, one map per window.
#[derive(Default)]
pub struct MemoryRankStore {
    windows: Mutex<HashMap<Window, HashMap<String, Standing>>>,
}

impl MemoryRankStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members currently ranked in `window`.
    pub fn member_count(&self, window: Window) -> usize {
        self.windows
            .lock()
            .map(|w| w.get(&window).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl RankStore for MemoryRankStore {
    async fn increment(
        &self,
        window: Window,
        member: &str,
        amount: f64,
    ) -> Result<f64, StoreError> {
        let now = Utc::now();
        let mut windows = lock(&self.windows, "rank store")?;
        let standing = windows
            .entry(window)
            .or_default()
            .entry(member.to_string())
            .or_insert(Standing {
                score: 0.0,
                last_updated: now,
            });
        standing.score += amount;
        standing.last_updated = now;
        Ok(standing.score)
    }

    async fn replace_all(
        &self,
        window: Window,
        entries: Vec<(String, f64)>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let replacement: HashMap<String, Standing> = entries
            .into_iter()
            .map(|(member, score)| {
                (
                    member,
                    Standing {
                        score,
                        last_updated: now,
                    },
                )
            })
            .collect();
        lock(&self.windows, "rank store")?.insert(window, replacement);
        Ok(())
    }

    async fn top(&self, window: Window, limit: usize) -> Result<Vec<ScoreEntry>, StoreError> {
        let windows = lock(&self.windows, "rank store")?;
        let Some(members) = windows.get(&window) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<(&String, &Standing)> = members.iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.score.total_cmp(&a.score).then_with(|| a_id.cmp(b_id))
        });

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(member, standing)| ScoreEntry {
                user_id: member.clone(),
                window,
                score: standing.score,
                last_updated: standing.last_updated,
            })
            .collect())
    }

    async fn score(&self, window: Window, member: &str) -> Result<Option<f64>, StoreError> {
        let windows = lock(&self.windows, "rank store")?;
        Ok(windows
            .get(&window)
            .and_then(|members| members.get(member))
            .map(|standing| standing.score))
    }
}

// ---------------------------------------------------------------------------
// User directory
// ---------------------------------------------------------------------------

/// A fixed id-to-name table.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    names: HashMap<String, String>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(user_id.into(), name.into());
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.names.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mathdrill_core::composer::Composition;
    use mathdrill_core::model::Operator;
    use uuid::Uuid;

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            expression: "12 ÷ 4".into(),
            answer: 3.0,
            tier: Tier::Easy,
            operators: vec![Operator::Divide],
            composition: Composition::new(vec![12, 4], vec![Operator::Divide]),
            time_limit_secs: 10,
            issued_at: Utc::now(),
            ttl_secs: 60,
        }
    }

    fn attempt(user: &str, question: &str, tier: Tier, minutes_ago: i64) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            user_id: user.into(),
            question_id: question.into(),
            expression: "1 + 1".into(),
            submitted_answer: 2.0,
            correct_answer: 2.0,
            correct: true,
            tier,
            time_spent_secs: None,
            created_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_question_expires_after_ttl() {
        let cache = MemoryQuestionCache::new();
        cache
            .put(&question("q1"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.get("q1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("q1").await.unwrap().is_none());
        assert!(cache.take("q1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_consumes_the_entry() {
        let cache = MemoryQuestionCache::new();
        cache
            .put(&question("q1"), Duration::from_secs(60))
            .await
            .unwrap();

        let first = cache.take("q1").await.unwrap();
        assert_eq!(first.map(|q| q.answer), Some(3.0));
        assert!(cache.take("q1").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = MemoryQuestionCache::new();
        cache.put(&question("short"), Duration::from_secs(5)).await.unwrap();
        cache.put(&question("long"), Duration::from_secs(500)).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_questions_are_swept_by_later_puts() {
        let cache = MemoryQuestionCache::new();
        for i in 0..500 {
            let id = format!("old{i}");
            cache.put(&question(&id), Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(cache.entries.lock().unwrap().len(), 500);

        tokio::time::advance(Duration::from_secs(3600)).await;
        for i in 0..SWEEP_EVERY {
            let id = format!("new{i}");
            cache.put(&question(&id), Duration::from_secs(60)).await.unwrap();
        }

        let stored = cache.entries.lock().unwrap().len();
        assert!(stored <= SWEEP_EVERY as usize, "{stored} entries kept");
        assert_eq!(cache.len(), SWEEP_EVERY as usize);
        assert!(cache.get("new0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn history_orders_and_filters() {
        let history = MemoryHistoryStore::new();
        history.append(&attempt("u1", "a", Tier::Easy, 30)).await.unwrap();
        history.append(&attempt("u1", "b", Tier::Hard, 10)).await.unwrap();
        history.append(&attempt("u2", "c", Tier::Easy, 20)).await.unwrap();
        history.append(&attempt("u1", "a", Tier::Easy, 5)).await.unwrap();

        let scanned = history.scan().await.unwrap();
        assert_eq!(scanned.len(), 4);
        assert!(scanned.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let mine = history.for_user("u1", &HistoryFilter::default()).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let easy = history
            .for_user("u1", &HistoryFilter::default().with_tier(Tier::Easy))
            .await
            .unwrap();
        assert_eq!(easy.len(), 2);

        assert_eq!(history.distinct_questions("u1", None).await.unwrap(), 2);
        assert_eq!(history.distinct_questions("u1", Some(Tier::Hard)).await.unwrap(), 1);
        assert_eq!(history.distinct_questions("nobody", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn increment_creates_at_zero() {
        let ranks = MemoryRankStore::new();
        assert_eq!(ranks.increment(Window::Daily, "u1", 50.0).await.unwrap(), 50.0);
        assert_eq!(ranks.increment(Window::Daily, "u1", 150.0).await.unwrap(), 200.0);
        assert_eq!(ranks.score(Window::Hourly, "u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn top_breaks_ties_by_member() {
        let ranks = MemoryRankStore::new();
        ranks
            .replace_all(
                Window::Hourly,
                vec![
                    ("b".into(), 5.0),
                    ("c".into(), 9.0),
                    ("a".into(), 5.0),
                    ("d".into(), 1.0),
                ],
            )
            .await
            .unwrap();

        let top = ranks.top(Window::Hourly, 3).await.unwrap();
        let order: Vec<&str> = top.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
        assert!(top.iter().all(|e| e.window == Window::Hourly));
    }

    #[tokio::test]
    async fn replace_all_drops_absent_members() {
        let ranks = MemoryRankStore::new();
        ranks.increment(Window::Daily, "stale", 500.0).await.unwrap();
        ranks
            .replace_all(Window::Daily, vec![("fresh".into(), 2.0)])
            .await
            .unwrap();

        assert_eq!(ranks.score(Window::Daily, "stale").await.unwrap(), None);
        assert_eq!(ranks.member_count(Window::Daily), 1);
    }

    #[tokio::test]
    async fn top_of_empty_window() {
        let ranks = MemoryRankStore::new();
        assert!(ranks.top(Window::Weekly, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn directory_lookup() {
        let directory = StaticUserDirectory::new().with_name("1", "Ada");
        assert_eq!(directory.display_name("1").await.unwrap().as_deref(), Some("Ada"));
        assert_eq!(directory.display_name("2").await.unwrap(), None);
    }
}
