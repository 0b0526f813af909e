//! Fault-injecting store wrapper for testing degraded paths.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use mathdrill_core::model::{Attempt, Question, ScoreEntry, Tier, Window};
use mathdrill_core::traits::{HistoryFilter, HistoryStore, QuestionCache, RankStore, UserDirectory};
use mathdrill_core::StoreError;

/// Wraps any store and can be switched to fail or stall on demand.
///
/// Every trait call counts, including the ones that fail.
pub struct Faulty<S> {
    inner: S,
    failing: AtomicBool,
    /// Stall before each call, in milliseconds.
    delay_ms: AtomicU64,
    calls: AtomicU32,
}

impl<S> Faulty<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// A wrapper that fails from the first call.
    pub fn failing(inner: S) -> Self {
        let store = Self::new(inner);
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn gate(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: QuestionCache> QuestionCache for Faulty<S> {
    async fn put(&self, question: &Question, ttl: Duration) -> Result<(), StoreError> {
        self.gate().await?;
        self.inner.put(question, ttl).await
    }

    async fn get(&self, id: &str) -> Result<Option<Question>, StoreError> {
        self.gate().await?;
        self.inner.get(id).await
    }

    async fn take(&self, id: &str) -> Result<Option<Question>, StoreError> {
        self.gate().await?;
        self.inner.take(id).await
    }
}

#[async_trait]
impl<S: HistoryStore> HistoryStore for Faulty<S> {
    async fn append(&self, attempt: &Attempt) -> Result<(), StoreError> {
        self.gate().await?;
        self.inner.append(attempt).await
    }

    async fn scan(&self) -> Result<Vec<Attempt>, StoreError> {
        self.gate().await?;
        self.inner.scan().await
    }

    async fn for_user(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<Attempt>, StoreError> {
        self.gate().await?;
        self.inner.for_user(user_id, filter).await
    }

    async fn distinct_questions(
        &self,
        user_id: &str,
        tier: Option<Tier>,
    ) -> Result<u64, StoreError> {
        self.gate().await?;
        self.inner.distinct_questions(user_id, tier).await
    }
}

#[async_trait]
impl<S: RankStore> RankStore for Faulty<S> {
    async fn increment(
        &self,
        window: Window,
        member: &str,
        amount: f64,
    ) -> Result<f64, StoreError> {
        self.gate().await?;
        self.inner.increment(window, member, amount).await
    }

    async fn replace_all(
        &self,
        window: Window,
        entries: Vec<(String, f64)>,
    ) -> Result<(), StoreError> {
        self.gate().await?;
        self.inner.replace_all(window, entries).await
    }

    async fn top(&self, window: Window, limit: usize) -> Result<Vec<ScoreEntry>, StoreError> {
        self.gate().await?;
        self.inner.top(window, limit).await
    }

    async fn score(&self, window: Window, member: &str) -> Result<Option<f64>, StoreError> {
        self.gate().await?;
        self.inner.score(window, member).await
    }
}

#[async_trait]
impl<S: UserDirectory> UserDirectory for Faulty<S> {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        self.gate().await?;
        self.inner.display_name(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryRankStore, StaticUserDirectory};

    #[tokio::test]
    async fn passes_through_until_switched() {
        let ranks = Faulty::new(MemoryRankStore::new());
        assert_eq!(ranks.increment(Window::Daily, "u", 50.0).await.unwrap(), 50.0);

        ranks.set_failing(true);
        let err = ranks.increment(Window::Daily, "u", 50.0).await.unwrap_err();
        assert!(err.is_transient());

        ranks.set_failing(false);
        assert_eq!(ranks.score(Window::Daily, "u").await.unwrap(), Some(50.0));
        assert_eq!(ranks.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_stalls_the_call() {
        let directory = Faulty::new(StaticUserDirectory::new().with_name("1", "Ada"));
        directory.set_delay(Duration::from_secs(3));

        let start = tokio::time::Instant::now();
        let name = directory.display_name("1").await.unwrap();
        assert_eq!(name.as_deref(), Some("Ada"));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
