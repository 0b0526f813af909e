//! The drill service: the operations the HTTP layer calls.
//!
//! Issuing a question, grading a submission, reading leaderboards and
//! history. Grading consumes the cached question atomically; recording the
//! attempt and updating the ledger afterwards are best-effort and never
//! change the verdict returned to the student.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::DrillError;
use crate::generator::{GenerateRequest, ProblemGenerator};
use crate::ledger::ScoreLedger;
use crate::model::{Attempt, QuestionView, RankingEntry, Window};
use crate::statistics::{user_statistics, UserStatistics};
use crate::traits::{
    placeholder_name, with_timeout, HistoryFilter, HistoryStore, QuestionCache, UserDirectory,
};

/// A submission that was graded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub correct: bool,
    /// Revealed only once grading has happened.
    pub correct_answer: f64,
    pub message: String,
    /// The student has spent long enough on this question to suggest a break.
    pub need_rest: bool,
    /// The history store confirmed the append. `false` means unconfirmed
    /// rather than absent: an append that timed out may still land.
    #[serde(skip)]
    pub history_recorded: bool,
    /// Every ledger window received the increment.
    #[serde(skip)]
    pub ledger_updated: bool,
}

/// Result of `SubmitAnswer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Graded(GradedAnswer),
    /// The question id is unknown, expired, or already answered. Neither
    /// correct nor incorrect.
    NotFound { message: String },
}

impl SubmitOutcome {
    pub fn message(&self) -> &str {
        match self {
            SubmitOutcome::Graded(graded) => &graded.message,
            SubmitOutcome::NotFound { message } => message,
        }
    }

    pub fn is_correct(&self) -> Option<bool> {
        match self {
            SubmitOutcome::Graded(graded) => Some(graded.correct),
            SubmitOutcome::NotFound { .. } => None,
        }
    }
}

/// Format an answer without a trailing `.0` for whole numbers.
pub fn format_answer(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

pub struct DrillService {
    generator: ProblemGenerator,
    cache: Arc<dyn QuestionCache>,
    history: Arc<dyn HistoryStore>,
    ledger: Arc<ScoreLedger>,
    directory: Arc<dyn UserDirectory>,
    config: ServiceConfig,
}

impl DrillService {
    pub fn new(
        generator: ProblemGenerator,
        cache: Arc<dyn QuestionCache>,
        history: Arc<dyn HistoryStore>,
        ledger: Arc<ScoreLedger>,
        directory: Arc<dyn UserDirectory>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            generator,
            cache,
            history,
            ledger,
            directory,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<ScoreLedger> {
        &self.ledger
    }

    pub fn generator(&self) -> &ProblemGenerator {
        &self.generator
    }

    /// `GetQuestion`: parse the boundary names, generate, and cache.
    pub async fn get_question<S: AsRef<str>>(
        &self,
        user_id: &str,
        tier: Option<&str>,
        operators: &[S],
        time_limit_secs: i64,
    ) -> Result<QuestionView, DrillError> {
        let request = GenerateRequest::parse(tier, operators, time_limit_secs)?;
        self.issue(user_id, request).await
    }

    /// Generate a question for `user_id` and place it in the cache.
    pub async fn issue(
        &self,
        user_id: &str,
        request: GenerateRequest,
    ) -> Result<QuestionView, DrillError> {
        let ttl = request.ttl.unwrap_or_else(|| self.config.question_ttl());
        let request = request.with_scope(user_id).with_ttl(ttl);

        let question = {
            let mut rng = StdRng::from_entropy();
            self.generator.generate(&request, &mut rng)?
        };

        with_timeout(self.config.store_timeout(), self.cache.put(&question, ttl)).await?;
        Ok(question.view())
    }

    /// `SubmitAnswer` graded as of now.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        question_id: &str,
        value: f64,
        time_spent_secs: Option<f64>,
    ) -> Result<SubmitOutcome, DrillError> {
        self.submit_answer_at(user_id, question_id, value, time_spent_secs, Utc::now())
            .await
    }

    pub async fn submit_answer_at(
        &self,
        user_id: &str,
        question_id: &str,
        value: f64,
        time_spent_secs: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, DrillError> {
        let timeout = self.config.store_timeout();
        let Some(question) = with_timeout(timeout, self.cache.take(question_id)).await? else {
            tracing::info!("submission for unknown or expired question {question_id}");
            return Ok(SubmitOutcome::NotFound {
                message: "question not found or expired".to_string(),
            });
        };

        let correct = question.check_answer(value);
        let need_rest =
            (now - question.issued_at).num_seconds() >= self.config.rest_reminder_secs as i64;

        let attempt = Attempt {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            question_id: question.id.clone(),
            expression: question.expression.clone(),
            submitted_answer: value,
            correct_answer: question.answer,
            correct,
            tier: question.tier,
            time_spent_secs,
            created_at: now,
        };

        let history_recorded = match with_timeout(timeout, self.history.append(&attempt)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    transient = e.is_transient(),
                    "failed to record attempt for question {question_id}: {e}"
                );
                false
            }
        };

        let ledger_updated = match self.ledger.increment_on_answer(user_id, correct).await {
            Ok(()) => true,
            Err(e) => {
                let transient = matches!(&e, DrillError::Store(s) if s.is_transient());
                tracing::warn!(transient, "failed to update hot score for user {user_id}: {e}");
                false
            }
        };

        let message = if correct {
            "Correct!".to_string()
        } else {
            format!(
                "Incorrect, the correct answer is {}",
                format_answer(question.answer)
            )
        };

        Ok(SubmitOutcome::Graded(GradedAnswer {
            correct,
            correct_answer: question.answer,
            message,
            need_rest,
            history_recorded,
            ledger_updated,
        }))
    }

    /// `GetRankings`: top entries of a window with display names.
    pub async fn get_rankings(
        &self,
        window: &str,
        limit: usize,
    ) -> Result<Vec<RankingEntry>, DrillError> {
        let window: Window = window.parse()?;
        let entries = self.ledger.top_n(window, limit).await?;

        let mut rankings = Vec::with_capacity(entries.len());
        for (i, entry) in entries.into_iter().enumerate() {
            let display_name = match with_timeout(
                self.config.store_timeout(),
                self.directory.display_name(&entry.user_id),
            )
            .await
            {
                Ok(Some(name)) => name,
                Ok(None) => placeholder_name(&entry.user_id),
                Err(e) => {
                    tracing::warn!("display name lookup for {} failed: {e}", entry.user_id);
                    placeholder_name(&entry.user_id)
                }
            };
            rankings.push(RankingEntry {
                rank: i + 1,
                user_id: entry.user_id,
                display_name,
                score: entry.score,
            });
        }
        Ok(rankings)
    }

    /// A user's attempts, newest first.
    pub async fn history(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
    ) -> Result<Vec<Attempt>, DrillError> {
        let attempts = with_timeout(
            self.config.store_timeout(),
            self.history.for_user(user_id, filter),
        )
        .await?;
        Ok(attempts)
    }

    pub async fn statistics(&self, user_id: &str) -> Result<UserStatistics, DrillError> {
        let stats = with_timeout(
            self.config.store_timeout(),
            user_statistics(self.history.as_ref(), user_id),
        )
        .await?;
        Ok(stats)
    }
}
