//! Per-user practice statistics derived from history.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::{Attempt, Tier};
use crate::traits::{HistoryFilter, HistoryStore};

/// Practice summary for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    /// Distinct question ids attempted.
    pub total_questions: u64,
    pub easy_questions: u64,
    pub medium_questions: u64,
    pub hard_questions: u64,
    /// Every graded submission, including repeats.
    pub total_attempts: u64,
    pub correct_answers: u64,
    /// `correct_answers / total_attempts × 100`, or 0 with no attempts.
    pub accuracy: f64,
}

/// Accuracy as a percentage; zero when there is nothing to divide by.
pub fn accuracy_percent(correct: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// Count attempts and correct answers.
pub fn tally(attempts: &[Attempt]) -> (u64, u64) {
    let correct = attempts.iter().filter(|a| a.correct).count() as u64;
    (attempts.len() as u64, correct)
}

/// Gather a user's statistics from the history store.
pub async fn user_statistics(
    history: &dyn HistoryStore,
    user_id: &str,
) -> Result<UserStatistics, StoreError> {
    let attempts = history.for_user(user_id, &HistoryFilter::default()).await?;
    let (total_attempts, correct_answers) = tally(&attempts);

    Ok(UserStatistics {
        total_questions: history.distinct_questions(user_id, None).await?,
        easy_questions: history.distinct_questions(user_id, Some(Tier::Easy)).await?,
        medium_questions: history
            .distinct_questions(user_id, Some(Tier::Medium))
            .await?,
        hard_questions: history.distinct_questions(user_id, Some(Tier::Hard)).await?,
        total_attempts,
        correct_answers,
        accuracy: accuracy_percent(correct_answers, total_attempts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_with_no_attempts_is_zero() {
        assert_eq!(accuracy_percent(0, 0), 0.0);
    }

    #[test]
    fn accuracy_is_a_percentage() {
        assert_eq!(accuracy_percent(3, 4), 75.0);
        assert_eq!(accuracy_percent(5, 5), 100.0);
    }

    #[test]
    fn tally_counts_correct() {
        assert_eq!(tally(&[]), (0, 0));
    }
}
