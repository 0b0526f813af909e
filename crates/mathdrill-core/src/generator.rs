//! Problem generation: resolves request defaults, delegates to the
//! composer and stamps identity and lifetime onto the result.
//!
//! Generation performs no I/O. Callers place the returned [`Question`] in a
//! question cache themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::composer::{Composition, ExpressionComposer};
use crate::config::GeneratorConfig;
use crate::error::DrillError;
use crate::model::{Operator, Question, Tier};

/// Lifetime of an unanswered question unless the request overrides it.
pub const DEFAULT_QUESTION_TTL: Duration = Duration::from_secs(30 * 60);

/// Parameters of a single generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// `None` picks a tier uniformly at random.
    pub tier: Option<Tier>,
    /// Empty means every enabled operator.
    pub operators: Vec<Operator>,
    /// Zero or negative applies the tier default.
    pub time_limit_secs: i64,
    /// Overrides [`DEFAULT_QUESTION_TTL`].
    pub ttl: Option<Duration>,
    /// Per-request scope mixed into the question id, usually the user id.
    pub scope: Option<String>,
}

impl GenerateRequest {
    /// Build a request from boundary strings, rejecting unknown names.
    pub fn parse<S: AsRef<str>>(
        tier: Option<&str>,
        operators: &[S],
        time_limit_secs: i64,
    ) -> Result<Self, DrillError> {
        let tier = match tier.map(str::trim).filter(|t| !t.is_empty()) {
            Some(name) => Some(name.parse()?),
            None => None,
        };
        Ok(Self {
            tier,
            operators: Operator::parse_list(operators)?,
            time_limit_secs,
            ..Default::default()
        })
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Turns requests into questions.
#[derive(Debug)]
pub struct ProblemGenerator {
    composer: ExpressionComposer,
    sequence: AtomicU64,
}

impl ProblemGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, DrillError> {
        Ok(Self {
            composer: ExpressionComposer::new(config)?,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        self.composer.config()
    }

    /// Generate a question issued now.
    ///
    /// `rng` is owned by the caller; concurrent requests should each pass
    /// their own source.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        request: &GenerateRequest,
        rng: &mut R,
    ) -> Result<Question, DrillError> {
        self.generate_at(request, Utc::now(), rng)
    }

    /// Generate a question with an explicit issuance time.
    pub fn generate_at<R: Rng + ?Sized>(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Question, DrillError> {
        let operators = self.resolve_operators(&request.operators)?;
        let tier = request
            .tier
            .unwrap_or_else(|| Tier::ALL[rng.gen_range(0..Tier::ALL.len())]);

        let composition = self.composer.compose(tier, &operators, rng)?;
        let question = self.assemble(request, tier, operators, composition, now);

        tracing::debug!(
            id = %question.id,
            tier = %question.tier,
            grouped = %question.composition.grouped_expression(),
            answer = question.answer,
            "generated question"
        );
        Ok(question)
    }

    /// Stamp identity, limits and lifetime onto a composition.
    pub fn assemble(
        &self,
        request: &GenerateRequest,
        tier: Tier,
        operators: Vec<Operator>,
        composition: Composition,
        now: DateTime<Utc>,
    ) -> Question {
        let time_limit_secs = if request.time_limit_secs <= 0 {
            self.config().profile(tier).time_limit_secs
        } else {
            u32::try_from(request.time_limit_secs).unwrap_or(u32::MAX)
        };
        let ttl = request.ttl.unwrap_or(DEFAULT_QUESTION_TTL);

        Question {
            id: self.next_id(request.scope.as_deref(), now),
            expression: composition.expression(),
            answer: composition.evaluate(),
            tier,
            operators,
            composition,
            time_limit_secs,
            issued_at: now,
            ttl_secs: ttl.as_secs(),
        }
    }

    fn resolve_operators(&self, requested: &[Operator]) -> Result<Vec<Operator>, DrillError> {
        if requested.is_empty() {
            return Ok(self.config().enabled_operators());
        }
        if let Some(op) = requested
            .iter()
            .find(|op| self.config().disabled_operators.contains(op))
        {
            return Err(DrillError::DisabledOperator(op.name().to_string()));
        }
        Ok(requested.to_vec())
    }

    /// `{scope}-{unix nanos}-{sequence}`; the sequence separates questions
    /// generated in the same nanosecond by this process.
    fn next_id(&self, scope: Option<&str>, now: DateTime<Utc>) -> String {
        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros() * 1000);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{nanos}-{seq}", scope.unwrap_or("anon"))
    }
}
