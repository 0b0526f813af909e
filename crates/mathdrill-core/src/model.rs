//! Core data model types for mathdrill.
//!
//! Tiers, operators and leaderboard windows are closed enums; questions,
//! attempts and score entries are the records that flow between the
//! generator, the stores and the ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::composer::Composition;
use crate::error::DrillError;

/// Difficulty tier controlling operand magnitude and composition shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Easy,
    Medium,
    Hard,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Easy, Tier::Medium, Tier::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Easy => "easy",
            Tier::Medium => "medium",
            Tier::Hard => "hard",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Tier::Easy),
            "medium" => Ok(Tier::Medium),
            "hard" => Ok(Tier::Hard),
            other => Err(DrillError::UnknownTier(other.to_string())),
        }
    }
}

/// One of the four arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// The full operator set, in canonical order.
    pub const ALL: [Operator; 4] = [
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
    ];

    /// Canonical configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Subtract => "subtract",
            Operator::Multiply => "multiply",
            Operator::Divide => "divide",
        }
    }

    /// Symbol used in displayed expressions.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "×",
            Operator::Divide => "÷",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Operator::Add => "Addition",
            Operator::Subtract => "Subtraction",
            Operator::Multiply => "Multiplication",
            Operator::Divide => "Division",
        }
    }

    /// Binding strength: multiply/divide outrank add/subtract.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Subtract => 1,
            Operator::Multiply | Operator::Divide => 2,
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Add => a + b,
            Operator::Subtract => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => a / b,
        }
    }

    /// Parse a list of operator names, failing on the first unknown one.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Operator>, DrillError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" | "+" => Ok(Operator::Add),
            "subtract" | "-" => Ok(Operator::Subtract),
            "multiply" | "*" | "×" => Ok(Operator::Multiply),
            "divide" | "/" | "÷" => Ok(Operator::Divide),
            other => Err(DrillError::UnknownOperator(other.to_string())),
        }
    }
}

/// An independent leaderboard aggregation horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Hourly,
    Daily,
    Weekly,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Hourly => "hourly",
            Window::Daily => "daily",
            Window::Weekly => "weekly",
        }
    }

    /// Key of the ranked structure backing this window.
    pub fn key(&self) -> String {
        format!("rank:{}", self.as_str())
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = DrillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Ok(Window::Hourly),
            "daily" => Ok(Window::Daily),
            "weekly" => Ok(Window::Weekly),
            other => Err(DrillError::UnknownWindow(other.to_string())),
        }
    }
}

/// An issued practice problem, held in the question cache until answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Opaque identifier, unique per issuance.
    pub id: String,
    /// Left-to-right infix text shown to the student.
    pub expression: String,
    /// Exact answer computed from `composition`.
    pub answer: f64,
    pub tier: Tier,
    /// Operators the question was generated from, in request order.
    pub operators: Vec<Operator>,
    /// The operand/operator tuple the expression and answer derive from.
    pub composition: Composition,
    pub time_limit_secs: u32,
    pub issued_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl Question {
    /// Grade a submitted value.
    ///
    /// Two-decimal equality is used only when the *first* operator in the
    /// question's operator list is divide, regardless of whether division
    /// appears in the generated expression. Every other question requires
    /// exact equality.
    pub fn check_answer(&self, value: f64) -> bool {
        if self.operators.first() == Some(&Operator::Divide) {
            return format!("{:.2}", self.answer) == format!("{:.2}", value);
        }
        self.answer == value
    }

    /// The client-facing projection; never carries the answer.
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            expression: self.expression.clone(),
            tier: self.tier,
            time_limit_secs: self.time_limit_secs,
        }
    }
}

/// What `GetQuestion` returns to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub expression: String,
    pub tier: Tier,
    pub time_limit_secs: u32,
}

/// One graded submission. Immutable once appended to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: String,
    pub question_id: String,
    pub expression: String,
    pub submitted_answer: f64,
    pub correct_answer: f64,
    pub correct: bool,
    pub tier: Tier,
    /// Seconds the client reports spending on the question.
    #[serde(default)]
    pub time_spent_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A user's standing in one leaderboard window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub user_id: String,
    pub window: Window,
    pub score: f64,
    pub last_updated: DateTime<Utc>,
}

/// One row of `GetRankings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    pub user_id: String,
    pub display_name: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(operators: Vec<Operator>, answer: f64) -> Question {
        Question {
            id: "q-1".into(),
            expression: "7 ÷ 2".into(),
            answer,
            tier: Tier::Medium,
            operators: operators.clone(),
            composition: Composition::new(vec![7, 2], vec![Operator::Divide]),
            time_limit_secs: 20,
            issued_at: Utc::now(),
            ttl_secs: 1800,
        }
    }

    #[test]
    fn tier_display_and_parse() {
        assert_eq!(Tier::Hard.to_string(), "hard");
        assert_eq!("Medium".parse::<Tier>().unwrap(), Tier::Medium);
        assert!(matches!(
            "extreme".parse::<Tier>(),
            Err(DrillError::UnknownTier(name)) if name == "extreme"
        ));
    }

    #[test]
    fn operator_parse_accepts_names_and_symbols() {
        assert_eq!("divide".parse::<Operator>().unwrap(), Operator::Divide);
        assert_eq!("*".parse::<Operator>().unwrap(), Operator::Multiply);
        assert_eq!("÷".parse::<Operator>().unwrap(), Operator::Divide);
        assert_eq!(" ADD ".parse::<Operator>().unwrap(), Operator::Add);
        assert!(matches!(
            "modulo".parse::<Operator>(),
            Err(DrillError::UnknownOperator(_))
        ));
    }

    #[test]
    fn parse_list_fails_on_first_unknown() {
        let ops = Operator::parse_list(&["add", "multiply"]).unwrap();
        assert_eq!(ops, vec![Operator::Add, Operator::Multiply]);
        assert!(Operator::parse_list(&["add", "power"]).is_err());
    }

    #[test]
    fn precedence_ranks_multiplicative_above_additive() {
        assert!(Operator::Multiply.precedence() > Operator::Add.precedence());
        assert_eq!(
            Operator::Divide.precedence(),
            Operator::Multiply.precedence()
        );
    }

    #[test]
    fn window_keys() {
        assert_eq!(Window::Hourly.key(), "rank:hourly");
        assert_eq!("daily".parse::<Window>().unwrap(), Window::Daily);
        assert!("monthly".parse::<Window>().is_err());
    }

    #[test]
    fn divide_first_uses_two_decimal_equality() {
        let q = question(vec![Operator::Divide, Operator::Add], 3.5);
        assert!(q.check_answer(3.5));
        assert!(q.check_answer(3.501));
        assert!(!q.check_answer(3.6));
    }

    #[test]
    fn divide_not_first_requires_exact_equality() {
        let q = question(vec![Operator::Add, Operator::Divide], 3.5);
        assert!(q.check_answer(3.5));
        assert!(!q.check_answer(3.501));
    }

    #[test]
    fn view_hides_answer() {
        let q = question(vec![Operator::Divide], 3.5);
        let json = serde_json::to_string(&q.view()).unwrap();
        assert!(!json.contains("answer"));
        assert!(json.contains("\"expression\":\"7 ÷ 2\""));
    }
}
