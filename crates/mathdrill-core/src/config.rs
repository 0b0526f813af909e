//! Configuration: per-tier operand ranges, service deadlines, ledger tuning
//! and the history backend.
//!
//! Every field has a default, so an empty TOML file is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::DrillError;
use crate::model::{Operator, Tier, Window};

/// Largest value any configured range may reach.
///
/// Composition multiplies at most two sampled values and adds a third, so
/// with this cap every intermediate stays far inside `i64`.
pub const MAX_OPERAND: i64 = 1_000_000;

/// Inclusive integer range operands are sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandRange {
    pub min: i64,
    pub max: i64,
}

impl OperandRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(self.min..=self.max)
    }

    fn check(&self, what: &str, floor: i64) -> Result<(), DrillError> {
        if self.max > MAX_OPERAND {
            return Err(DrillError::InvalidConfig(format!(
                "{what}: values must be at most {MAX_OPERAND}, got {}",
                self.max
            )));
        }
        if self.min > self.max {
            return Err(DrillError::InvalidConfig(format!(
                "{what}: min {} exceeds max {}",
                self.min, self.max
            )));
        }
        if self.min < floor {
            return Err(DrillError::InvalidConfig(format!(
                "{what}: values must be at least {floor}, got {}",
                self.min
            )));
        }
        Ok(())
    }
}

/// Left/right operand ranges for a binary operator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandPair {
    pub left: OperandRange,
    pub right: OperandRange,
}

impl OperandPair {
    pub const fn symmetric(min: i64, max: i64) -> Self {
        Self {
            left: OperandRange::new(min, max),
            right: OperandRange::new(min, max),
        }
    }
}

/// How single-operator divisions pick their quotient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisionPolicy {
    /// Dividend is always `divisor × k`.
    #[default]
    Exact,
    /// Half of the divisions land on `k + 0.5` using an even divisor.
    ControlledDecimal,
}

/// Settings for three-operand, two-operator expressions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundProfile {
    /// Range for all three operands. Also used as divisor range, so must
    /// start at 1 or above.
    pub operand: OperandRange,
    /// Probability of choosing the two-operator form when at least two
    /// operators are allowed.
    #[serde(default = "default_compound_chance")]
    pub chance: f64,
}

fn default_compound_chance() -> f64 {
    0.5
}

/// Operand ranges and defaults for one difficulty tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    /// Ranges for add and subtract.
    pub additive: OperandPair,
    /// Ranges for multiply.
    pub multiplicative: OperandPair,
    pub divisor: OperandRange,
    /// Range of `k` in `dividend = divisor × k`.
    pub quotient: OperandRange,
    #[serde(default)]
    pub division: DivisionPolicy,
    #[serde(default)]
    pub compound: Option<CompoundProfile>,
    pub time_limit_secs: u32,
}

impl TierProfile {
    /// Single-digit operands.
    pub fn easy() -> Self {
        Self {
            additive: OperandPair::symmetric(1, 9),
            multiplicative: OperandPair::symmetric(1, 9),
            divisor: OperandRange::new(1, 9),
            quotient: OperandRange::new(1, 9),
            division: DivisionPolicy::Exact,
            compound: None,
            time_limit_secs: 10,
        }
    }

    /// Two-digit addition/subtraction, times tables up to 12.
    pub fn medium() -> Self {
        Self {
            additive: OperandPair::symmetric(10, 99),
            multiplicative: OperandPair::symmetric(2, 12),
            divisor: OperandRange::new(10, 99),
            quotient: OperandRange::new(1, 9),
            division: DivisionPolicy::Exact,
            compound: None,
            time_limit_secs: 20,
        }
    }

    /// Three-digit against two-digit operands, or a two-operator expression.
    pub fn hard() -> Self {
        Self {
            additive: OperandPair {
                left: OperandRange::new(100, 999),
                right: OperandRange::new(10, 99),
            },
            multiplicative: OperandPair {
                left: OperandRange::new(100, 999),
                right: OperandRange::new(10, 99),
            },
            divisor: OperandRange::new(10, 99),
            quotient: OperandRange::new(1, 9),
            division: DivisionPolicy::Exact,
            compound: Some(CompoundProfile {
                operand: OperandRange::new(1, 9),
                chance: default_compound_chance(),
            }),
            time_limit_secs: 30,
        }
    }

    fn validate(&self, tier: Tier) -> Result<(), DrillError> {
        let at = |field: &str| format!("{tier}.{field}");
        self.additive.left.check(&at("additive.left"), 0)?;
        self.additive.right.check(&at("additive.right"), 0)?;
        self.multiplicative.left.check(&at("multiplicative.left"), 0)?;
        self.multiplicative.right.check(&at("multiplicative.right"), 0)?;
        self.divisor.check(&at("divisor"), 1)?;
        self.quotient.check(&at("quotient"), 1)?;
        if let Some(compound) = &self.compound {
            compound.operand.check(&at("compound.operand"), 1)?;
            if !(0.0..=1.0).contains(&compound.chance) {
                return Err(DrillError::InvalidConfig(format!(
                    "{}: chance must be within [0, 1], got {}",
                    at("compound"),
                    compound.chance
                )));
            }
        }
        if self.time_limit_secs == 0 {
            return Err(DrillError::InvalidConfig(format!(
                "{}: must be positive",
                at("time_limit_secs")
            )));
        }
        Ok(())
    }
}

/// Generator configuration: one profile per tier plus operator enablement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "TierProfile::easy")]
    pub easy: TierProfile,
    #[serde(default = "TierProfile::medium")]
    pub medium: TierProfile,
    #[serde(default = "TierProfile::hard")]
    pub hard: TierProfile,
    /// Operators that may not be requested and are left out of the default set.
    #[serde(default)]
    pub disabled_operators: Vec<Operator>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            easy: TierProfile::easy(),
            medium: TierProfile::medium(),
            hard: TierProfile::hard(),
            disabled_operators: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn profile(&self, tier: Tier) -> &TierProfile {
        match tier {
            Tier::Easy => &self.easy,
            Tier::Medium => &self.medium,
            Tier::Hard => &self.hard,
        }
    }

    /// Operators that are not disabled, in canonical order.
    pub fn enabled_operators(&self) -> Vec<Operator> {
        Operator::ALL
            .into_iter()
            .filter(|op| !self.disabled_operators.contains(op))
            .collect()
    }

    pub fn validate(&self) -> Result<(), DrillError> {
        for tier in Tier::ALL {
            self.profile(tier).validate(tier)?;
        }
        if self.enabled_operators().is_empty() {
            return Err(DrillError::InvalidConfig(
                "every operator is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deadlines and lifetimes used by the drill service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_question_ttl")]
    pub question_ttl_secs: u64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    /// Time on a single question after which grading suggests a break.
    #[serde(default = "default_rest_reminder")]
    pub rest_reminder_secs: u64,
}

fn default_question_ttl() -> u64 {
    30 * 60
}
fn default_store_timeout() -> u64 {
    2000
}
fn default_rest_reminder() -> u64 {
    10 * 60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            question_ttl_secs: default_question_ttl(),
            store_timeout_ms: default_store_timeout(),
            rest_reminder_secs: default_rest_reminder(),
        }
    }
}

impl ServiceConfig {
    pub fn question_ttl(&self) -> Duration {
        Duration::from_secs(self.question_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Score ledger tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Windows every increment and rebuild is applied to.
    #[serde(default = "default_windows")]
    pub windows: Vec<Window>,
    /// Added for every graded answer.
    #[serde(default = "default_base_increment")]
    pub base_increment: f64,
    /// Added on top of the base for a correct answer.
    #[serde(default = "default_correct_bonus")]
    pub correct_bonus: f64,
    /// Time scale of the exponential decay applied during rebuilds.
    #[serde(default = "default_decay_secs")]
    pub decay_secs: f64,
    #[serde(default = "default_rebuild_interval")]
    pub rebuild_interval_secs: u64,
    /// Run one rebuild immediately when the scheduler starts.
    #[serde(default)]
    pub rebuild_on_start: bool,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
}

fn default_windows() -> Vec<Window> {
    vec![Window::Hourly, Window::Daily]
}
fn default_base_increment() -> f64 {
    50.0
}
fn default_correct_bonus() -> f64 {
    100.0
}
fn default_decay_secs() -> f64 {
    24.0 * 60.0 * 60.0
}
fn default_rebuild_interval() -> u64 {
    5 * 60 * 60
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            windows: default_windows(),
            base_increment: default_base_increment(),
            correct_bonus: default_correct_bonus(),
            decay_secs: default_decay_secs(),
            rebuild_interval_secs: default_rebuild_interval(),
            rebuild_on_start: false,
            store_timeout_ms: default_store_timeout(),
        }
    }
}

impl LedgerConfig {
    pub fn rebuild_interval(&self) -> Duration {
        Duration::from_secs(self.rebuild_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), DrillError> {
        if self.windows.is_empty() {
            return Err(DrillError::InvalidConfig(
                "ledger.windows must name at least one window".to_string(),
            ));
        }
        if let Some((i, window)) = self
            .windows
            .iter()
            .enumerate()
            .find(|&(i, w)| self.windows[..i].contains(w))
        {
            return Err(DrillError::InvalidConfig(format!(
                "ledger.windows lists {window} more than once (entry {})",
                i + 1
            )));
        }
        if self.decay_secs.is_nan() || self.decay_secs <= 0.0 {
            return Err(DrillError::InvalidConfig(format!(
                "ledger.decay_secs must be positive, got {}",
                self.decay_secs
            )));
        }
        if self.rebuild_interval_secs == 0 {
            return Err(DrillError::InvalidConfig(
                "ledger.rebuild_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where graded attempts are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum HistoryConfig {
    #[default]
    Memory,
    Sqlite { path: PathBuf },
}

/// Top-level mathdrill configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl DrillConfig {
    pub fn validate(&self) -> Result<(), DrillError> {
        self.generator.validate()?;
        self.ledger.validate()
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `mathdrill.toml` in the current directory
/// 2. `~/.config/mathdrill/config.toml`
///
/// `MATHDRILL_DB_PATH` switches history to SQLite at that path.
pub fn load_config_from(path: Option<&Path>) -> Result<DrillConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("mathdrill.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => DrillConfig::default(),
    };

    if let Ok(db_path) = std::env::var("MATHDRILL_DB_PATH") {
        config.history = HistoryConfig::Sqlite {
            path: PathBuf::from(db_path),
        };
    }

    if let HistoryConfig::Sqlite { path } = &config.history {
        let resolved = resolve_env_vars(&path.to_string_lossy());
        config.history = HistoryConfig::Sqlite {
            path: PathBuf::from(resolved),
        };
    }

    config.validate().context("configuration rejected")?;
    Ok(config)
}

/// Parse a TOML document into a config without touching the environment.
pub fn parse_config(content: &str) -> Result<DrillConfig> {
    let config = toml::from_str::<DrillConfig>(content)?;
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("mathdrill"))
}
