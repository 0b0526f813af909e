//! Expression composition: choosing operators and operands for a tier.
//!
//! A [`Composition`] is the operand/operator tuple a question is built
//! from. The displayed text, the internal grouping and the answer are all
//! derived from that tuple, so an answer can always be recomputed without
//! parsing the expression.

use std::fmt::Write as _;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{CompoundProfile, DivisionPolicy, GeneratorConfig, TierProfile};
use crate::error::DrillError;
use crate::model::{Operator, Tier};

/// Even divisors used by controlled-decimal division, halved to give `.5`.
const HALF_STEP_DIVISORS: [i64; 5] = [2, 4, 6, 8, 10];

/// How a composition is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// `a op b`
    Single,
    /// `(a op1 b) op2 c`
    LeftToRight,
    /// `a op1 (b op2 c)`, when `op2` outranks `op1`.
    RightFirst,
}

/// Operands and operators of an expression, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composition {
    pub operands: Vec<i64>,
    pub operators: Vec<Operator>,
}

impl Composition {
    pub fn new(operands: Vec<i64>, operators: Vec<Operator>) -> Self {
        Self {
            operands,
            operators,
        }
    }

    /// Grouping implied by operator precedence.
    pub fn grouping(&self) -> Grouping {
        match self.operators.as_slice() {
            [first, second] if second.precedence() > first.precedence() => Grouping::RightFirst,
            [_, _] => Grouping::LeftToRight,
            _ => Grouping::Single,
        }
    }

    /// Evaluate the tuple using the precedence rule.
    ///
    /// Returns `NaN` for a malformed tuple (operand count not one more than
    /// operator count, or more than two operators).
    pub fn evaluate(&self) -> f64 {
        let values: Vec<f64> = self.operands.iter().map(|&v| v as f64).collect();
        match (values.as_slice(), self.operators.as_slice()) {
            ([a, b], [op]) => op.apply(*a, *b),
            ([a, b, c], [op1, op2]) => match self.grouping() {
                Grouping::RightFirst => op1.apply(*a, op2.apply(*b, *c)),
                _ => op2.apply(op1.apply(*a, *b), *c),
            },
            _ => f64::NAN,
        }
    }

    /// Left-to-right infix text, e.g. `3 + 4 × 5`.
    pub fn expression(&self) -> String {
        let mut text = String::new();
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                if let Some(op) = self.operators.get(i - 1) {
                    let _ = write!(text, " {} ", op.symbol());
                }
            }
            let _ = write!(text, "{operand}");
        }
        text
    }

    /// Fully parenthesised text showing the evaluation order,
    /// e.g. `3 + (4 × 5)`.
    pub fn grouped_expression(&self) -> String {
        match (self.operands.as_slice(), self.operators.as_slice()) {
            ([a, b, c], [op1, op2]) => match self.grouping() {
                Grouping::RightFirst => {
                    format!("{a} {} ({b} {} {c})", op1.symbol(), op2.symbol())
                }
                _ => format!("({a} {} {b}) {} {c}", op1.symbol(), op2.symbol()),
            },
            _ => self.expression(),
        }
    }
}

/// Picks operators and operands satisfying a tier's ranges.
#[derive(Debug, Clone)]
pub struct ExpressionComposer {
    config: GeneratorConfig,
}

impl ExpressionComposer {
    /// Build a composer; fails if any range could sample a zero divisor or
    /// is otherwise malformed.
    pub fn new(config: GeneratorConfig) -> Result<Self, DrillError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Compose an expression for `tier` from the allowed `operators`.
    ///
    /// Duplicate operators are ignored. The two-operator form is only
    /// considered when the tier has a compound profile and at least two
    /// distinct operators are allowed.
    pub fn compose<R: Rng + ?Sized>(
        &self,
        tier: Tier,
        operators: &[Operator],
        rng: &mut R,
    ) -> Result<Composition, DrillError> {
        let mut allowed: Vec<Operator> = Vec::with_capacity(operators.len());
        for op in operators {
            if !allowed.contains(op) {
                allowed.push(*op);
            }
        }
        if allowed.is_empty() {
            return Err(DrillError::EmptyOperatorSet);
        }

        let profile = self.config.profile(tier);
        if let Some(compound) = &profile.compound {
            if allowed.len() >= 2 && rng.gen_bool(compound.chance) {
                let first = rng.gen_range(0..allowed.len());
                let second = (first + 1 + rng.gen_range(0..allowed.len() - 1)) % allowed.len();
                return Ok(compose_pair(
                    compound,
                    allowed[first],
                    allowed[second],
                    rng,
                ));
            }
        }

        let op = allowed[rng.gen_range(0..allowed.len())];
        Ok(compose_single(profile, op, rng))
    }
}

fn compose_single<R: Rng + ?Sized>(profile: &TierProfile, op: Operator, rng: &mut R) -> Composition {
    let (a, b) = match op {
        Operator::Add => (
            profile.additive.left.sample(rng),
            profile.additive.right.sample(rng),
        ),
        Operator::Subtract => {
            let a = profile.additive.left.sample(rng);
            let b = profile.additive.right.sample(rng);
            if a < b {
                (b, a)
            } else {
                (a, b)
            }
        }
        Operator::Multiply => (
            profile.multiplicative.left.sample(rng),
            profile.multiplicative.right.sample(rng),
        ),
        Operator::Divide => {
            let half_step =
                profile.division == DivisionPolicy::ControlledDecimal && rng.gen_bool(0.5);
            if half_step {
                let divisor = HALF_STEP_DIVISORS[rng.gen_range(0..HALF_STEP_DIVISORS.len())];
                let k = profile.quotient.sample(rng);
                (divisor * k + divisor / 2, divisor)
            } else {
                let divisor = profile.divisor.sample(rng);
                let k = profile.quotient.sample(rng);
                (divisor * k, divisor)
            }
        }
    };
    Composition::new(vec![a, b], vec![op])
}

/// Three operands joined by two distinct operators.
///
/// Divisions are synthesised from their divisor so every intermediate is
/// an integer, and every subtraction stays non-negative: a lone minuend is
/// lifted by the grouped subtrahend, a lone subtrahend is sampled no larger
/// than the grouped minuend, and `a - b` on the left is swapped.
fn compose_pair<R: Rng + ?Sized>(
    profile: &CompoundProfile,
    op1: Operator,
    op2: Operator,
    rng: &mut R,
) -> Composition {
    let range = profile.operand;
    let operands = if op2.precedence() > op1.precedence() {
        let (b, c) = match op2 {
            Operator::Divide => {
                let c = range.sample(rng);
                (c * range.sample(rng), c)
            }
            _ => (range.sample(rng), range.sample(rng)),
        };
        let inner = exact(op2, b, c);
        let mut a = range.sample(rng);
        if op1 == Operator::Subtract && a < inner {
            a += inner;
        }
        vec![a, b, c]
    } else {
        let (mut a, mut b) = match op1 {
            Operator::Divide => {
                let b = range.sample(rng);
                (b * range.sample(rng), b)
            }
            _ => (range.sample(rng), range.sample(rng)),
        };
        if op1 == Operator::Subtract && a < b {
            std::mem::swap(&mut a, &mut b);
        }
        let c = match op2 {
            Operator::Divide => {
                // Only reachable after multiply: make `a` a multiple of `c`.
                let c = range.sample(rng);
                a = c * range.sample(rng);
                c
            }
            Operator::Subtract => {
                let left = exact(op1, a, b);
                let upper = range.max.min(left).max(range.min);
                rng.gen_range(range.min..=upper)
            }
            _ => range.sample(rng),
        };
        vec![a, b, c]
    };
    Composition::new(operands, vec![op1, op2])
}

/// Integer result of an operation whose operands were chosen to divide evenly.
fn exact(op: Operator, a: i64, b: i64) -> i64 {
    match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        Operator::Divide => a / b,
    }
}
