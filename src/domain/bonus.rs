//! Conversion-tiered bonus and the personal-rate negotiation state machine.
//!
//! The department earns a bonus per order from the tier table; the pool is then split
//! between operators at a per-order personal rate a human proposes and refines until
//! the resulting split looks right. Whatever operators don't get goes to the head.

use crate::domain::entities::DatabaseStatistic;
use std::fmt::Write as _;

/// One row of the tier table: conversion grade (percent) → bonus per order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonusTier {
    pub grade: f64,
    pub bonus_per_order: f64,
}

/// Tier table, kept sorted by grade descending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BonusTiers {
    tiers: Vec<BonusTier>,
}

impl BonusTiers {
    pub fn new(tiers: impl IntoIterator<Item = BonusTier>) -> Self {
        let mut tiers: Vec<BonusTier> = tiers.into_iter().collect();
        tiers.sort_by(|a, b| b.grade.total_cmp(&a.grade));
        Self { tiers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BonusTier> {
        self.tiers.iter()
    }

    /// First tier (highest grade first) whose grade is strictly exceeded by a
    /// conversion ratio (0..1).
    ///
    /// Grades are scaled down rather than the ratio up: 7/25 and 28/100 are the same
    /// f64, while `7.0 / 25.0 * 100.0` lands just above 28.
    pub fn select(&self, conversion: f64) -> Option<&BonusTier> {
        self.tiers.iter().find(|t| conversion > t.grade / 100.0)
    }

    /// Bonus per order for a department conversion ratio (0..1). 0 when no tier applies.
    pub fn bonus_per_order(&self, conversion: f64) -> f64 {
        self.select(conversion)
            .map(|t| t.bonus_per_order)
            .unwrap_or(0.0)
    }
}

/// Round half to even: `2.5 → 2`, `3.5 → 4`.
pub fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

/// Department bonus pool.
pub fn bonus_pool(bonus_per_order: f64, total_orders: usize) -> f64 {
    round_half_even(bonus_per_order * total_orders as f64)
}

/// Bonus of one operator at a personal per-order rate, always a multiple of 100.
///
/// Operators whose conversion does not exceed `min_conversion` get nothing.
pub fn operator_bonus(
    personal_rate: f64,
    orders: usize,
    conversion: f64,
    min_conversion: f64,
) -> f64 {
    if conversion <= min_conversion {
        return 0.0;
    }
    let raw = round_half_even(personal_rate * orders as f64) as i64;
    (raw / 100 * 100) as f64
}

/// Bonus of one operator in a split.
#[derive(Debug, Clone, PartialEq)]
pub struct BonusLine {
    pub operator: String,
    pub bonus: f64,
}

/// A computed split of the pool at a given personal rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BonusSplit {
    pub pool: f64,
    pub personal_rate: f64,
    pub lines: Vec<BonusLine>,
    /// `pool - Σ operator bonuses`. Negative when the split exceeds the pool.
    pub head_bonus: f64,
}

impl BonusSplit {
    /// The split when there is nothing to negotiate: every operator gets 0.
    pub fn empty(pool: f64, operators: &[DatabaseStatistic]) -> Self {
        Self {
            pool,
            personal_rate: 0.0,
            lines: operators
                .iter()
                .map(|s| BonusLine {
                    operator: s.operator.clone(),
                    bonus: 0.0,
                })
                .collect(),
            head_bonus: pool,
        }
    }

    pub fn operators_total(&self) -> f64 {
        self.lines.iter().map(|l| l.bonus).sum()
    }

    pub fn bonus_of(&self, operator: &str) -> f64 {
        self.lines
            .iter()
            .find(|l| l.operator == operator)
            .map(|l| l.bonus)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    operator: String,
    orders: usize,
    conversion: f64,
}

/// Where the negotiation currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationState {
    AwaitingRate,
    AwaitingConfirmation(BonusSplit),
    Accepted(BonusSplit),
}

/// Result of feeding one line of input to the negotiation.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationStep {
    /// A new split was computed; show it and ask again.
    Proposal(BonusSplit),
    /// The last proposal was accepted.
    Accepted(BonusSplit),
}

/// Personal-rate negotiation over a department bonus pool.
///
/// `AwaitingRate → AwaitingConfirmation → {Accepted | AwaitingConfirmation}`.
/// A numeric input proposes a rate, and while a proposal is pending it replaces
/// that proposal. Anything else accepts the last proposed rate (0 when none was
/// proposed).
#[derive(Debug, Clone)]
pub struct Negotiation {
    pool: f64,
    bonus_per_order: f64,
    min_conversion: f64,
    candidates: Vec<Candidate>,
    last_rate: Option<f64>,
    state: NegotiationState,
}

impl Negotiation {
    pub fn new(
        pool: f64,
        bonus_per_order: f64,
        operators: &[DatabaseStatistic],
        min_conversion: f64,
    ) -> Self {
        Self {
            pool,
            bonus_per_order,
            min_conversion,
            candidates: operators
                .iter()
                .map(|s| Candidate {
                    operator: s.operator.clone(),
                    orders: s.orders_count,
                    conversion: s.conversion,
                })
                .collect(),
            last_rate: None,
            state: NegotiationState::AwaitingRate,
        }
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.state, NegotiationState::Accepted(_))
    }

    /// Message opening the negotiation.
    pub fn opening_message(&self) -> String {
        format!(
            "Поздравляю, конверсии хватило на премию. Премия за заказ {}, суммарная премия {:.2}. Сколько раздать на брата?",
            self.bonus_per_order, self.pool
        )
    }

    /// Feed one line of input.
    pub fn submit(&mut self, input: &str) -> NegotiationStep {
        if let NegotiationState::Accepted(split) = &self.state {
            return NegotiationStep::Accepted(split.clone());
        }
        match parse_rate(input) {
            Some(rate) => {
                self.last_rate = Some(rate);
                let split = self.split(rate);
                self.state = NegotiationState::AwaitingConfirmation(split.clone());
                NegotiationStep::Proposal(split)
            }
            None => NegotiationStep::Accepted(self.accept()),
        }
    }

    /// Accept the last proposed rate, or 0 when nothing was proposed.
    pub fn accept(&mut self) -> BonusSplit {
        if let NegotiationState::Accepted(split) = &self.state {
            return split.clone();
        }
        let split = self.split(self.last_rate.unwrap_or(0.0));
        self.state = NegotiationState::Accepted(split.clone());
        split
    }

    /// Split the pool at `rate` without changing state.
    pub fn split(&self, rate: f64) -> BonusSplit {
        let lines: Vec<BonusLine> = self
            .candidates
            .iter()
            .map(|c| BonusLine {
                operator: c.operator.clone(),
                bonus: operator_bonus(rate, c.orders, c.conversion, self.min_conversion),
            })
            .collect();
        let distributed: f64 = lines.iter().map(|l| l.bonus).sum();
        BonusSplit {
            pool: self.pool,
            personal_rate: rate,
            lines,
            head_bonus: self.pool - distributed,
        }
    }
}

/// Render a proposal for the human on the other end of the channel.
pub fn format_proposal(split: &BonusSplit, head_name: &str) -> String {
    let mut out = String::new();
    for line in &split.lines {
        let _ = writeln!(out, "{} {}", line.operator, line.bonus);
    }
    let _ = writeln!(out, "{} {}", head_name, split.head_bonus);
    out.push_str("Годится или переиграть?");
    out
}

/// Parse a rate; `,` is accepted as decimal separator. Non-finite values are rejected.
pub fn parse_rate(input: &str) -> Option<f64> {
    let normalized = input.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
