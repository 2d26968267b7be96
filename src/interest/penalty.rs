use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::decimal::{Money, Rate};
use crate::state::Emi;

/// engine for overdue penalties on daily installments
#[derive(Debug, Clone)]
pub struct PenaltyEngine {
    /// share of the installment's principal charged per overdue day
    pub penalty_rate: Rate,
}

impl PenaltyEngine {
    pub fn new(penalty_rate: Rate) -> Self {
        Self { penalty_rate }
    }

    pub fn from_config(pricing: &PricingConfig) -> Self {
        Self::new(pricing.penalty_rate)
    }

    /// ceil(principal × rate); zero for a non-positive principal
    pub fn penalty_per_day(&self, principal_amount: Money) -> Money {
        if !principal_amount.is_positive() {
            return Money::ZERO;
        }
        Money::from_decimal((principal_amount.as_decimal() * self.penalty_rate.as_decimal()).ceil())
    }

    /// canonical penalty for an installment overdue by `days_overdue` days
    ///
    /// Always recomputed from the day count, never accumulated.
    pub fn accrue_penalty(&self, principal_amount: Money, days_overdue: u32) -> Money {
        self.penalty_per_day(principal_amount).times(days_overdue)
    }

    /// recover the day count behind a stored penalty, for display only
    ///
    /// Approximate: a penalty not produced by `accrue_penalty` (or partly waived)
    /// is rounded to the nearest whole day.
    pub fn days_overdue_from_penalty(&self, principal_amount: Money, penalty_amount: Money) -> u32 {
        let per_day = self.penalty_per_day(principal_amount);
        if per_day.is_zero() || !penalty_amount.is_positive() {
            return 0;
        }

        (penalty_amount.as_decimal() / per_day.as_decimal())
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .unwrap_or(0)
    }

    /// penalty an installment should carry on `today`, honoring any waiver
    pub fn calculate(&self, emi: &Emi, today: NaiveDate) -> PenaltyCalculation {
        let days_overdue = days_overdue(emi.due_date, today);
        let charged_from = match emi.penalty_waived_through {
            Some(waived) if waived > emi.due_date => waived,
            _ => emi.due_date,
        };
        let days_charged = days_overdue_since(charged_from, today);
        let penalty_per_day = self.penalty_per_day(emi.principal_amount);

        PenaltyCalculation {
            days_overdue,
            days_charged,
            penalty_per_day,
            penalty_amount: penalty_per_day.times(days_charged),
            waiver_applied: days_charged < days_overdue,
        }
    }

    /// the "Penalty (X × Y days)" line shown next to an installment
    pub fn breakdown(&self, emi: &Emi) -> Option<PenaltyBreakdown> {
        if !emi.penalty_amount.is_positive() {
            return None;
        }

        Some(PenaltyBreakdown {
            penalty_per_day: self.penalty_per_day(emi.principal_amount),
            days_overdue: self.days_overdue_from_penalty(emi.principal_amount, emi.penalty_amount),
            base_amount: emi.base_amount(),
            penalty_amount: emi.penalty_amount,
        })
    }
}

impl Default for PenaltyEngine {
    fn default() -> Self {
        Self::new(Rate::from_percentage(50))
    }
}

/// calendar days after the due date; zero while not yet past due
pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> u32 {
    days_overdue_since(due_date, today)
}

fn days_overdue_since(from: NaiveDate, today: NaiveDate) -> u32 {
    let days = (today - from).num_days();
    if days <= 0 {
        0
    } else {
        u32::try_from(days).unwrap_or(u32::MAX)
    }
}

/// waive the penalty: amounts reset, status untouched
pub fn clear_overdue(emi: &Emi) -> Emi {
    let mut cleared = emi.clone();
    cleared.penalty_amount = Money::ZERO;
    cleared.total_amount = emi.base_amount();
    cleared
}

/// penalty calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyCalculation {
    pub days_overdue: u32,
    pub days_charged: u32,
    pub penalty_per_day: Money,
    pub penalty_amount: Money,
    pub waiver_applied: bool,
}

/// display breakdown of a stored penalty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub penalty_per_day: Money,
    pub days_overdue: u32,
    pub base_amount: Money,
    pub penalty_amount: Money,
}
