use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::interest::clear_overdue;
use crate::payments::DailyInstallment;
use crate::types::{ApplicantId, EmiId, EmiStatus, LoanId, LoanStatus};

/// identity and document details captured with an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub name: String,
    pub mobile: String,
    pub address: String,
    pub aadhaar_number: String,
    pub pan_number: String,
    pub aadhaar_image: String,
    pub pan_image: String,
}

/// a loan request before (and after) the admin decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: LoanId,
    pub applicant_id: ApplicantId,
    pub applicant: Applicant,
    pub amount: Money,
    pub status: LoanStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl LoanApplication {
    pub fn new(applicant_id: ApplicantId, applicant: Applicant, amount: Money, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            applicant_id,
            applicant,
            amount,
            status: LoanStatus::Pending,
            rejection_reason: None,
            created_at,
            decided_at: None,
        }
    }

    /// move to a new status through the loan state machine
    pub fn transition(&mut self, to: LoanStatus, at: DateTime<Utc>) -> Result<()> {
        self.status = self.status.transition(to)?;
        if self.decided_at.is_none() {
            self.decided_at = Some(at);
        }
        Ok(())
    }
}

/// an approved loan and its repayment terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub applicant_id: ApplicantId,
    pub amount: Money,
    pub total_days: u32,
    pub interest_rate: Rate,
    pub total_interest: Money,
    pub total_payable: Money,
    pub daily_emi: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: LoanStatus,
    pub approved_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub totals: LoanTotals,
}

impl Loan {
    /// recompute the cached totals from the installments, which stay authoritative
    pub fn refresh_totals(&mut self, emis: &[&Emi]) {
        self.totals = LoanTotals::from_emis(emis.iter().copied());
    }

    pub fn is_fully_paid(&self) -> bool {
        self.totals.emi_count > 0 && self.totals.paid_count == self.totals.emi_count
    }
}

/// aggregates over a loan's installments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoanTotals {
    pub total_paid: Money,
    /// unpaid principal plus interest
    pub remaining_balance: Money,
    /// unpaid penalties
    pub penalty_amount: Money,
    pub emi_count: u32,
    pub paid_count: u32,
    pub pending_count: u32,
    pub overdue_count: u32,
}

impl LoanTotals {
    pub fn from_emis<'a>(emis: impl IntoIterator<Item = &'a Emi>) -> Self {
        let mut totals = LoanTotals::default();
        for emi in emis {
            totals.emi_count += 1;
            match emi.status {
                EmiStatus::Paid => {
                    totals.paid_count += 1;
                    totals.total_paid += emi.total_amount;
                }
                EmiStatus::Pending | EmiStatus::Overdue => {
                    if emi.status == EmiStatus::Overdue {
                        totals.overdue_count += 1;
                    } else {
                        totals.pending_count += 1;
                    }
                    totals.remaining_balance += emi.base_amount();
                    totals.penalty_amount += emi.penalty_amount;
                }
            }
        }
        totals
    }

    /// everything still owed, penalties included
    pub fn outstanding(&self) -> Money {
        self.remaining_balance + self.penalty_amount
    }
}

/// a single daily installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emi {
    pub id: EmiId,
    pub loan_id: LoanId,
    pub day_number: u32,
    pub due_date: NaiveDate,
    pub principal_amount: Money,
    pub interest_amount: Money,
    pub penalty_amount: Money,
    /// principal + interest + penalty
    pub total_amount: Money,
    pub status: EmiStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// penalty days up to and including this date were waived by an admin
    pub penalty_waived_through: Option<NaiveDate>,
    /// bumped on every change, for optimistic concurrency
    pub version: u64,
}

impl Emi {
    pub fn new(loan_id: LoanId, installment: &DailyInstallment, due_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            day_number: installment.day_number,
            due_date,
            principal_amount: installment.principal_amount,
            interest_amount: installment.interest_amount,
            penalty_amount: Money::ZERO,
            total_amount: installment.total(),
            status: EmiStatus::Pending,
            paid_at: None,
            penalty_waived_through: None,
            version: 0,
        }
    }

    /// principal + interest, without penalty
    pub fn base_amount(&self) -> Money {
        self.principal_amount + self.interest_amount
    }

    /// due date has passed and the installment is still unpaid
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status.is_unpaid() && self.due_date < today
    }

    /// fails when the caller saw an older version
    pub fn check_version(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.version => Err(LoanError::StaleVersion {
                emi_id: self.id,
                expected,
                actual: self.version,
            }),
            _ => Ok(()),
        }
    }

    /// mark overdue and replace the stored penalty; returns whether anything changed
    pub fn apply_penalty(&mut self, penalty: Money) -> Result<bool> {
        let status = self.status.transition(EmiStatus::Overdue)?;
        if status == self.status && penalty == self.penalty_amount {
            return Ok(false);
        }

        self.status = status;
        self.penalty_amount = penalty;
        self.total_amount = self.base_amount() + penalty;
        self.version += 1;
        Ok(true)
    }

    /// settle the installment; false when it was already paid
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<bool> {
        if self.status.is_paid() {
            return Ok(false);
        }

        self.status = self.status.transition(EmiStatus::Paid)?;
        self.paid_at = Some(at);
        self.version += 1;
        Ok(true)
    }

    /// administrative waiver of the accrued penalty
    pub fn waive_penalty(&mut self, through: NaiveDate) -> Result<()> {
        if self.status.is_paid() {
            return Err(LoanError::InvalidTransition {
                entity: "emi",
                from: self.status.to_string(),
                to: "penalty waived".to_string(),
            });
        }

        let cleared = clear_overdue(self);
        self.penalty_amount = cleared.penalty_amount;
        self.total_amount = cleared.total_amount;
        self.penalty_waived_through = Some(through);
        self.version += 1;
        Ok(())
    }
}
