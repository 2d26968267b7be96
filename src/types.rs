use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{LoanError, Result};

/// unique identifier for a loan (shared by the application and the approved loan)
pub type LoanId = Uuid;

/// unique identifier for a single daily installment
pub type EmiId = Uuid;

/// unique identifier for the borrower
pub type ApplicantId = Uuid;

/// loan lifecycle: pending -> approved -> completed, or pending -> rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// submitted, waiting for an admin decision
    Pending,
    /// approved, schedule generated and repaying
    Approved,
    /// rejected by an admin, terminal
    Rejected,
    /// every installment paid, terminal
    Completed,
}

impl LoanStatus {
    /// the single transition function for loans
    pub fn transition(self, to: LoanStatus) -> Result<LoanStatus> {
        use LoanStatus::*;
        match (self, to) {
            (Pending, Approved) | (Pending, Rejected) | (Approved, Completed) => Ok(to),
            _ => Err(LoanError::InvalidTransition {
                entity: "loan",
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, LoanStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Rejected | LoanStatus::Completed)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// emi lifecycle: pending -> overdue -> paid, or pending -> paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmiStatus {
    /// not yet due, or due today
    Pending,
    /// due date passed without payment, accruing penalty
    Overdue,
    /// settled, terminal
    Paid,
}

impl EmiStatus {
    /// the single transition function for installments
    ///
    /// overdue -> overdue is allowed so repeated sweeps stay idempotent.
    pub fn transition(self, to: EmiStatus) -> Result<EmiStatus> {
        use EmiStatus::*;
        match (self, to) {
            (Pending, Overdue) | (Overdue, Overdue) | (Pending, Paid) | (Overdue, Paid) => Ok(to),
            _ => Err(LoanError::InvalidTransition {
                entity: "emi",
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, EmiStatus::Paid)
    }

    pub fn is_unpaid(&self) -> bool {
        !self.is_paid()
    }
}

impl fmt::Display for EmiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EmiStatus::Pending => "pending",
            EmiStatus::Overdue => "overdue",
            EmiStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// how the ceiling overshoot of per-day amounts is trued up so a schedule sums exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrueUpPolicy {
    /// floor share every day, the remainder spread one unit at a time from day one
    #[default]
    SpreadRemainder,
    /// floor share every day, the final day absorbs the whole remainder
    FinalDay,
}
