//! serializable views shared by every screen that shows loan money

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::interest::{days_overdue, PenaltyBreakdown, PenaltyEngine};
use crate::payments::{AmortizationCalculator, AmortizationQuote};
use crate::schedule::EmiScheduleGenerator;
use crate::state::{Emi, Loan, LoanTotals};
use crate::types::{ApplicantId, EmiId, EmiStatus, LoanId, LoanStatus};
use crate::validation::ApprovalTerms;

/// one installment as a card or list row shows it
#[derive(Debug, Serialize, Deserialize)]
pub struct EmiView {
    pub id: EmiId,
    pub loan_id: LoanId,
    pub day_number: u32,
    pub due_date: NaiveDate,
    pub status: EmiStatus,
    pub principal_amount: Money,
    pub interest_amount: Money,
    /// principal + interest
    pub base_amount: Money,
    pub penalty_amount: Money,
    pub total_amount: Money,
    /// calendar days past due as of the view's date
    pub days_late: u32,
    pub penalty: Option<PenaltyBreakdown>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl EmiView {
    pub fn from_emi(emi: &Emi, penalties: &PenaltyEngine, today: NaiveDate) -> Self {
        EmiView {
            id: emi.id,
            loan_id: emi.loan_id,
            day_number: emi.day_number,
            due_date: emi.due_date,
            status: emi.status,
            principal_amount: emi.principal_amount,
            interest_amount: emi.interest_amount,
            base_amount: emi.base_amount(),
            penalty_amount: emi.penalty_amount,
            total_amount: emi.total_amount,
            days_late: if emi.status.is_paid() { 0 } else { days_overdue(emi.due_date, today) },
            penalty: penalties.breakdown(emi),
            paid_at: emi.paid_at,
            version: emi.version,
        }
    }

    /// "Penalty (₹250 × 3 days)" label, when a penalty is outstanding
    pub fn penalty_label(&self) -> Option<String> {
        self.penalty.as_ref().map(|p| {
            let unit = if p.days_overdue == 1 { "day" } else { "days" };
            format!("Penalty (₹{} × {} {})", p.penalty_per_day, p.days_overdue, unit)
        })
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// loan summary for the borrower and admin detail screens
#[derive(Debug, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub applicant_id: ApplicantId,
    pub status: LoanStatus,
    pub terms: TermsView,
    pub progress: ProgressView,
    pub approved_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermsView {
    pub amount: Money,
    pub total_days: u32,
    pub interest_rate: Rate,
    pub total_interest: Money,
    pub total_payable: Money,
    pub daily_emi: Money,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressView {
    pub totals: LoanTotals,
    /// principal, interest and penalties still owed
    pub outstanding: Money,
    pub days_paid: u32,
    pub days_remaining: u32,
}

impl LoanView {
    pub fn from_loan(loan: &Loan) -> Self {
        LoanView {
            id: loan.id,
            applicant_id: loan.applicant_id,
            status: loan.status,
            terms: TermsView {
                amount: loan.amount,
                total_days: loan.total_days,
                interest_rate: loan.interest_rate,
                total_interest: loan.total_interest,
                total_payable: loan.total_payable,
                daily_emi: loan.daily_emi,
                start_date: loan.start_date,
                end_date: loan.end_date,
            },
            progress: ProgressView {
                totals: loan.totals.clone(),
                outstanding: loan.totals.outstanding(),
                days_paid: loan.totals.paid_count,
                days_remaining: loan.totals.emi_count.saturating_sub(loan.totals.paid_count),
            },
            approved_at: loan.approved_at,
            completed_at: loan.completed_at,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// what the admin sees in the approval confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPreview {
    pub quote: AmortizationQuote,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ApprovalPreview {
    pub fn build(
        calculator: &AmortizationCalculator,
        terms: ApprovalTerms,
        approved_on: NaiveDate,
    ) -> Result<Self> {
        let quote = calculator.quote(terms.amount, terms.total_days)?;
        let start_date = EmiScheduleGenerator::start_date_for(approved_on)?;
        let end_date = EmiScheduleGenerator::end_date_for(start_date, terms.total_days)?;

        Ok(ApprovalPreview {
            quote,
            start_date,
            end_date,
        })
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
