use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::validation::ValidationErrors;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    #[error("invalid amortization input: principal {principal}, total days {total_days}")]
    InvalidAmortizationInput {
        principal: Money,
        total_days: u32,
    },

    #[error("invalid approval parameters: {message}")]
    InvalidApprovalParameters {
        message: String,
    },

    #[error("application validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("loan {id} already decided: current status is {status}")]
    AlreadyDecided {
        id: Uuid,
        status: String,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: Uuid,
    },

    #[error("loan application not found: {id}")]
    ApplicationNotFound {
        id: Uuid,
    },

    #[error("emi not found: {id}")]
    EmiNotFound {
        id: Uuid,
    },

    #[error("emi {emi_id} was modified concurrently: expected version {expected}, found {actual}")]
    StaleVersion {
        emi_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("incomplete emi schedule: expected {expected} installments, generated {generated}")]
    IncompleteSchedule {
        expected: u32,
        generated: u32,
    },

    #[error("payment could not be verified for emi {emi_id}")]
    PaymentNotVerified {
        emi_id: Uuid,
    },

    #[error("payment order {order_id} does not settle emi {emi_id}: {message}")]
    PaymentOrderMismatch {
        order_id: String,
        emi_id: Uuid,
        message: String,
    },

    #[error("payment gateway error: {message}")]
    Gateway {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },
}

impl From<ValidationErrors> for LoanError {
    fn from(errors: ValidationErrors) -> Self {
        LoanError::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
