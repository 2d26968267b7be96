use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::LoanPolicy;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::state::Applicant;

pub const MOBILE_LEN: usize = 10;
pub const AADHAAR_LEN: usize = 12;
pub const PAN_LEN: usize = 10;
pub const DEFAULT_REJECTION_REASON: &str = "Application rejected by admin";

/// a single field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// every failing field of a submission, so the form can highlight each one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// message for a field, if it failed
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message.as_str())
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

/// what the borrower submits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoanApplicationRequest {
    pub amount: Option<Money>,
    pub name: String,
    pub mobile: String,
    pub address: String,
    pub aadhaar_number: String,
    pub pan_number: String,
    pub aadhaar_image: Option<String>,
    pub pan_image: Option<String>,
}

/// admin overrides sent with an approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ApprovalRequest {
    pub amount: Option<Money>,
    pub total_days: Option<u32>,
}

/// a submission that passed every check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedSubmission {
    pub amount: Money,
    pub applicant: Applicant,
}

/// validated terms a schedule can be generated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalTerms {
    pub amount: Money,
    pub total_days: u32,
}

/// gate for submissions and approvals
#[derive(Debug, Clone)]
pub struct ApplicationValidator {
    policy: LoanPolicy,
}

impl ApplicationValidator {
    pub fn new(policy: LoanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    /// check a submission and return the sanitized applicant details
    pub fn validate_submission(&self, request: &LoanApplicationRequest) -> Result<ValidatedSubmission> {
        let mut errors = ValidationErrors::new();

        let amount = match request.amount {
            None => {
                errors.push("amount", "Please select or enter a loan amount");
                Money::ZERO
            }
            Some(amount) => {
                if !amount.is_whole() || !self.amount_in_range(amount) {
                    errors.push("amount", self.amount_message());
                }
                amount
            }
        };

        let name = sanitize_string(&request.name);
        if name.is_empty() {
            errors.push("name", "Name is required");
        }

        let mobile = sanitize_string(&request.mobile);
        if !is_digits(&mobile, MOBILE_LEN) {
            errors.push("mobile", "Valid 10-digit mobile number is required");
        }

        let address = sanitize_string(&request.address);
        if address.is_empty() {
            errors.push("address", "Address is required");
        }

        let aadhaar_number = sanitize_string(&request.aadhaar_number).replace(' ', "");
        if !is_digits(&aadhaar_number, AADHAAR_LEN) {
            errors.push("aadhaar_number", "Valid 12-digit Aadhaar number is required");
        }

        let pan_number = sanitize_string(&request.pan_number).to_ascii_uppercase();
        if !is_alphanumeric(&pan_number, PAN_LEN) {
            errors.push("pan_number", "Valid 10-character PAN is required");
        }

        let aadhaar_image = present(&request.aadhaar_image);
        if aadhaar_image.is_none() {
            errors.push("aadhaar_image", "Aadhaar image is required");
        }

        let pan_image = present(&request.pan_image);
        if pan_image.is_none() {
            errors.push("pan_image", "PAN image is required");
        }

        errors.into_result()?;

        Ok(ValidatedSubmission {
            amount,
            applicant: Applicant {
                name,
                mobile,
                address,
                aadhaar_number,
                pan_number,
                aadhaar_image: aadhaar_image.unwrap_or_default(),
                pan_image: pan_image.unwrap_or_default(),
            },
        })
    }

    /// check the final amount and duration an admin approves
    pub fn validate_approval(&self, amount: Money, total_days: u32) -> Result<ApprovalTerms> {
        if !amount.is_whole() || !self.amount_in_range(amount) {
            return Err(LoanError::InvalidApprovalParameters {
                message: self.amount_message(),
            });
        }

        if total_days < self.policy.min_days || total_days > self.policy.max_days {
            return Err(LoanError::InvalidApprovalParameters {
                message: format!(
                    "Total days must be between {} and {}",
                    self.policy.min_days, self.policy.max_days
                ),
            });
        }

        Ok(ApprovalTerms { amount, total_days })
    }

    /// fill in the applied amount and default term where the admin left them out
    pub fn resolve_approval(&self, request: &ApprovalRequest, applied_amount: Money) -> Result<ApprovalTerms> {
        self.validate_approval(
            request.amount.unwrap_or(applied_amount),
            request.total_days.unwrap_or(self.policy.default_total_days),
        )
    }

    /// trimmed reason, or the generic one
    pub fn rejection_reason(reason: Option<&str>) -> String {
        match reason.map(sanitize_string) {
            Some(reason) if !reason.is_empty() => reason,
            _ => DEFAULT_REJECTION_REASON.to_string(),
        }
    }

    fn amount_in_range(&self, amount: Money) -> bool {
        amount >= self.policy.min_amount && amount <= self.policy.max_amount
    }

    fn amount_message(&self) -> String {
        format!(
            "Amount must be between ₹{} and ₹{}",
            self.policy.min_amount, self.policy.max_amount
        )
    }
}

/// collapse whitespace, line breaks included, and strip other control characters
pub fn sanitize_string(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| word.chars().filter(|ch| !ch.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|ch| ch.is_ascii_digit())
}

fn is_alphanumeric(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|ch| ch.is_ascii_alphanumeric())
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
