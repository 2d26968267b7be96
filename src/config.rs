use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::types::TrueUpPolicy;

/// lending configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingConfig {
    pub policy: LoanPolicy,
    pub pricing: PricingConfig,
    pub calendar: CalendarConfig,
    pub client: ClientConfig,
}

/// bounds enforced on applications and approvals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPolicy {
    pub min_amount: Money,
    pub max_amount: Money,
    pub min_days: u32,
    pub max_days: u32,
    pub default_total_days: u32,
}

/// interest and penalty pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// flat interest over the whole term
    pub interest_rate: Rate,
    /// share of an installment's principal charged per overdue day
    pub penalty_rate: Rate,
    pub true_up: TrueUpPolicy,
}

/// business calendar used for due dates and "today"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub utc_offset_minutes: i32,
}

/// client-side request timeouts against the loan service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub default_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub profile_update_timeout_secs: u64,
    pub settings_update_timeout_secs: u64,
}

impl LendingConfig {
    /// the standard daily micro-loan product
    pub fn standard() -> Self {
        Self {
            policy: LoanPolicy {
                min_amount: Money::from_major(1_000),
                max_amount: Money::from_major(100_000),
                min_days: 1,
                max_days: 365,
                default_total_days: 100,
            },
            pricing: PricingConfig {
                interest_rate: Rate::from_percentage(20),
                penalty_rate: Rate::from_percentage(50),
                true_up: TrueUpPolicy::SpreadRemainder,
            },
            calendar: CalendarConfig {
                // IST
                utc_offset_minutes: 330,
            },
            client: ClientConfig {
                default_timeout_secs: 10,
                upload_timeout_secs: 30,
                profile_update_timeout_secs: 60,
                settings_update_timeout_secs: 30,
            },
        }
    }

    /// parse and validate a json configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LendingConfig = serde_json::from_str(json).map_err(|e| {
            LoanError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// check internal consistency
    pub fn validate(&self) -> Result<()> {
        let policy = &self.policy;

        if !policy.min_amount.is_positive() {
            return Err(invalid("min_amount must be positive"));
        }
        if policy.min_amount > policy.max_amount {
            return Err(invalid("min_amount exceeds max_amount"));
        }
        if policy.min_days == 0 {
            return Err(invalid("min_days must be at least 1"));
        }
        if policy.min_days > policy.max_days {
            return Err(invalid("min_days exceeds max_days"));
        }
        if policy.default_total_days < policy.min_days || policy.default_total_days > policy.max_days {
            return Err(invalid("default_total_days outside [min_days, max_days]"));
        }
        if self.pricing.interest_rate.is_negative() {
            return Err(invalid("interest_rate must not be negative"));
        }
        if self.pricing.penalty_rate.is_negative() || self.pricing.penalty_rate.as_decimal() > dec!(10) {
            return Err(invalid("penalty_rate must be within [0, 1000%]"));
        }
        if self.calendar.offset().is_none() {
            return Err(invalid("utc_offset_minutes out of range"));
        }

        Ok(())
    }
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl CalendarConfig {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    /// business date of an instant
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        match self.offset() {
            Some(offset) => at.with_timezone(&offset).date_naive(),
            None => at.date_naive(),
        }
    }
}

impl ClientConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn profile_update_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_update_timeout_secs)
    }

    pub fn settings_update_timeout(&self) -> Duration {
        Duration::from_secs(self.settings_update_timeout_secs)
    }
}

fn invalid(message: &str) -> LoanError {
    LoanError::InvalidConfiguration {
        message: message.to_string(),
    }
}
