use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::types::EmiId;

pub const CURRENCY: &str = "INR";

/// external payment gateway
pub trait PaymentGateway {
    /// open an order the borrower can pay against
    fn create_order(&self, request: &OrderRequest) -> Result<PaymentOrder>;

    /// check the gateway's signature on a completed payment
    ///
    /// `Ok(false)` means the gateway answered and the payment is not genuine.
    /// `Err` means the gateway could not be reached, so the payment may still
    /// have gone through.
    fn verify(&self, verification: &PaymentVerification) -> Result<bool>;
}

/// order request for a single installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub emi_id: EmiId,
    pub amount: Money,
    /// amount in paise
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
}

impl OrderRequest {
    pub fn for_emi(emi_id: EmiId, amount: Money) -> Result<Self> {
        let amount_minor = amount.to_minor().ok_or_else(|| LoanError::Gateway {
            message: format!("amount {} cannot be expressed in paise", amount),
        })?;

        Ok(Self {
            emi_id,
            amount,
            amount_minor,
            currency: CURRENCY.to_string(),
            receipt: format!("emi_{}", emi_id.simple()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub order_id: String,
    pub emi_id: EmiId,
    pub amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// what the client hands back after checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub emi_id: EmiId,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// scripted gateway for tests and demos
#[derive(Debug)]
pub struct MockPaymentGateway {
    now: DateTime<Utc>,
    orders_created: Cell<u32>,
    mode: Cell<MockVerifyMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockVerifyMode {
    Accept,
    Reject,
    Unreachable,
}

impl MockPaymentGateway {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            orders_created: Cell::new(0),
            mode: Cell::new(MockVerifyMode::Accept),
        }
    }

    pub fn set_mode(&self, mode: MockVerifyMode) {
        self.mode.set(mode);
    }

    pub fn orders_created(&self) -> u32 {
        self.orders_created.get()
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_order(&self, request: &OrderRequest) -> Result<PaymentOrder> {
        if self.mode.get() == MockVerifyMode::Unreachable {
            return Err(LoanError::Gateway {
                message: "gateway timed out".to_string(),
            });
        }

        let sequence = self.orders_created.get() + 1;
        self.orders_created.set(sequence);

        Ok(PaymentOrder {
            order_id: format!("order_{:04}", sequence),
            emi_id: request.emi_id,
            amount: request.amount,
            currency: request.currency.clone(),
            created_at: self.now,
        })
    }

    fn verify(&self, _verification: &PaymentVerification) -> Result<bool> {
        match self.mode.get() {
            MockVerifyMode::Accept => Ok(true),
            MockVerifyMode::Reject => Ok(false),
            MockVerifyMode::Unreachable => Err(LoanError::Gateway {
                message: "gateway timed out".to_string(),
            }),
        }
    }
}
