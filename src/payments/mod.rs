pub mod amortization;
pub mod gateway;

pub use amortization::{AmortizationCalculator, AmortizationQuote, DailyInstallment};
pub use gateway::{
    MockPaymentGateway, MockVerifyMode, OrderRequest, PaymentGateway, PaymentOrder,
    PaymentVerification,
};
