pub mod api;
pub mod book;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod interest;
pub mod payments;
pub mod schedule;
pub mod state;
pub mod types;
pub mod validation;
pub mod views;

// re-export key types
pub use api::{Endpoint, HttpMethod, RetryPolicy};
pub use book::{EmiQuery, EmiTotals, LoanBook, Page, PaymentOutcome, SweepReport};
pub use config::{CalendarConfig, ClientConfig, LendingConfig, LoanPolicy, PricingConfig};
pub use decimal::{Money, Rate};
pub use errors::{LoanError, Result};
pub use events::{Event, EventStore};
pub use interest::{clear_overdue, days_overdue, PenaltyBreakdown, PenaltyCalculation, PenaltyEngine};
pub use payments::{
    AmortizationCalculator, AmortizationQuote, DailyInstallment, MockPaymentGateway, PaymentGateway,
    PaymentOrder, PaymentVerification,
};
pub use schedule::EmiScheduleGenerator;
pub use state::{Applicant, Emi, Loan, LoanApplication, LoanTotals};
pub use types::{ApplicantId, EmiId, EmiStatus, LoanId, LoanStatus, TrueUpPolicy};
pub use validation::{
    ApplicationValidator, ApprovalRequest, ApprovalTerms, LoanApplicationRequest, ValidationError,
    ValidationErrors,
};
pub use views::{ApprovalPreview, EmiView, LoanView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
