pub mod penalty;

use crate::decimal::{Money, Rate};

pub use penalty::{clear_overdue, days_overdue, PenaltyBreakdown, PenaltyCalculation, PenaltyEngine};

/// flat interest charged once over the whole term, independent of its length
pub fn flat_interest(principal: Money, rate: Rate) -> Money {
    principal * rate
}
