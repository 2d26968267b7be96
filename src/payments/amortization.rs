use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{LoanError, Result};
use crate::interest::flat_interest;
use crate::types::TrueUpPolicy;

/// headline numbers for a loan, shown before the schedule is fixed
///
/// `total_interest` is not rounded to whole rupees. When it carries paise
/// (20% of 1003 is 200.60) the paise land on one installment's interest, so
/// per-day amounts are not always whole rupees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationQuote {
    pub principal: Money,
    pub total_days: u32,
    /// principal × rate, exact to the paisa
    pub total_interest: Money,
    pub daily_principal: Money,
    pub daily_interest: Money,
    pub daily_emi: Money,
    pub total_payable: Money,
}

/// one day of the repayment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInstallment {
    pub day_number: u32,
    pub principal_amount: Money,
    pub interest_amount: Money,
}

impl DailyInstallment {
    pub fn total(&self) -> Money {
        self.principal_amount + self.interest_amount
    }
}

/// flat-rate daily amortization
#[derive(Debug, Clone)]
pub struct AmortizationCalculator {
    interest_rate: Rate,
    true_up: TrueUpPolicy,
}

impl AmortizationCalculator {
    pub fn new(interest_rate: Rate, true_up: TrueUpPolicy) -> Self {
        Self {
            interest_rate,
            true_up,
        }
    }

    pub fn from_config(pricing: &PricingConfig) -> Self {
        Self::new(pricing.interest_rate, pricing.true_up)
    }

    pub fn interest_rate(&self) -> Rate {
        self.interest_rate
    }

    pub fn true_up(&self) -> TrueUpPolicy {
        self.true_up
    }

    /// quote the per-day amounts, each rounded up to whole units
    pub fn quote(&self, principal: Money, total_days: u32) -> Result<AmortizationQuote> {
        check_inputs(principal, total_days)?;

        let total_interest = flat_interest(principal, self.interest_rate);
        let days = Decimal::from(total_days);
        // ceil before narrowing to paise, 90.004 must become 91
        let daily_principal = Money::from_decimal((principal.as_decimal() / days).ceil());
        let daily_interest = Money::from_decimal((total_interest.as_decimal() / days).ceil());

        Ok(AmortizationQuote {
            principal,
            total_days,
            total_interest,
            daily_principal,
            daily_interest,
            daily_emi: daily_principal + daily_interest,
            total_payable: principal + total_interest,
        })
    }

    /// full day-by-day plan; principal and interest columns sum exactly to the quote totals
    pub fn installments(&self, principal: Money, total_days: u32) -> Result<Vec<DailyInstallment>> {
        check_inputs(principal, total_days)?;

        let total_interest = flat_interest(principal, self.interest_rate);
        let principal_parts = split_evenly(principal, total_days, self.true_up)?;
        let interest_parts = split_evenly(total_interest, total_days, self.true_up)?;

        Ok(principal_parts
            .into_iter()
            .zip(interest_parts)
            .enumerate()
            .map(|(i, (principal_amount, interest_amount))| DailyInstallment {
                day_number: i as u32 + 1,
                principal_amount,
                interest_amount,
            })
            .collect())
    }
}

impl Default for AmortizationCalculator {
    fn default() -> Self {
        Self::new(Rate::from_percentage(20), TrueUpPolicy::default())
    }
}

fn check_inputs(principal: Money, total_days: u32) -> Result<()> {
    if !principal.is_positive() || total_days == 0 {
        return Err(LoanError::InvalidAmortizationInput {
            principal,
            total_days,
        });
    }
    Ok(())
}

/// split `total` into `days` parts of floor(total / days), trueing up the remainder
fn split_evenly(total: Money, days: u32, policy: TrueUpPolicy) -> Result<Vec<Money>> {
    let n = Decimal::from(days);
    let share = (total.as_decimal() / n).floor();
    // 0 <= remainder < days
    let remainder = total.as_decimal() - share * n;

    let parts = match policy {
        TrueUpPolicy::SpreadRemainder => {
            let whole = remainder.floor();
            let residue = remainder - whole;
            let bumped_days = whole.to_u32().ok_or(LoanError::InvalidAmortizationInput {
                principal: total,
                total_days: days,
            })?;

            (1..=days)
                .map(|day| {
                    let amount = if day <= bumped_days {
                        share + Decimal::ONE
                    } else if day == bumped_days + 1 {
                        share + residue
                    } else {
                        share
                    };
                    Money::from_decimal(amount)
                })
                .collect()
        }
        TrueUpPolicy::FinalDay => {
            let last = total.as_decimal() - share * Decimal::from(days - 1);
            (1..=days)
                .map(|day| Money::from_decimal(if day == days { last } else { share }))
                .collect()
        }
    };

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn calculator(policy: TrueUpPolicy) -> AmortizationCalculator {
        AmortizationCalculator::new(Rate::from_percentage(20), policy)
    }

    fn sums(plan: &[DailyInstallment]) -> (Money, Money) {
        (
            plan.iter().map(|d| d.principal_amount).sum(),
            plan.iter().map(|d| d.interest_amount).sum(),
        )
    }

    #[test]
    fn test_standard_quote() {
        let quote = calculator(TrueUpPolicy::SpreadRemainder)
            .quote(Money::from_major(50_000), 100)
            .unwrap();

        assert_eq!(quote.total_interest, Money::from_major(10_000));
        assert_eq!(quote.daily_principal, Money::from_major(500));
        assert_eq!(quote.daily_interest, Money::from_major(100));
        assert_eq!(quote.daily_emi, Money::from_major(600));
        assert_eq!(quote.total_payable, Money::from_major(60_000));
    }

    #[test]
    fn test_quote_rounds_up() {
        let quote = calculator(TrueUpPolicy::SpreadRemainder)
            .quote(Money::from_major(9_005), 100)
            .unwrap();

        assert_eq!(quote.daily_principal, Money::from_major(91));
        assert_eq!(quote.total_interest, Money::from_major(1_801));
        assert_eq!(quote.daily_interest, Money::from_major(19));
        assert_eq!(quote.daily_emi, Money::from_major(110));
    }

    #[test]
    fn test_exact_division_has_flat_plan() {
        let plan = calculator(TrueUpPolicy::SpreadRemainder)
            .installments(Money::from_major(9_000), 100)
            .unwrap();

        assert_eq!(plan.len(), 100);
        assert!(plan.iter().all(|d| d.principal_amount == Money::from_major(90)));
        assert!(plan.iter().all(|d| d.interest_amount == Money::from_major(18)));
    }

    #[test]
    fn test_spread_remainder_on_9005() {
        let plan = calculator(TrueUpPolicy::SpreadRemainder)
            .installments(Money::from_major(9_005), 100)
            .unwrap();

        for day in &plan[..5] {
            assert_eq!(day.principal_amount, Money::from_major(91));
        }
        for day in &plan[5..] {
            assert_eq!(day.principal_amount, Money::from_major(90));
        }
        // 1801 interest: one day at 19, the rest at 18
        assert_eq!(plan[0].interest_amount, Money::from_major(19));
        assert!(plan[1..].iter().all(|d| d.interest_amount == Money::from_major(18)));

        assert_eq!(sums(&plan), (Money::from_major(9_005), Money::from_major(1_801)));
    }

    #[test]
    fn test_final_day_true_up_on_9005() {
        let plan = calculator(TrueUpPolicy::FinalDay)
            .installments(Money::from_major(9_005), 100)
            .unwrap();

        assert!(plan[..99].iter().all(|d| d.principal_amount == Money::from_major(90)));
        assert_eq!(plan[99].principal_amount, Money::from_major(95));
        assert_eq!(plan[99].interest_amount, Money::from_major(19));
        assert_eq!(sums(&plan), (Money::from_major(9_005), Money::from_major(1_801)));
    }

    #[test]
    fn test_spread_never_exceeds_quote() {
        let calc = calculator(TrueUpPolicy::SpreadRemainder);
        for (principal, days) in [(1_000, 365), (1_003, 7), (99_999, 364), (100_000, 1), (4_321, 100)] {
            let principal = Money::from_major(principal);
            let quote = calc.quote(principal, days).unwrap();
            let plan = calc.installments(principal, days).unwrap();

            assert_eq!(plan.len() as u32, days);
            assert_eq!(sums(&plan), (principal, quote.total_interest));
            for day in &plan {
                assert!(day.principal_amount <= quote.daily_principal);
                assert!(day.interest_amount <= quote.daily_interest);
                assert!(!day.principal_amount.is_negative());
            }
        }
    }

    #[test]
    fn test_fractional_interest_is_conserved() {
        // 20% of 1003 is 200.6
        let calc = calculator(TrueUpPolicy::SpreadRemainder);
        let plan = calc.installments(Money::from_major(1_003), 100).unwrap();

        // the quote keeps the paise
        let quote = calc.quote(Money::from_major(1_003), 100).unwrap();
        assert_eq!(quote.total_interest, Money::from_decimal(dec!(200.6)));
        assert!(!quote.total_interest.is_whole());
        assert_eq!(plan[0].interest_amount, Money::from_decimal(dec!(2.6)));
        assert_eq!(plan[1].interest_amount, Money::from_major(2));
        assert_eq!(sums(&plan).1, Money::from_decimal(dec!(200.6)));

        let final_day = calculator(TrueUpPolicy::FinalDay)
            .installments(Money::from_major(1_003), 100)
            .unwrap();
        assert_eq!(final_day[99].interest_amount, Money::from_decimal(dec!(2.6)));
    }

    #[test]
    fn test_day_numbers_are_sequential() {
        let plan = AmortizationCalculator::default()
            .installments(Money::from_major(5_000), 30)
            .unwrap();
        let numbers: Vec<u32> = plan.iter().map(|d| d.day_number).collect();
        assert_eq!(numbers, (1..=30).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_inputs() {
        let calc = AmortizationCalculator::default();
        assert!(matches!(
            calc.quote(Money::ZERO, 100),
            Err(LoanError::InvalidAmortizationInput { .. })
        ));
        assert!(matches!(
            calc.quote(Money::from_major(-5), 100),
            Err(LoanError::InvalidAmortizationInput { .. })
        ));
        assert!(matches!(
            calc.installments(Money::from_major(5_000), 0),
            Err(LoanError::InvalidAmortizationInput { .. })
        ));
    }
}
