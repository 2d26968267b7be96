use chrono::{Days, NaiveDate};

use crate::config::PricingConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::payments::AmortizationCalculator;
use crate::state::Emi;
use crate::types::LoanId;

/// turns approved loan terms into dated installments
#[derive(Debug, Clone)]
pub struct EmiScheduleGenerator {
    calculator: AmortizationCalculator,
}

impl EmiScheduleGenerator {
    pub fn new(calculator: AmortizationCalculator) -> Self {
        Self { calculator }
    }

    pub fn from_config(pricing: &PricingConfig) -> Self {
        Self::new(AmortizationCalculator::from_config(pricing))
    }

    pub fn calculator(&self) -> &AmortizationCalculator {
        &self.calculator
    }

    /// repayments start the day after approval
    pub fn start_date_for(approved_on: NaiveDate) -> Result<NaiveDate> {
        approved_on.succ_opt().ok_or_else(|| LoanError::InvalidDate {
            message: format!("no day after {}", approved_on),
        })
    }

    pub fn end_date_for(start_date: NaiveDate, total_days: u32) -> Result<NaiveDate> {
        add_days(start_date, total_days as u64)
    }

    /// generate all `total_days` installments or fail without a partial schedule
    pub fn generate(
        &self,
        loan_id: LoanId,
        principal: Money,
        total_days: u32,
        start_date: NaiveDate,
    ) -> Result<Vec<Emi>> {
        let installments = self.calculator.installments(principal, total_days)?;

        let schedule = installments
            .iter()
            .map(|installment| {
                let due_date = add_days(start_date, (installment.day_number - 1) as u64)?;
                Ok(Emi::new(loan_id, installment, due_date))
            })
            .collect::<Result<Vec<_>>>()?;

        verify_schedule(&schedule, principal, total_days)?;

        Ok(schedule)
    }
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| LoanError::InvalidDate {
            message: format!("{} + {} days is out of range", date, days),
        })
}

fn verify_schedule(schedule: &[Emi], principal: Money, total_days: u32) -> Result<()> {
    let incomplete = || LoanError::IncompleteSchedule {
        expected: total_days,
        generated: schedule.len() as u32,
    };

    if schedule.len() != total_days as usize {
        return Err(incomplete());
    }

    let ordered = schedule
        .windows(2)
        .all(|pair| pair[0].day_number < pair[1].day_number && pair[0].due_date < pair[1].due_date);
    if !ordered {
        return Err(incomplete());
    }

    let scheduled_principal: Money = schedule.iter().map(|emi| emi.principal_amount).sum();
    if scheduled_principal != principal {
        return Err(incomplete());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmiStatus, TrueUpPolicy};
    use uuid::Uuid;

    fn generator() -> EmiScheduleGenerator {
        EmiScheduleGenerator::new(AmortizationCalculator::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_generates_one_emi_per_day() {
        let loan_id = Uuid::new_v4();
        let start = date(2024, 1, 2);
        let schedule = generator()
            .generate(loan_id, Money::from_major(50_000), 100, start)
            .unwrap();

        assert_eq!(schedule.len(), 100);
        assert_eq!(schedule[0].due_date, start);
        assert_eq!(schedule[0].day_number, 1);
        assert_eq!(schedule[99].day_number, 100);
        assert_eq!(schedule[99].due_date, date(2024, 4, 10));

        for emi in &schedule {
            assert_eq!(emi.loan_id, loan_id);
            assert_eq!(emi.status, EmiStatus::Pending);
            assert_eq!(emi.penalty_amount, Money::ZERO);
            assert_eq!(emi.total_amount, Money::from_major(600));
            assert!(emi.paid_at.is_none());
        }
    }

    #[test]
    fn test_schedule_crosses_leap_day() {
        let schedule = generator()
            .generate(Uuid::new_v4(), Money::from_major(1_000), 3, date(2024, 2, 28))
            .unwrap();
        let dates: Vec<NaiveDate> = schedule.iter().map(|e| e.due_date).collect();
        assert_eq!(dates, vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let gen = generator();
        let loan_id = Uuid::new_v4();
        let start = date(2024, 6, 1);
        let first = gen.generate(loan_id, Money::from_major(9_005), 100, start).unwrap();
        let second = gen.generate(loan_id, Money::from_major(9_005), 100, start).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.day_number, b.day_number);
            assert_eq!(a.due_date, b.due_date);
            assert_eq!(a.principal_amount, b.principal_amount);
            assert_eq!(a.interest_amount, b.interest_amount);
            assert_eq!(a.total_amount, b.total_amount);
        }
    }

    #[test]
    fn test_principal_sums_to_loan_amount() {
        for policy in [TrueUpPolicy::SpreadRemainder, TrueUpPolicy::FinalDay] {
            let gen = EmiScheduleGenerator::new(AmortizationCalculator::new(
                crate::decimal::Rate::from_percentage(20),
                policy,
            ));
            let schedule = gen
                .generate(Uuid::new_v4(), Money::from_major(9_005), 100, date(2024, 1, 1))
                .unwrap();
            let total: Money = schedule.iter().map(|e| e.principal_amount).sum();
            assert_eq!(total, Money::from_major(9_005));
        }
    }

    #[test]
    fn test_invalid_terms_produce_nothing() {
        let result = generator().generate(Uuid::new_v4(), Money::ZERO, 100, date(2024, 1, 1));
        assert!(matches!(result, Err(LoanError::InvalidAmortizationInput { .. })));
    }

    #[test]
    fn test_start_and_end_dates() {
        let start = EmiScheduleGenerator::start_date_for(date(2024, 12, 31)).unwrap();
        assert_eq!(start, date(2025, 1, 1));
        assert_eq!(EmiScheduleGenerator::end_date_for(start, 100).unwrap(), date(2025, 4, 11));
        assert!(EmiScheduleGenerator::start_date_for(NaiveDate::MAX).is_err());
    }
}
