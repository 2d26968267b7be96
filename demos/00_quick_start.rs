/// quick start - quote a loan and print its first installments
use daily_emi_rs::{AmortizationCalculator, Money, PenaltyEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let calculator = AmortizationCalculator::default();

    // ₹50,000 repaid over 100 days
    let quote = calculator.quote(Money::from_major(50_000), 100)?;
    println!("total interest: ₹{}", quote.total_interest);
    println!("daily emi:      ₹{} (₹{} principal + ₹{} interest)", quote.daily_emi, quote.daily_principal, quote.daily_interest);
    println!("total payable:  ₹{}", quote.total_payable);

    // an amount that does not divide evenly
    let installments = calculator.installments(Money::from_major(9_005), 100)?;
    for day in installments.iter().take(6) {
        println!("day {:>3}: ₹{} + ₹{}", day.day_number, day.principal_amount, day.interest_amount);
    }

    // three days late on a ₹500 principal installment
    let penalties = PenaltyEngine::default();
    let penalty = penalties.accrue_penalty(Money::from_major(500), 3);
    println!("\npenalty after 3 days: ₹{}", penalty);

    Ok(())
}
