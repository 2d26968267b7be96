/// loan lifecycle - apply, approve, fall behind, waive and pay off with controlled time
use chrono::{Duration, TimeZone, Utc};
use daily_emi_rs::views::{EmiView, LoanView};
use daily_emi_rs::{
    ApprovalRequest, LoanApplicationRequest, LoanBook, Money, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== loan lifecycle example ===\n");

    // 10:00 IST
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 4, 30, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let mut book = LoanBook::standard();
    let applicant_id = Uuid::new_v4();

    let application = book.apply(
        applicant_id,
        &LoanApplicationRequest {
            amount: Some(Money::from_major(5_000)),
            name: "Meena Iyer".to_string(),
            mobile: "9000012345".to_string(),
            address: "22 Lake View, Chennai".to_string(),
            aadhaar_number: "111122223333".to_string(),
            pan_number: "ABCPI4321Q".to_string(),
            aadhaar_image: Some("aadhaar-front.jpg".to_string()),
            pan_image: Some("pan.jpg".to_string()),
        },
        &time,
    )?;
    println!("application {} submitted for ₹{}", application.id, application.amount);

    // admin shortens the term to 10 days
    let approval = ApprovalRequest { amount: None, total_days: Some(10) };
    let preview = book.preview_approval(application.id, &approval, &time)?;
    println!("preview:\n{}", preview.to_json_pretty()?);

    let loan = book.approve(application.id, &approval, &time)?;
    println!("approved, first installment due {}", loan.start_date);

    // borrower misses the first three days
    controller.advance(Duration::days(4));
    let report = book.process_overdues(&time)?;
    println!("\nsweep on {}: {} overdue", report.business_date, report.newly_overdue);

    let today = book.business_date(&time);
    let first = book.schedule(loan.id)[0].clone();
    let view = EmiView::from_emi(&first, book.penalty_engine(), today);
    if let Some(label) = view.penalty_label() {
        println!("day 1: ₹{} + {} = ₹{}", view.base_amount, label, view.total_amount);
    }

    // admin waives the penalty, borrower pays everything
    book.clear_overdue(first.id, Some(first.version), &time)?;
    let ids: Vec<_> = book.schedule(loan.id).iter().map(|emi| emi.id).collect();
    book.pay_multiple(&ids, &time)?;

    if let Some(loan) = book.loan(loan.id) {
        println!("\n{}", LoanView::from_loan(loan).to_json_pretty()?);
    }

    println!("\nevents:");
    for event in book.events.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
