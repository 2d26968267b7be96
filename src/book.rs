use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::LendingConfig;
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::events::{Event, EventStore};
use crate::interest::PenaltyEngine;
use crate::payments::{OrderRequest, PaymentGateway, PaymentOrder, PaymentVerification};
use crate::schedule::EmiScheduleGenerator;
use crate::state::{Emi, Loan, LoanApplication, LoanTotals};
use crate::types::{ApplicantId, EmiId, EmiStatus, LoanId, LoanStatus};
use crate::validation::{ApplicationValidator, ApprovalRequest, LoanApplicationRequest};
use crate::views::ApprovalPreview;

pub const DEFAULT_PER_PAGE: u32 = 20;

/// in-memory loan service: applications, loans and their installments
///
/// Every mutation goes through `&mut self`, so operations on the same
/// installment are serialized. Callers working from a stale read can pass the
/// installment `version` they saw and get `StaleVersion` instead of
/// overwriting a newer change.
pub struct LoanBook {
    pub config: LendingConfig,
    pub events: EventStore,
    validator: ApplicationValidator,
    generator: EmiScheduleGenerator,
    penalties: PenaltyEngine,
    applications: HashMap<LoanId, LoanApplication>,
    loans: HashMap<LoanId, Loan>,
    emis: HashMap<EmiId, Emi>,
    /// installment ids per loan, in day order
    schedules: HashMap<LoanId, Vec<EmiId>>,
    /// gateway orders by order id
    orders: HashMap<String, PaymentOrder>,
}

impl LoanBook {
    pub fn new(config: LendingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    /// book for the standard product
    pub fn standard() -> Self {
        Self::with_config(LendingConfig::standard())
    }

    fn with_config(config: LendingConfig) -> Self {
        Self {
            validator: ApplicationValidator::new(config.policy.clone()),
            generator: EmiScheduleGenerator::from_config(&config.pricing),
            penalties: PenaltyEngine::from_config(&config.pricing),
            config,
            events: EventStore::new(),
            applications: HashMap::new(),
            loans: HashMap::new(),
            emis: HashMap::new(),
            schedules: HashMap::new(),
            orders: HashMap::new(),
        }
    }

    pub fn penalty_engine(&self) -> &PenaltyEngine {
        &self.penalties
    }

    pub fn schedule_generator(&self) -> &EmiScheduleGenerator {
        &self.generator
    }

    /// the lender's business date at the provider's current instant
    pub fn business_date(&self, time_provider: &SafeTimeProvider) -> NaiveDate {
        self.config.calendar.business_date(time_provider.now())
    }

    /// submit a loan application
    pub fn apply(
        &mut self,
        applicant_id: ApplicantId,
        request: &LoanApplicationRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<LoanApplication> {
        let submission = match self.validator.validate_submission(request) {
            Ok(submission) => submission,
            Err(err) => {
                tracing::debug!(%applicant_id, error = %err, "loan application failed validation");
                return Err(err);
            }
        };

        let now = time_provider.now();
        let application = LoanApplication::new(applicant_id, submission.applicant, submission.amount, now);

        self.events.emit(Event::ApplicationSubmitted {
            loan_id: application.id,
            applicant_id,
            amount: application.amount,
            timestamp: now,
        });
        tracing::info!(loan_id = %application.id, %applicant_id, amount = %application.amount, "loan application submitted");

        self.applications.insert(application.id, application.clone());
        Ok(application)
    }

    /// numbers the admin confirms before approving
    pub fn preview_approval(
        &self,
        loan_id: LoanId,
        request: &ApprovalRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<ApprovalPreview> {
        let application = self.application_or_err(loan_id)?;
        let terms = self.validator.resolve_approval(request, application.amount)?;
        ApprovalPreview::build(self.generator.calculator(), terms, self.business_date(time_provider))
    }

    /// approve a pending application and generate its schedule
    ///
    /// The schedule is generated in full before anything is stored, so a
    /// failure leaves the application pending with no installments. A second
    /// approval fails with `AlreadyDecided`.
    pub fn approve(
        &mut self,
        loan_id: LoanId,
        request: &ApprovalRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Loan> {
        let application = self.application_or_err(loan_id)?;
        if application.status.is_decided() {
            tracing::warn!(%loan_id, status = %application.status, "approval of decided application refused");
            return Err(LoanError::AlreadyDecided {
                id: loan_id,
                status: application.status.to_string(),
            });
        }

        let applicant_id = application.applicant_id;
        let terms = self.validator.resolve_approval(request, application.amount)?;

        let now = time_provider.now();
        let start_date = EmiScheduleGenerator::start_date_for(self.config.calendar.business_date(now))?;
        let end_date = EmiScheduleGenerator::end_date_for(start_date, terms.total_days)?;
        let quote = self.generator.calculator().quote(terms.amount, terms.total_days)?;
        let schedule = self.generator.generate(loan_id, terms.amount, terms.total_days, start_date)?;

        let application = self
            .applications
            .get_mut(&loan_id)
            .ok_or(LoanError::ApplicationNotFound { id: loan_id })?;
        application.transition(LoanStatus::Approved, now)?;

        let mut loan = Loan {
            id: loan_id,
            applicant_id,
            amount: terms.amount,
            total_days: terms.total_days,
            interest_rate: self.generator.calculator().interest_rate(),
            total_interest: quote.total_interest,
            total_payable: quote.total_payable,
            daily_emi: quote.daily_emi,
            start_date,
            end_date,
            status: LoanStatus::Approved,
            approved_at: now,
            completed_at: None,
            totals: LoanTotals::default(),
        };
        loan.refresh_totals(&schedule.iter().collect::<Vec<_>>());

        let first_due_date = schedule.first().map(|emi| emi.due_date).unwrap_or(start_date);
        let last_due_date = schedule.last().map(|emi| emi.due_date).unwrap_or(start_date);

        self.schedules
            .insert(loan_id, schedule.iter().map(|emi| emi.id).collect());
        self.emis.extend(schedule.into_iter().map(|emi| (emi.id, emi)));
        self.loans.insert(loan_id, loan.clone());

        self.events.emit(Event::StatusChanged {
            loan_id,
            old_status: LoanStatus::Pending,
            new_status: LoanStatus::Approved,
            reason: "approved by admin".to_string(),
            timestamp: now,
        });
        self.events.emit(Event::LoanApproved {
            loan_id,
            amount: loan.amount,
            total_days: loan.total_days,
            daily_emi: loan.daily_emi,
            total_payable: loan.total_payable,
            start_date,
            end_date,
            timestamp: now,
        });
        self.events.emit(Event::ScheduleGenerated {
            loan_id,
            emi_count: loan.total_days,
            first_due_date,
            last_due_date,
        });
        tracing::info!(
            %loan_id,
            amount = %loan.amount,
            total_days = loan.total_days,
            daily_emi = %loan.daily_emi,
            %start_date,
            "loan approved"
        );

        Ok(loan)
    }

    /// reject a pending application; rejection is final
    pub fn reject(
        &mut self,
        loan_id: LoanId,
        reason: Option<&str>,
        time_provider: &SafeTimeProvider,
    ) -> Result<LoanApplication> {
        let now = time_provider.now();
        let application = self
            .applications
            .get_mut(&loan_id)
            .ok_or(LoanError::ApplicationNotFound { id: loan_id })?;

        if application.status.is_decided() {
            return Err(LoanError::AlreadyDecided {
                id: loan_id,
                status: application.status.to_string(),
            });
        }

        let reason = ApplicationValidator::rejection_reason(reason);
        application.transition(LoanStatus::Rejected, now)?;
        application.rejection_reason = Some(reason.clone());

        self.events.emit(Event::StatusChanged {
            loan_id,
            old_status: LoanStatus::Pending,
            new_status: LoanStatus::Rejected,
            reason: reason.clone(),
            timestamp: now,
        });
        self.events.emit(Event::ApplicationRejected {
            loan_id,
            reason: reason.clone(),
            timestamp: now,
        });
        tracing::info!(%loan_id, %reason, "loan application rejected");

        Ok(application.clone())
    }

    /// remove an application with its loan and installments; returns installments removed
    pub fn delete_loan(&mut self, loan_id: LoanId, time_provider: &SafeTimeProvider) -> Result<u32> {
        let had_application = self.applications.remove(&loan_id).is_some();
        let had_loan = self.loans.remove(&loan_id).is_some();
        if !had_application && !had_loan {
            return Err(LoanError::LoanNotFound { id: loan_id });
        }

        let ids = self.schedules.remove(&loan_id).unwrap_or_default();
        for id in &ids {
            self.emis.remove(id);
        }
        self.orders.retain(|_, order| !ids.contains(&order.emi_id));
        let emis_removed = ids.len() as u32;

        self.events.emit(Event::LoanDeleted {
            loan_id,
            emis_removed,
            timestamp: time_provider.now(),
        });
        tracing::warn!(%loan_id, emis_removed, "loan deleted");

        Ok(emis_removed)
    }

    /// mark past-due installments overdue and bring their penalties up to date
    ///
    /// Penalties are recomputed from the day count, so running the sweep
    /// again on the same business date changes nothing.
    pub fn process_overdues(&mut self, time_provider: &SafeTimeProvider) -> Result<SweepReport> {
        let now = time_provider.now();
        let today = self.config.calendar.business_date(now);

        let mut due: Vec<(NaiveDate, LoanId, u32, EmiId)> = self
            .emis
            .values()
            .filter(|emi| emi.is_past_due(today))
            .map(|emi| (emi.due_date, emi.loan_id, emi.day_number, emi.id))
            .collect();
        due.sort();

        let mut report = SweepReport {
            business_date: today,
            examined: due.len() as u32,
            newly_overdue: 0,
            penalties_updated: 0,
            total_penalty: Money::ZERO,
            loans_affected: Vec::new(),
        };

        for (_, loan_id, _, emi_id) in due {
            let Some(emi) = self.emis.get_mut(&emi_id) else {
                continue;
            };

            let calculation = self.penalties.calculate(emi, today);
            let was_pending = emi.status == EmiStatus::Pending;
            let previous_penalty = emi.penalty_amount;

            let changed = emi.apply_penalty(calculation.penalty_amount)?;
            report.total_penalty += emi.penalty_amount;
            if !changed {
                continue;
            }

            if was_pending {
                report.newly_overdue += 1;
                self.events.emit(Event::EmiOverdue {
                    loan_id,
                    emi_id,
                    due_date: emi.due_date,
                    timestamp: now,
                });
            }
            if emi.penalty_amount != previous_penalty {
                report.penalties_updated += 1;
                self.events.emit(Event::PenaltyAccrued {
                    loan_id,
                    emi_id,
                    days_overdue: calculation.days_overdue,
                    penalty_amount: emi.penalty_amount,
                    total_amount: emi.total_amount,
                    timestamp: now,
                });
            }
            if !report.loans_affected.contains(&loan_id) {
                report.loans_affected.push(loan_id);
            }
        }

        for loan_id in &report.loans_affected {
            self.refresh_loan(*loan_id, now)?;
        }

        tracing::info!(
            business_date = %today,
            examined = report.examined,
            newly_overdue = report.newly_overdue,
            penalties_updated = report.penalties_updated,
            "overdue sweep finished"
        );

        Ok(report)
    }

    /// settle one installment; paying an already paid installment is a no-op
    pub fn mark_emi_paid(
        &mut self,
        emi_id: EmiId,
        expected_version: Option<u64>,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentOutcome> {
        let now = time_provider.now();
        let emi = self
            .emis
            .get_mut(&emi_id)
            .ok_or(LoanError::EmiNotFound { id: emi_id })?;

        if emi.status.is_paid() {
            tracing::debug!(%emi_id, "installment already paid");
            return Ok(PaymentOutcome::AlreadyPaid {
                emi_id,
                paid_at: emi.paid_at,
            });
        }

        emi.check_version(expected_version)?;
        emi.mark_paid(now)?;

        let loan_id = emi.loan_id;
        let amount = emi.total_amount;

        self.events.emit(Event::EmiPaid {
            loan_id,
            emi_id,
            amount,
            timestamp: now,
        });
        tracing::info!(%loan_id, %emi_id, %amount, "installment paid");

        let loan_completed = self.refresh_loan(loan_id, now)?;

        Ok(PaymentOutcome::Paid {
            emi_id,
            amount,
            paid_at: now,
            loan_completed,
        })
    }

    /// settle several installments; fails before paying anything if an id is unknown
    pub fn pay_multiple(
        &mut self,
        emi_ids: &[EmiId],
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<PaymentOutcome>> {
        if let Some(missing) = emi_ids.iter().find(|id| !self.emis.contains_key(*id)) {
            return Err(LoanError::EmiNotFound { id: *missing });
        }

        emi_ids
            .iter()
            .map(|emi_id| self.mark_emi_paid(*emi_id, None, time_provider))
            .collect()
    }

    /// waive the accrued penalty on an unpaid installment
    ///
    /// The installment keeps its status. Later sweeps only charge days after
    /// today's business date.
    pub fn clear_overdue(
        &mut self,
        emi_id: EmiId,
        expected_version: Option<u64>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Emi> {
        let now = time_provider.now();
        let today = self.config.calendar.business_date(now);
        let emi = self
            .emis
            .get_mut(&emi_id)
            .ok_or(LoanError::EmiNotFound { id: emi_id })?;

        emi.check_version(expected_version)?;
        let waived_amount = emi.penalty_amount;
        emi.waive_penalty(today)?;

        let cleared = emi.clone();

        self.events.emit(Event::OverdueCleared {
            loan_id: cleared.loan_id,
            emi_id,
            waived_amount,
            timestamp: now,
        });
        tracing::info!(loan_id = %cleared.loan_id, %emi_id, waived = %waived_amount, "overdue penalty cleared");

        self.refresh_loan(cleared.loan_id, now)?;
        Ok(cleared)
    }

    /// open a gateway order for an unpaid installment
    pub fn create_payment_order(
        &mut self,
        emi_id: EmiId,
        gateway: &dyn PaymentGateway,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentOrder> {
        let emi = self.emi_or_err(emi_id)?;
        if emi.status.is_paid() {
            return Err(LoanError::InvalidTransition {
                entity: "emi",
                from: emi.status.to_string(),
                to: "payment order".to_string(),
            });
        }

        let loan_id = emi.loan_id;
        let request = OrderRequest::for_emi(emi_id, emi.total_amount)?;
        let order = gateway.create_order(&request)?;

        self.events.emit(Event::PaymentOrderCreated {
            loan_id,
            emi_id,
            order_id: order.order_id.clone(),
            amount: order.amount,
            timestamp: time_provider.now(),
        });
        tracing::debug!(%emi_id, order_id = %order.order_id, "payment order created");

        self.orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    pub fn payment_order(&self, order_id: &str) -> Option<&PaymentOrder> {
        self.orders.get(order_id)
    }

    /// confirm a gateway payment and settle its installment
    ///
    /// The order must be one this book opened for the same installment, and
    /// its amount must still cover the installment's total. When the gateway
    /// cannot be reached the installment's own status decides: already paid
    /// reports success, anything else surfaces the gateway error.
    pub fn verify_payment(
        &mut self,
        verification: &PaymentVerification,
        gateway: &dyn PaymentGateway,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentOutcome> {
        let emi_id = verification.emi_id;
        let emi = self.emi_or_err(emi_id)?;
        let loan_id = emi.loan_id;

        if let Err(err) = self.check_order(verification, emi) {
            self.events.emit(Event::PaymentVerificationFailed {
                loan_id,
                emi_id,
                reason: err.to_string(),
                timestamp: time_provider.now(),
            });
            tracing::warn!(%emi_id, order_id = %verification.order_id, error = %err, "payment order refused");
            return Err(err);
        }

        match gateway.verify(verification) {
            Ok(true) => self.mark_emi_paid(emi_id, None, time_provider),
            Ok(false) => {
                self.events.emit(Event::PaymentVerificationFailed {
                    loan_id,
                    emi_id,
                    reason: "signature mismatch".to_string(),
                    timestamp: time_provider.now(),
                });
                tracing::warn!(%emi_id, order_id = %verification.order_id, "payment signature rejected");
                Err(LoanError::PaymentNotVerified { emi_id })
            }
            Err(err) => {
                let emi = self.emi_or_err(emi_id)?;
                if emi.status.is_paid() {
                    tracing::info!(%emi_id, "gateway unreachable but installment already paid");
                    return Ok(PaymentOutcome::AlreadyPaid {
                        emi_id,
                        paid_at: emi.paid_at,
                    });
                }

                self.events.emit(Event::PaymentVerificationFailed {
                    loan_id,
                    emi_id,
                    reason: err.to_string(),
                    timestamp: time_provider.now(),
                });
                tracing::warn!(%emi_id, error = %err, "payment verification failed");
                Err(err)
            }
        }
    }

    fn check_order(&self, verification: &PaymentVerification, emi: &Emi) -> Result<()> {
        let mismatch = |message: String| LoanError::PaymentOrderMismatch {
            order_id: verification.order_id.clone(),
            emi_id: emi.id,
            message,
        };

        let order = self
            .orders
            .get(&verification.order_id)
            .ok_or_else(|| mismatch("unknown order".to_string()))?;
        if order.emi_id != emi.id {
            return Err(mismatch(format!("order was opened for emi {}", order.emi_id)));
        }
        // penalties accrued since the order was opened
        if !emi.status.is_paid() && order.amount < emi.total_amount {
            return Err(mismatch(format!(
                "order amount {} is below the current total {}",
                order.amount, emi.total_amount
            )));
        }
        Ok(())
    }

    /// recompute cached totals; completes the loan once every installment is paid
    fn refresh_loan(&mut self, loan_id: LoanId, now: DateTime<Utc>) -> Result<bool> {
        let Some(loan) = self.loans.get_mut(&loan_id) else {
            return Ok(false);
        };

        let emis_by_id = &self.emis;
        let schedule: Vec<&Emi> = self
            .schedules
            .get(&loan_id)
            .map(|ids| ids.iter().filter_map(|id| emis_by_id.get(id)).collect())
            .unwrap_or_default();
        loan.refresh_totals(&schedule);

        if loan.status != LoanStatus::Approved || !loan.is_fully_paid() {
            return Ok(false);
        }

        loan.status = loan.status.transition(LoanStatus::Completed)?;
        loan.completed_at = Some(now);
        let total_paid = loan.totals.total_paid;

        if let Some(application) = self.applications.get_mut(&loan_id) {
            application.transition(LoanStatus::Completed, now)?;
        }

        self.events.emit(Event::StatusChanged {
            loan_id,
            old_status: LoanStatus::Approved,
            new_status: LoanStatus::Completed,
            reason: "all installments paid".to_string(),
            timestamp: now,
        });
        self.events.emit(Event::LoanCompleted {
            loan_id,
            total_paid,
            timestamp: now,
        });
        tracing::info!(%loan_id, %total_paid, "loan completed");

        Ok(true)
    }

    fn application_or_err(&self, loan_id: LoanId) -> Result<&LoanApplication> {
        self.applications
            .get(&loan_id)
            .ok_or(LoanError::ApplicationNotFound { id: loan_id })
    }

    fn emi_or_err(&self, emi_id: EmiId) -> Result<&Emi> {
        self.emis.get(&emi_id).ok_or(LoanError::EmiNotFound { id: emi_id })
    }

    // queries

    pub fn application(&self, loan_id: LoanId) -> Option<&LoanApplication> {
        self.applications.get(&loan_id)
    }

    pub fn loan(&self, loan_id: LoanId) -> Option<&Loan> {
        self.loans.get(&loan_id)
    }

    pub fn emi(&self, emi_id: EmiId) -> Option<&Emi> {
        self.emis.get(&emi_id)
    }

    /// applications awaiting a decision, oldest first
    pub fn pending_applications(&self) -> Vec<&LoanApplication> {
        let mut pending: Vec<&LoanApplication> = self
            .applications
            .values()
            .filter(|application| application.status == LoanStatus::Pending)
            .collect();
        pending.sort_by_key(|application| application.created_at);
        pending
    }

    /// an applicant's applications in any status, newest first
    pub fn applications_for_applicant(&self, applicant_id: ApplicantId) -> Vec<&LoanApplication> {
        let mut applications: Vec<&LoanApplication> = self
            .applications
            .values()
            .filter(|application| application.applicant_id == applicant_id)
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        applications
    }

    /// an applicant's approved and completed loans, newest first
    pub fn loans_for_applicant(&self, applicant_id: ApplicantId) -> Vec<&Loan> {
        let mut loans: Vec<&Loan> = self
            .loans
            .values()
            .filter(|loan| loan.applicant_id == applicant_id)
            .collect();
        loans.sort_by(|a, b| b.approved_at.cmp(&a.approved_at));
        loans
    }

    /// full schedule of a loan in day order
    pub fn schedule(&self, loan_id: LoanId) -> Vec<&Emi> {
        self.schedules
            .get(&loan_id)
            .map(|ids| ids.iter().filter_map(|id| self.emis.get(id)).collect())
            .unwrap_or_default()
    }

    /// one loan's installments, filtered and paginated
    pub fn emis_for_loan(&self, loan_id: LoanId, query: &EmiQuery) -> Result<Page<Emi>> {
        if !self.loans.contains_key(&loan_id) {
            return Err(LoanError::LoanNotFound { id: loan_id });
        }

        let matching: Vec<Emi> = self
            .schedule(loan_id)
            .into_iter()
            .filter(|emi| query.matches(emi))
            .cloned()
            .collect();

        Ok(Page::paginate(matching, query.page, query.per_page))
    }

    /// installments across all loans, ordered by due date
    pub fn search_emis(&self, query: &EmiQuery) -> Page<Emi> {
        let mut matching: Vec<&Emi> = self.emis.values().filter(|emi| query.matches(emi)).collect();
        matching.sort_by_key(|emi| (emi.due_date, emi.loan_id, emi.day_number));

        Page::paginate(matching.into_iter().cloned().collect(), query.page, query.per_page)
    }

    /// every installment due on today's business date, in any status
    pub fn todays_emis(&self, time_provider: &SafeTimeProvider) -> Vec<&Emi> {
        let today = self.business_date(time_provider);
        let mut due: Vec<&Emi> = self.emis.values().filter(|emi| emi.due_date == today).collect();
        due.sort_by_key(|emi| (emi.loan_id, emi.day_number));
        due
    }

    /// an applicant's unpaid installments, earliest first
    pub fn pending_emis(&self, applicant_id: ApplicantId) -> Vec<&Emi> {
        let mut pending: Vec<&Emi> = self
            .loans_for_applicant(applicant_id)
            .into_iter()
            .flat_map(|loan| self.schedule(loan.id))
            .filter(|emi| emi.status.is_unpaid())
            .collect();
        pending.sort_by_key(|emi| (emi.due_date, emi.day_number));
        pending
    }

    /// portfolio dashboard over every loan and installment
    pub fn emi_totals(&self) -> EmiTotals {
        let mut totals = EmiTotals::default();

        for application in self.applications.values() {
            totals.total_loans += 1;
            match application.status {
                LoanStatus::Pending => totals.pending_loans += 1,
                LoanStatus::Approved | LoanStatus::Completed => totals.approved_loans += 1,
                LoanStatus::Rejected => {}
            }
        }
        totals.total_disbursed = self.loans.values().map(|loan| loan.amount).sum();

        let aggregate = LoanTotals::from_emis(self.emis.values());
        totals.total_emis = aggregate.emi_count;
        totals.paid_emis = aggregate.paid_count;
        totals.pending_emis = aggregate.pending_count;
        totals.overdue_emis = aggregate.overdue_count;
        totals.collected_amount = aggregate.total_paid;
        totals.pending_amount = aggregate.outstanding();
        totals.total_penalty = aggregate.penalty_amount;
        totals.total_amount = aggregate.total_paid + aggregate.outstanding();
        totals.collection_rate = collection_rate(aggregate.paid_count, aggregate.emi_count);

        totals
    }
}

/// paid share of installments, in percent to one decimal place
fn collection_rate(paid: u32, total: u32) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(paid) * Decimal::ONE_HUNDRED / Decimal::from(total))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// result of settling an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Paid {
        emi_id: EmiId,
        amount: Money,
        paid_at: DateTime<Utc>,
        loan_completed: bool,
    },
    AlreadyPaid {
        emi_id: EmiId,
        paid_at: Option<DateTime<Utc>>,
    },
}

impl PaymentOutcome {
    pub fn emi_id(&self) -> EmiId {
        match self {
            PaymentOutcome::Paid { emi_id, .. } | PaymentOutcome::AlreadyPaid { emi_id, .. } => *emi_id,
        }
    }

    pub fn is_newly_paid(&self) -> bool {
        matches!(self, PaymentOutcome::Paid { .. })
    }
}

/// what an overdue sweep did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub business_date: NaiveDate,
    /// unpaid installments past their due date
    pub examined: u32,
    pub newly_overdue: u32,
    pub penalties_updated: u32,
    /// penalty carried by the examined installments after the sweep
    pub total_penalty: Money,
    pub loans_affected: Vec<LoanId>,
}

/// installment filter; an empty status list matches every status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiQuery {
    pub statuses: Vec<EmiStatus>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    /// 1-based
    pub page: u32,
    pub per_page: u32,
}

impl Default for EmiQuery {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            due_from: None,
            due_to: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl EmiQuery {
    pub fn with_statuses(statuses: &[EmiStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Self::default()
        }
    }

    /// inclusive due date range
    pub fn due_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.due_from = Some(from);
        self.due_to = Some(to);
        self
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn matches(&self, emi: &Emi) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&emi.status))
            && self.due_from.map_or(true, |from| emi.due_date >= from)
            && self.due_to.map_or(true, |to| emi.due_date <= to)
    }
}

/// one page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn paginate(items: Vec<T>, page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = items.len() as u32;
        let pages = (total + per_page - 1) / per_page;
        let skip = (page as usize - 1).saturating_mul(per_page as usize);

        Self {
            items: items.into_iter().skip(skip).take(per_page as usize).collect(),
            page,
            per_page,
            total,
            pages,
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.pages
    }
}

/// admin dashboard figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmiTotals {
    pub total_loans: u32,
    pub approved_loans: u32,
    pub pending_loans: u32,
    pub total_disbursed: Money,
    pub total_emis: u32,
    pub paid_emis: u32,
    pub pending_emis: u32,
    pub overdue_emis: u32,
    pub total_amount: Money,
    pub collected_amount: Money,
    /// unpaid principal, interest and penalties
    pub pending_amount: Money,
    pub total_penalty: Money,
    /// percent of installments paid
    pub collection_rate: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{MockPaymentGateway, MockVerifyMode};
    use chrono::{Duration, TimeZone};
    use hourglass_rs::TimeSource;
    use uuid::Uuid;

    fn request(amount: i64) -> LoanApplicationRequest {
        LoanApplicationRequest {
            amount: Some(Money::from_major(amount)),
            name: "Ravi Kumar".to_string(),
            mobile: "9123456780".to_string(),
            address: "4 Station Road, Nagpur".to_string(),
            aadhaar_number: "987654321098".to_string(),
            pan_number: "PQRSX6789K".to_string(),
            aadhaar_image: Some("aadhaar.jpg".to_string()),
            pan_image: Some("pan.jpg".to_string()),
        }
    }

    // 09:00 IST on 2024-01-01
    fn clock() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 1, 1, 3, 30, 0).unwrap()))
    }

    fn approved_book(amount: i64, total_days: u32, time: &SafeTimeProvider) -> (LoanBook, LoanId) {
        let mut book = LoanBook::standard();
        let application = book.apply(Uuid::new_v4(), &request(amount), time).unwrap();
        book.approve(
            application.id,
            &ApprovalRequest {
                amount: None,
                total_days: Some(total_days),
            },
            time,
        )
        .unwrap();
        (book, application.id)
    }

    #[test]
    fn test_apply_creates_pending_application() {
        let time = clock();
        let mut book = LoanBook::standard();
        let applicant_id = Uuid::new_v4();

        let application = book.apply(applicant_id, &request(50_000), &time).unwrap();

        assert_eq!(application.status, LoanStatus::Pending);
        assert_eq!(book.pending_applications().len(), 1);
        assert_eq!(book.applications_for_applicant(applicant_id).len(), 1);
        assert!(matches!(book.events.events()[0], Event::ApplicationSubmitted { .. }));
    }

    #[test]
    fn test_invalid_application_is_not_stored() {
        let time = clock();
        let mut book = LoanBook::standard();

        let result = book.apply(Uuid::new_v4(), &request(999), &time);

        assert!(matches!(result, Err(LoanError::Validation(_))));
        assert!(book.pending_applications().is_empty());
        assert!(book.events.events().is_empty());
    }

    #[test]
    fn test_approve_generates_schedule_once() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);

        let loan = book.loan(loan_id).unwrap();
        assert_eq!(loan.daily_emi, Money::from_major(600));
        assert_eq!(loan.total_payable, Money::from_major(60_000));
        assert_eq!(loan.start_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(loan.totals.remaining_balance, Money::from_major(60_000));
        assert_eq!(book.schedule(loan_id).len(), 100);

        let again = book.approve(loan_id, &ApprovalRequest::default(), &time);
        assert!(matches!(again, Err(LoanError::AlreadyDecided { .. })));
        assert_eq!(book.schedule(loan_id).len(), 100);
    }

    #[test]
    fn test_invalid_approval_leaves_application_pending() {
        let time = clock();
        let mut book = LoanBook::standard();
        let application = book.apply(Uuid::new_v4(), &request(10_000), &time).unwrap();

        let result = book.approve(
            application.id,
            &ApprovalRequest {
                amount: None,
                total_days: Some(366),
            },
            &time,
        );

        assert!(matches!(result, Err(LoanError::InvalidApprovalParameters { .. })));
        assert_eq!(book.application(application.id).unwrap().status, LoanStatus::Pending);
        assert!(book.loan(application.id).is_none());
        assert!(book.schedule(application.id).is_empty());
    }

    #[test]
    fn test_reject_is_terminal() {
        let time = clock();
        let mut book = LoanBook::standard();
        let application = book.apply(Uuid::new_v4(), &request(10_000), &time).unwrap();

        let rejected = book.reject(application.id, None, &time).unwrap();
        assert_eq!(rejected.status, LoanStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Application rejected by admin"));

        assert!(book.approve(application.id, &ApprovalRequest::default(), &time).is_err());
        assert!(book.reject(application.id, Some("again"), &time).is_err());
        assert!(book.schedule(application.id).is_empty());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);

        // day 1 falls due 2024-01-02; on 2024-01-05 it is three days late
        time.test_control().unwrap().advance(Duration::days(4));

        let first = book.process_overdues(&time).unwrap();
        assert_eq!(first.examined, 3);
        assert_eq!(first.newly_overdue, 3);

        let day_one = book.schedule(loan_id)[0].clone();
        assert_eq!(day_one.status, EmiStatus::Overdue);
        assert_eq!(day_one.penalty_amount, Money::from_major(750));
        assert_eq!(day_one.total_amount, Money::from_major(1_350));

        let events_before = book.events.events().len();
        let second = book.process_overdues(&time).unwrap();
        assert_eq!(second.newly_overdue, 0);
        assert_eq!(second.penalties_updated, 0);
        assert_eq!(second.total_penalty, first.total_penalty);
        assert_eq!(book.events.events().len(), events_before);
        assert_eq!(book.schedule(loan_id)[0].clone(), day_one);
    }

    #[test]
    fn test_double_payment_is_a_no_op() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        let emi_id = book.schedule(loan_id)[0].id;

        let first = book.mark_emi_paid(emi_id, None, &time).unwrap();
        assert!(first.is_newly_paid());
        let paid_total = book.loan(loan_id).unwrap().totals.total_paid;

        let second = book.mark_emi_paid(emi_id, Some(0), &time).unwrap();
        assert!(matches!(second, PaymentOutcome::AlreadyPaid { .. }));
        assert_eq!(book.loan(loan_id).unwrap().totals.total_paid, paid_total);
        assert_eq!(paid_total, Money::from_major(600));
    }

    #[test]
    fn test_stale_version_is_refused() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        time.test_control().unwrap().advance(Duration::days(3));
        book.process_overdues(&time).unwrap();

        let emi = book.schedule(loan_id)[0].clone();
        let stale = emi.version - 1;

        assert!(matches!(
            book.clear_overdue(emi.id, Some(stale), &time),
            Err(LoanError::StaleVersion { .. })
        ));
        assert!(matches!(
            book.mark_emi_paid(emi.id, Some(stale), &time),
            Err(LoanError::StaleVersion { .. })
        ));

        let cleared = book.clear_overdue(emi.id, Some(emi.version), &time).unwrap();
        assert_eq!(cleared.penalty_amount, Money::ZERO);
        assert!(book.mark_emi_paid(emi.id, Some(cleared.version), &time).is_ok());
    }

    #[test]
    fn test_waiver_survives_later_sweeps() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        time.test_control().unwrap().advance(Duration::days(4));
        book.process_overdues(&time).unwrap();

        let emi_id = book.schedule(loan_id)[0].id;
        book.clear_overdue(emi_id, None, &time).unwrap();

        book.process_overdues(&time).unwrap();
        assert_eq!(book.emi(emi_id).unwrap().penalty_amount, Money::ZERO);

        time.test_control().unwrap().advance(Duration::days(2));
        book.process_overdues(&time).unwrap();
        assert_eq!(book.emi(emi_id).unwrap().penalty_amount, Money::from_major(500));
    }

    #[test]
    fn test_clearing_paid_installment_is_refused() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        let emi_id = book.schedule(loan_id)[0].id;
        book.mark_emi_paid(emi_id, None, &time).unwrap();

        assert!(matches!(
            book.clear_overdue(emi_id, None, &time),
            Err(LoanError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_paying_everything_completes_loan() {
        let time = clock();
        let (mut book, loan_id) = approved_book(1_000, 3, &time);
        let ids: Vec<EmiId> = book.schedule(loan_id).iter().map(|emi| emi.id).collect();

        let outcomes = book.pay_multiple(&ids, &time).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.last().map_or(false, |outcome| matches!(
            outcome,
            PaymentOutcome::Paid { loan_completed: true, .. }
        )));

        let loan = book.loan(loan_id).unwrap();
        assert_eq!(loan.status, LoanStatus::Completed);
        assert_eq!(loan.totals.total_paid, loan.total_payable);
        assert_eq!(loan.totals.remaining_balance, Money::ZERO);
        assert_eq!(book.application(loan_id).unwrap().status, LoanStatus::Completed);
    }

    #[test]
    fn test_pay_multiple_checks_ids_first() {
        let time = clock();
        let (mut book, loan_id) = approved_book(1_000, 3, &time);
        let first = book.schedule(loan_id)[0].id;

        let result = book.pay_multiple(&[first, Uuid::new_v4()], &time);
        assert!(matches!(result, Err(LoanError::EmiNotFound { .. })));
        assert_eq!(book.emi(first).unwrap().status, EmiStatus::Pending);
    }

    #[test]
    fn test_emis_for_loan_paginates_by_status() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        let ids: Vec<EmiId> = book.schedule(loan_id).iter().take(25).map(|emi| emi.id).collect();
        book.pay_multiple(&ids, &time).unwrap();

        let paid = book
            .emis_for_loan(loan_id, &EmiQuery::with_statuses(&[EmiStatus::Paid]).page(1, 10))
            .unwrap();
        assert_eq!(paid.total, 25);
        assert_eq!(paid.pages, 3);
        assert_eq!(paid.items.len(), 10);
        assert!(paid.has_more());

        let last = book
            .emis_for_loan(loan_id, &EmiQuery::with_statuses(&[EmiStatus::Paid]).page(3, 10))
            .unwrap();
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_more());

        assert!(matches!(
            book.emis_for_loan(Uuid::new_v4(), &EmiQuery::default()),
            Err(LoanError::LoanNotFound { .. })
        ));
    }

    #[test]
    fn test_todays_and_pending_emis() {
        let time = clock();
        let (book, loan_id) = approved_book(1_000, 5, &time);
        let applicant_id = book.loan(loan_id).unwrap().applicant_id;

        assert!(book.todays_emis(&time).is_empty());
        time.test_control().unwrap().advance(Duration::days(1));
        let today = book.todays_emis(&time);
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].day_number, 1);

        assert_eq!(book.pending_emis(applicant_id).len(), 5);
    }

    #[test]
    fn test_delete_loan_removes_everything() {
        let time = clock();
        let (mut book, loan_id) = approved_book(1_000, 5, &time);

        assert_eq!(book.delete_loan(loan_id, &time).unwrap(), 5);
        assert!(book.loan(loan_id).is_none());
        assert!(book.application(loan_id).is_none());
        assert!(book.schedule(loan_id).is_empty());
        assert!(matches!(book.delete_loan(loan_id, &time), Err(LoanError::LoanNotFound { .. })));
    }

    #[test]
    fn test_emi_totals() {
        let time = clock();
        let (mut book, loan_id) = approved_book(1_000, 4, &time);
        book.apply(Uuid::new_v4(), &request(2_000), &time).unwrap();

        let first = book.schedule(loan_id)[0].id;
        book.mark_emi_paid(first, None, &time).unwrap();

        let totals = book.emi_totals();
        assert_eq!(totals.total_loans, 2);
        assert_eq!(totals.pending_loans, 1);
        assert_eq!(totals.approved_loans, 1);
        assert_eq!(totals.total_disbursed, Money::from_major(1_000));
        assert_eq!(totals.total_emis, 4);
        assert_eq!(totals.paid_emis, 1);
        assert_eq!(totals.collected_amount, Money::from_major(300));
        assert_eq!(totals.total_amount, Money::from_major(1_200));
        assert_eq!(totals.collection_rate, Decimal::from(25));
    }

    #[test]
    fn test_gateway_payment_flow() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        let emi_id = book.schedule(loan_id)[0].id;
        let gateway = MockPaymentGateway::new(time.now());

        let order = book.create_payment_order(emi_id, &gateway, &time).unwrap();
        assert_eq!(order.amount, Money::from_major(600));

        let verification = PaymentVerification {
            emi_id,
            order_id: order.order_id,
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };

        gateway.set_mode(MockVerifyMode::Reject);
        assert!(matches!(
            book.verify_payment(&verification, &gateway, &time),
            Err(LoanError::PaymentNotVerified { .. })
        ));

        gateway.set_mode(MockVerifyMode::Unreachable);
        assert!(matches!(
            book.verify_payment(&verification, &gateway, &time),
            Err(LoanError::Gateway { .. })
        ));
        assert_eq!(book.emi(emi_id).unwrap().status, EmiStatus::Pending);

        gateway.set_mode(MockVerifyMode::Accept);
        assert!(book.verify_payment(&verification, &gateway, &time).unwrap().is_newly_paid());

        // a later transport failure defers to the stored status
        gateway.set_mode(MockVerifyMode::Unreachable);
        assert!(matches!(
            book.verify_payment(&verification, &gateway, &time),
            Ok(PaymentOutcome::AlreadyPaid { .. })
        ));
        assert!(book.create_payment_order(emi_id, &gateway, &time).is_err());
    }

    fn verification_for(emi_id: EmiId, order_id: &str) -> PaymentVerification {
        PaymentVerification {
            emi_id,
            order_id: order_id.to_string(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        }
    }

    #[test]
    fn test_order_settles_only_its_own_installment() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        let first = book.schedule(loan_id)[0].id;
        let fourth = book.schedule(loan_id)[3].id;
        let gateway = MockPaymentGateway::new(time.now());

        let order = book.create_payment_order(first, &gateway, &time).unwrap();

        assert!(matches!(
            book.verify_payment(&verification_for(fourth, &order.order_id), &gateway, &time),
            Err(LoanError::PaymentOrderMismatch { .. })
        ));
        assert!(matches!(
            book.verify_payment(&verification_for(first, "order_9999"), &gateway, &time),
            Err(LoanError::PaymentOrderMismatch { .. })
        ));

        assert_eq!(book.emi(fourth).unwrap().status, EmiStatus::Pending);
        assert_eq!(book.loan(loan_id).unwrap().totals.total_paid, Money::ZERO);
        assert_eq!(
            book.events
                .events_for(loan_id)
                .filter(|e| matches!(e, Event::PaymentVerificationFailed { .. }))
                .count(),
            2
        );

        let outcome = book
            .verify_payment(&verification_for(first, &order.order_id), &gateway, &time)
            .unwrap();
        assert_eq!(outcome.emi_id(), first);
        assert_eq!(book.loan(loan_id).unwrap().totals.total_paid, Money::from_major(600));
    }

    #[test]
    fn test_order_opened_before_penalties_is_refused() {
        let time = clock();
        let (mut book, loan_id) = approved_book(50_000, 100, &time);
        let first = book.schedule(loan_id)[0].id;
        let gateway = MockPaymentGateway::new(time.now());

        let stale = book.create_payment_order(first, &gateway, &time).unwrap();
        assert_eq!(stale.amount, Money::from_major(600));

        time.test_control().unwrap().advance(Duration::days(5));
        book.process_overdues(&time).unwrap();
        assert_eq!(book.emi(first).unwrap().total_amount, Money::from_major(1_600));

        assert!(matches!(
            book.verify_payment(&verification_for(first, &stale.order_id), &gateway, &time),
            Err(LoanError::PaymentOrderMismatch { .. })
        ));
        assert_eq!(book.emi(first).unwrap().status, EmiStatus::Overdue);
        assert_eq!(book.loan(loan_id).unwrap().totals.total_paid, Money::ZERO);

        let fresh = book.create_payment_order(first, &gateway, &time).unwrap();
        assert_eq!(fresh.amount, Money::from_major(1_600));
        assert_eq!(book.payment_order(&fresh.order_id), Some(&fresh));
        let outcome = book
            .verify_payment(&verification_for(first, &fresh.order_id), &gateway, &time)
            .unwrap();
        assert!(matches!(outcome, PaymentOutcome::Paid { amount, .. } if amount == Money::from_major(1_600)));
    }
}
