use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ApplicantId, EmiId, LoanId, LoanStatus};

/// all events that can be emitted by the loan book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // application events
    ApplicationSubmitted {
        loan_id: LoanId,
        applicant_id: ApplicantId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    ApplicationRejected {
        loan_id: LoanId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // lifecycle events
    LoanApproved {
        loan_id: LoanId,
        amount: Money,
        total_days: u32,
        daily_emi: Money,
        total_payable: Money,
        start_date: NaiveDate,
        end_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    ScheduleGenerated {
        loan_id: LoanId,
        emi_count: u32,
        first_due_date: NaiveDate,
        last_due_date: NaiveDate,
    },
    LoanCompleted {
        loan_id: LoanId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },
    LoanDeleted {
        loan_id: LoanId,
        emis_removed: u32,
        timestamp: DateTime<Utc>,
    },

    // installment events
    EmiOverdue {
        loan_id: LoanId,
        emi_id: EmiId,
        due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    PenaltyAccrued {
        loan_id: LoanId,
        emi_id: EmiId,
        days_overdue: u32,
        penalty_amount: Money,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    EmiPaid {
        loan_id: LoanId,
        emi_id: EmiId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    OverdueCleared {
        loan_id: LoanId,
        emi_id: EmiId,
        waived_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // gateway events
    PaymentOrderCreated {
        loan_id: LoanId,
        emi_id: EmiId,
        order_id: String,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentVerificationFailed {
        loan_id: LoanId,
        emi_id: EmiId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// the loan this event concerns, for routing to subscribers
    pub fn loan_id(&self) -> LoanId {
        match self {
            Event::ApplicationSubmitted { loan_id, .. }
            | Event::ApplicationRejected { loan_id, .. }
            | Event::LoanApproved { loan_id, .. }
            | Event::ScheduleGenerated { loan_id, .. }
            | Event::LoanCompleted { loan_id, .. }
            | Event::LoanDeleted { loan_id, .. }
            | Event::EmiOverdue { loan_id, .. }
            | Event::PenaltyAccrued { loan_id, .. }
            | Event::EmiPaid { loan_id, .. }
            | Event::OverdueCleared { loan_id, .. }
            | Event::PaymentOrderCreated { loan_id, .. }
            | Event::PaymentVerificationFailed { loan_id, .. }
            | Event::StatusChanged { loan_id, .. } => *loan_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// events for one loan, oldest first
    pub fn events_for(&self, loan_id: LoanId) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |event| event.loan_id() == loan_id)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
