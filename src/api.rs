use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::types::{EmiId, LoanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// what a client may do after a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// reads; retry automatically
    Safe,
    /// surface the failure and let the user start again
    UserReinitiated,
}

/// logical endpoints of the loan service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    // borrower
    Config,
    ApplyLoan,
    MyLoans,
    LoanDetails { loan_id: LoanId },
    LoanEmis { loan_id: LoanId },
    EmiDetails { emi_id: EmiId },
    PendingEmis,
    TodayEmis,
    UpdateProfile,
    UploadImage,

    // payments
    CreatePaymentOrder,
    VerifyPayment,
    PayMultiple,

    // admin
    PendingApplications,
    ApproveLoan { loan_id: LoanId },
    RejectLoan { loan_id: LoanId },
    DeleteLoan { loan_id: LoanId },
    ProcessOverdues,
    AdminTodayEmis,
    TotalEmis,
    SearchEmis,
    MarkEmiPaid { emi_id: EmiId },
    ClearOverdue { emi_id: EmiId },
    UpdateSettings,
}

impl Endpoint {
    pub fn method(&self) -> HttpMethod {
        use Endpoint::*;
        match self {
            Config | MyLoans | LoanDetails { .. } | LoanEmis { .. } | EmiDetails { .. } | PendingEmis
            | TodayEmis | PendingApplications | AdminTodayEmis | TotalEmis | SearchEmis => HttpMethod::Get,
            ApplyLoan | UploadImage | CreatePaymentOrder | VerifyPayment | PayMultiple | ProcessOverdues => {
                HttpMethod::Post
            }
            UpdateProfile | ApproveLoan { .. } | RejectLoan { .. } | MarkEmiPaid { .. } | ClearOverdue { .. }
            | UpdateSettings => HttpMethod::Put,
            DeleteLoan { .. } => HttpMethod::Delete,
        }
    }

    /// path with ids filled in
    pub fn path(&self) -> String {
        use Endpoint::*;
        match self {
            Config => "/config".to_string(),
            ApplyLoan => "/loan/apply".to_string(),
            MyLoans => "/loan/my-loans".to_string(),
            LoanDetails { loan_id } => format!("/loan/{}", loan_id),
            LoanEmis { loan_id } => format!("/emi/loan/{}", loan_id),
            EmiDetails { emi_id } => format!("/emi/{}", emi_id),
            PendingEmis => "/emi/pending".to_string(),
            TodayEmis => "/emi/today".to_string(),
            UpdateProfile => "/user/profile".to_string(),
            UploadImage => "/user/upload-image".to_string(),
            CreatePaymentOrder => "/payment/create-order".to_string(),
            VerifyPayment => "/payment/verify".to_string(),
            PayMultiple => "/payment/pay-multiple".to_string(),
            PendingApplications => "/admin/loans/pending".to_string(),
            ApproveLoan { loan_id } => format!("/admin/loans/{}/approve", loan_id),
            RejectLoan { loan_id } => format!("/admin/loans/{}/reject", loan_id),
            DeleteLoan { loan_id } => format!("/admin/loans/{}", loan_id),
            ProcessOverdues => "/admin/process-overdues".to_string(),
            AdminTodayEmis => "/admin/emis/today".to_string(),
            TotalEmis => "/admin/emis/total".to_string(),
            SearchEmis => "/admin/emis".to_string(),
            MarkEmiPaid { emi_id } => format!("/admin/emis/{}/mark-paid", emi_id),
            ClearOverdue { emi_id } => format!("/admin/emis/{}/clear-overdue", emi_id),
            UpdateSettings => "/admin/settings".to_string(),
        }
    }

    pub fn timeout(&self, client: &ClientConfig) -> Duration {
        match self {
            Endpoint::UploadImage => client.upload_timeout(),
            Endpoint::UpdateProfile => client.profile_update_timeout(),
            Endpoint::UpdateSettings => client.settings_update_timeout(),
            _ => client.default_timeout(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.method() {
            HttpMethod::Get => RetryPolicy::Safe,
            _ => RetryPolicy::UserReinitiated,
        }
    }

    /// failures here must always reach the user
    pub fn mutates_money(&self) -> bool {
        use Endpoint::*;
        matches!(
            self,
            ApproveLoan { .. }
                | DeleteLoan { .. }
                | ProcessOverdues
                | MarkEmiPaid { .. }
                | ClearOverdue { .. }
                | VerifyPayment
                | PayMultiple
        )
    }

    pub fn requires_admin(&self) -> bool {
        self.path().starts_with("/admin/")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LendingConfig;
    use uuid::Uuid;

    #[test]
    fn test_paths_substitute_ids() {
        let loan_id = Uuid::new_v4();
        let approve = Endpoint::ApproveLoan { loan_id };
        assert_eq!(approve.path(), format!("/admin/loans/{}/approve", loan_id));
        assert_eq!(approve.method(), HttpMethod::Put);
        assert_eq!(
            Endpoint::DeleteLoan { loan_id }.to_string(),
            format!("DELETE /admin/loans/{}", loan_id)
        );
    }

    #[test]
    fn test_timeouts() {
        let client = LendingConfig::standard().client;
        assert_eq!(Endpoint::ApplyLoan.timeout(&client), Duration::from_secs(10));
        assert_eq!(Endpoint::UploadImage.timeout(&client), Duration::from_secs(30));
        assert_eq!(Endpoint::UpdateProfile.timeout(&client), Duration::from_secs(60));
        assert_eq!(Endpoint::UpdateSettings.timeout(&client), Duration::from_secs(30));
    }

    #[test]
    fn test_only_reads_retry_automatically() {
        let emi_id = Uuid::new_v4();
        assert_eq!(Endpoint::LoanEmis { loan_id: Uuid::new_v4() }.retry_policy(), RetryPolicy::Safe);
        assert_eq!(Endpoint::VerifyPayment.retry_policy(), RetryPolicy::UserReinitiated);
        assert_eq!(Endpoint::ApplyLoan.retry_policy(), RetryPolicy::UserReinitiated);

        assert!(Endpoint::MarkEmiPaid { emi_id }.mutates_money());
        assert!(Endpoint::ClearOverdue { emi_id }.mutates_money());
        assert!(!Endpoint::CreatePaymentOrder.mutates_money());
        assert!(!Endpoint::TotalEmis.mutates_money());
    }

    #[test]
    fn test_admin_endpoints() {
        assert!(Endpoint::ProcessOverdues.requires_admin());
        assert!(!Endpoint::PayMultiple.requires_admin());
    }
}
