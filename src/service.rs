//! Service facade over the core workflow.
//!
//! [`ScholarshipService`] is constructed with its storage, notification sink
//! and settings, so it holds no process-wide state. Notifications are sent
//! only after the underlying transaction has committed, and idempotent reads
//! go through the bounded read retry.

use crate::{
    config::settings::EngineSettings,
    core::{
        access::Caller,
        allocation::{self, Disbursement, NewAllocation},
        application,
        budget::{self, BudgetSummary},
        eligibility::EligibilityResult,
        notify::{Notification, NotificationSink, send_best_effort},
        report::{self, RankedApplication, UtilizationReport},
        retry::retry_read,
    },
    entities::{AllocationModel, ApplicationModel, ApplicationStatus},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Entry point for callers of the application lifecycle and allocation workflow.
#[derive(Clone)]
pub struct ScholarshipService {
    db: DatabaseConnection,
    notifier: Arc<dyn NotificationSink>,
    settings: EngineSettings,
}

impl std::fmt::Debug for ScholarshipService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScholarshipService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ScholarshipService {
    pub fn new(
        db: DatabaseConnection,
        notifier: Arc<dyn NotificationSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            db,
            notifier,
            settings,
        }
    }

    /// Underlying connection, for the draft editor and administration calls.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn notify(&self, notification: &Notification) {
        send_best_effort(self.notifier.as_ref(), notification);
    }

    pub async fn create_application(
        &self,
        caller: &Caller,
        scholarship_id: i64,
    ) -> Result<ApplicationModel> {
        application::create_application(&self.db, caller, scholarship_id).await
    }

    pub async fn get_application(
        &self,
        caller: &Caller,
        application_id: i64,
    ) -> Result<ApplicationModel> {
        retry_read(&self.settings, "get_application", || {
            application::get_application(&self.db, caller, application_id)
        })
        .await
    }

    /// Screens an application against its scholarship's criteria.
    pub async fn check_eligibility(
        &self,
        caller: &Caller,
        application_id: i64,
    ) -> Result<EligibilityResult> {
        retry_read(&self.settings, "check_eligibility", || {
            application::check_eligibility(&self.db, caller, application_id)
        })
        .await
    }

    pub async fn delete_application(&self, caller: &Caller, application_id: i64) -> Result<()> {
        application::delete_application(&self.db, caller, application_id).await
    }

    /// Submits a draft and notifies the student.
    pub async fn submit_application(
        &self,
        caller: &Caller,
        application_id: i64,
    ) -> Result<ApplicationModel> {
        let submitted = application::submit_application(&self.db, caller, application_id).await?;
        self.notify(&Notification::submitted(&submitted.student_id, submitted.id));
        Ok(submitted)
    }

    /// Records a review; decisions notify the student.
    pub async fn review_application(
        &self,
        caller: &Caller,
        application_id: i64,
        target: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<ApplicationModel> {
        let (_, reviewed) =
            application::review_application(&self.db, caller, application_id, target, notes)
                .await?;

        match reviewed.status {
            ApplicationStatus::Approved => {
                self.notify(&Notification::decision(&reviewed.student_id, reviewed.id, true));
            }
            ApplicationStatus::Rejected => {
                self.notify(&Notification::decision(&reviewed.student_id, reviewed.id, false));
            }
            _ => {}
        }
        Ok(reviewed)
    }

    pub async fn create_allocation(
        &self,
        caller: &Caller,
        new: NewAllocation,
    ) -> Result<AllocationModel> {
        allocation::create_allocation(&self.db, caller, new).await
    }

    pub async fn approve_allocation(
        &self,
        caller: &Caller,
        allocation_id: i64,
    ) -> Result<AllocationModel> {
        allocation::approve_allocation(&self.db, caller, allocation_id).await
    }

    /// Records a disbursement and notifies the funded student.
    ///
    /// The recipient comes from the disbursing transaction itself, so nothing
    /// after the commit can turn a recorded payment into an error.
    pub async fn disburse_allocation(
        &self,
        caller: &Caller,
        allocation_id: i64,
        transfer_date: NaiveDate,
        transfer_reference: &str,
    ) -> Result<AllocationModel> {
        let Disbursement {
            allocation: disbursed,
            application: funded,
        } = allocation::disburse_allocation(
            &self.db,
            caller,
            allocation_id,
            transfer_date,
            transfer_reference,
        )
        .await?;

        self.notify(&Notification::disbursed(
            &funded.student_id,
            funded.id,
            transfer_reference.trim(),
        ));
        Ok(disbursed)
    }

    pub async fn budget_summary(&self, scholarship_id: i64, budget_year: i32) -> Result<BudgetSummary> {
        retry_read(&self.settings, "budget_summary", || {
            budget::budget_summary(&self.db, scholarship_id, budget_year)
        })
        .await
    }

    pub async fn utilization_report(
        &self,
        scholarship_id: i64,
        budget_year: i32,
    ) -> Result<UtilizationReport> {
        retry_read(&self.settings, "utilization_report", || {
            report::utilization_report(&self.db, scholarship_id, budget_year)
        })
        .await
    }

    pub async fn priority_ranking(
        &self,
        caller: &Caller,
        scholarship_id: i64,
    ) -> Result<Vec<RankedApplication>> {
        retry_read(&self.settings, "priority_ranking", || {
            report::priority_ranking(&self.db, caller, scholarship_id)
        })
        .await
    }
}
