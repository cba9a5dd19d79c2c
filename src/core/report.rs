//! Report generation business logic.
//!
//! Read-only aggregates for dashboards: application counts by status, budget
//! utilization with a text progress bar, and priority ranking of applications
//! under review. Nothing here writes.

use crate::{
    core::{
        access::Caller,
        application::student_profile,
        budget::{BudgetSummary, budget_summary},
        priority::{self, PriorityScore},
        quota::{QuotaStatus, quota_status},
        scholarship::require_scholarship,
    },
    entities::{Application, ApplicationStatus, application},
    errors::Result,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::{Iterable, PaginatorTrait, QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Budget and quota usage of one scholarship year.
#[derive(Debug, Clone, Serialize)]
pub struct UtilizationReport {
    pub scholarship_name: String,
    pub budget: BudgetSummary,
    pub quota: QuotaStatus,
    /// e.g. `[███░░░░░░░] 30.0%`
    pub progress_bar: String,
}

/// One row of [`priority_ranking`].
#[derive(Debug, Clone, Serialize)]
pub struct RankedApplication {
    pub application_id: i64,
    pub student_id: String,
    pub status: ApplicationStatus,
    pub score: PriorityScore,
}

/// Counts applications per status, including zero counts.
pub async fn application_counts<C>(
    db: &C,
    scholarship_id: Option<i64>,
) -> Result<BTreeMap<ApplicationStatus, u64>>
where
    C: ConnectionTrait,
{
    let mut counts = BTreeMap::new();
    for status in ApplicationStatus::iter() {
        let mut query = Application::find().filter(application::Column::Status.eq(status));
        if let Some(id) = scholarship_id {
            query = query.filter(application::Column::ScholarshipId.eq(id));
        }
        counts.insert(status, query.count(db).await?);
    }
    Ok(counts)
}

/// Builds the utilization report for a scholarship year.
pub async fn utilization_report<C>(
    db: &C,
    scholarship_id: i64,
    budget_year: i32,
) -> Result<UtilizationReport>
where
    C: ConnectionTrait,
{
    let scholarship = require_scholarship(db, scholarship_id).await?;
    let budget = budget_summary(db, scholarship_id, budget_year).await?;
    let quota = quota_status(db, scholarship_id).await?;
    let progress_bar = format_progress_bar(
        budget.utilization_percent.to_f64().unwrap_or_default(),
        None,
    );

    Ok(UtilizationReport {
        scholarship_name: scholarship.name,
        budget,
        quota,
        progress_bar,
    })
}

/// Ranks applications that are in review or approved by priority score,
/// highest first. Applications without a declared GPA or financial section
/// cannot be scored and are left out.
pub async fn priority_ranking<C>(
    db: &C,
    caller: &Caller,
    scholarship_id: i64,
) -> Result<Vec<RankedApplication>>
where
    C: ConnectionTrait,
{
    caller.require_staff()?;

    let mut ranked_statuses = ApplicationStatus::REVIEWABLE.to_vec();
    ranked_statuses.push(ApplicationStatus::Approved);

    let applications = Application::find()
        .filter(application::Column::ScholarshipId.eq(scholarship_id))
        .filter(application::Column::Status.is_in(ranked_statuses))
        .order_by_asc(application::Column::Id)
        .all(db)
        .await?;

    let mut ranked = Vec::with_capacity(applications.len());
    for app in applications {
        let profile = student_profile(db, app.id).await?;
        let (Some(gpa), Some(income)) = (profile.gpa, profile.family_income) else {
            debug!(application_id = app.id, "Skipping unscorable application");
            continue;
        };
        ranked.push(RankedApplication {
            application_id: app.id,
            student_id: app.student_id,
            status: app.status,
            score: priority::score(gpa, income, profile.activity_count.unwrap_or(0)),
        });
    }

    ranked.sort_by(|a, b| {
        b.score
            .total
            .total_cmp(&a.score.total)
            .then(a.application_id.cmp(&b.application_id))
    });
    Ok(ranked)
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress is in [0, 100] and length is small, so the product fits
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    let filled_str = "█".repeat(filled);
    let empty_str = "░".repeat(empty);

    format!("[{filled_str}{empty_str}] {progress_percent:.1}%")
}

/// Formats an amount with two decimals, e.g. `10000.00`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}
