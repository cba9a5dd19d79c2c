//! Allocation workflow - funding approved applications.
//!
//! An allocation moves `pending -> approved -> disbursed`. Creation inserts the
//! allocation row and reserves budget and quota in one transaction: if any of
//! the three writes fails, none of them persist.

use crate::{
    core::{
        access::Caller,
        application::{complete_application, lock_approved},
        budget::reserve_budget,
        is_unique_violation,
        money::positive_minor_units,
        quota::reserve_quota,
        scholarship::require_scholarship,
    },
    entities::{
        Allocation, AllocationStatus, Application, DisbursementMethod, allocation, application,
    },
    errors::{Error, FieldError, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Message shared by every failed approve/disburse so callers cannot tell a
/// missing allocation from one in the wrong status.
pub const NOT_FOUND_OR_PROCESSED: &str = "Allocation not found or already processed";

/// How and where funds are paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementDetails {
    pub method: DisbursementMethod,
    pub bank_account: Option<String>,
    pub bank_name: Option<String>,
}

impl DisbursementDetails {
    /// Bank transfer to the given account.
    pub fn bank_transfer(account: impl Into<String>, bank_name: impl Into<String>) -> Self {
        Self {
            method: DisbursementMethod::BankTransfer,
            bank_account: Some(account.into()),
            bank_name: Some(bank_name.into()),
        }
    }

    /// Payment by cheque.
    #[must_use]
    pub const fn cheque() -> Self {
        Self {
            method: DisbursementMethod::Cheque,
            bank_account: None,
            bank_name: None,
        }
    }

    fn validate(&self, errors: &mut Vec<FieldError>) {
        if self.method != DisbursementMethod::BankTransfer {
            return;
        }
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        if blank(&self.bank_account) {
            errors.push(FieldError::new(
                "bank_account",
                "is required for bank transfers",
            ));
        }
        if blank(&self.bank_name) {
            errors.push(FieldError::new("bank_name", "is required for bank transfers"));
        }
    }
}

/// Input for [`create_allocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAllocation {
    pub application_id: i64,
    /// Defaults to the scholarship's award amount
    pub amount: Option<Decimal>,
    /// Defaults to the current calendar year
    pub budget_year: Option<i32>,
    pub disbursement: DisbursementDetails,
}

/// Result of [`disburse_allocation`]: the paid allocation and the
/// application it completed, both read inside the disbursing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disbursement {
    pub allocation: allocation::Model,
    pub application: application::Model,
}

/// Creates a `pending` allocation for an approved application and reserves
/// its budget and quota.
///
/// The application's status is checked by a guarded write inside the same
/// transaction as the insert, closing the race with a concurrent review.
///
/// # Errors
/// - `Forbidden` unless the caller is staff
/// - `Validation` for an invalid amount or incomplete bank details
/// - `NotFound` for an unknown application
/// - `Conflict` when the application is not approved or already has an allocation
/// - `BudgetExceeded` / `QuotaExhausted` when the ledgers refuse
#[instrument(skip(db, caller, new), fields(application_id = new.application_id))]
pub async fn create_allocation(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewAllocation,
) -> Result<allocation::Model> {
    caller.require_staff()?;

    let mut errors = Vec::new();
    if let Some(amount) = new.amount {
        if positive_minor_units(amount).is_err() {
            errors.push(FieldError::new(
                "amount",
                "must be a positive amount with at most two decimal places",
            ));
        }
    }
    new.disbursement.validate(&mut errors);
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let txn = db.begin().await?;

    let app = lock_approved(&txn, new.application_id).await?;

    let existing = Allocation::find()
        .filter(allocation::Column::ApplicationId.eq(app.id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict(
            "An allocation already exists for this application",
        ));
    }

    let scholarship = require_scholarship(&txn, app.scholarship_id).await?;
    let amount = new.amount.unwrap_or_else(|| scholarship.amount());
    let budget_year = new.budget_year.unwrap_or_else(|| Utc::now().year());

    let created = allocation::ActiveModel {
        application_id: Set(app.id),
        scholarship_id: Set(scholarship.id),
        budget_year: Set(budget_year),
        allocated_amount_minor: Set(positive_minor_units(amount)?),
        allocation_status: Set(AllocationStatus::Pending),
        disbursement_method: Set(new.disbursement.method),
        bank_account: Set(new.disbursement.bank_account),
        bank_name: Set(new.disbursement.bank_name),
        transfer_date: Set(None),
        transfer_reference: Set(None),
        allocated_by: Set(caller.user_id.clone()),
        approved_by: Set(None),
        created_at: Set(Utc::now()),
        approved_at: Set(None),
        disbursed_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("An allocation already exists for this application")
        } else {
            Error::from(e)
        }
    })?;

    reserve_budget(&txn, scholarship.id, budget_year, amount).await?;
    reserve_quota(&txn, scholarship.id).await?;

    txn.commit().await?;

    info!(
        allocation_id = created.id,
        scholarship_id = scholarship.id,
        budget_year,
        %amount,
        "Allocation created"
    );
    Ok(created)
}

/// Logs why a guarded allocation transition matched no row and returns the
/// deliberately ambiguous conflict.
async fn refuse_transition<C>(db: &C, allocation_id: i64, expected: AllocationStatus) -> Error
where
    C: ConnectionTrait,
{
    match Allocation::find_by_id(allocation_id).one(db).await {
        Ok(Some(found)) => warn!(
            allocation_id,
            expected = expected.as_str(),
            actual = found.allocation_status.as_str(),
            "Allocation transition refused: wrong status"
        ),
        Ok(None) => warn!(allocation_id, "Allocation transition refused: no such allocation"),
        Err(e) => warn!(allocation_id, error = %e, "Allocation transition refused"),
    }
    Error::conflict(NOT_FOUND_OR_PROCESSED)
}

/// Confirms a pending allocation: `pending -> approved`.
///
/// # Errors
/// - `Forbidden` unless the caller is staff
/// - `Conflict` with [`NOT_FOUND_OR_PROCESSED`] when no pending allocation matches
#[instrument(skip(db, caller), fields(approver = %caller.user_id))]
pub async fn approve_allocation(
    db: &DatabaseConnection,
    caller: &Caller,
    allocation_id: i64,
) -> Result<allocation::Model> {
    caller.require_staff()?;

    let result = Allocation::update_many()
        .col_expr(
            allocation::Column::AllocationStatus,
            Expr::value(AllocationStatus::Approved),
        )
        .col_expr(
            allocation::Column::ApprovedBy,
            Expr::value(Some(caller.user_id.clone())),
        )
        .col_expr(allocation::Column::ApprovedAt, Expr::value(Some(Utc::now())))
        .filter(allocation::Column::Id.eq(allocation_id))
        .filter(allocation::Column::AllocationStatus.eq(AllocationStatus::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(refuse_transition(db, allocation_id, AllocationStatus::Pending).await);
    }

    let approved = Allocation::find_by_id(allocation_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::conflict(NOT_FOUND_OR_PROCESSED))?;

    info!(allocation_id, "Allocation approved");
    Ok(approved)
}

/// Records the payment of an approved allocation: `approved -> disbursed`.
///
/// The funded application moves to `completed` in the same transaction.
///
/// # Errors
/// - `Forbidden` unless the caller is staff
/// - `Validation` for an empty transfer reference
/// - `Conflict` with [`NOT_FOUND_OR_PROCESSED`] when no approved allocation matches
#[instrument(skip(db, caller), fields(disburser = %caller.user_id))]
pub async fn disburse_allocation(
    db: &DatabaseConnection,
    caller: &Caller,
    allocation_id: i64,
    transfer_date: NaiveDate,
    transfer_reference: &str,
) -> Result<Disbursement> {
    caller.require_staff()?;

    if transfer_reference.trim().is_empty() {
        return Err(Error::invalid("transfer_reference", "must not be empty"));
    }

    let txn = db.begin().await?;

    let result = Allocation::update_many()
        .col_expr(
            allocation::Column::AllocationStatus,
            Expr::value(AllocationStatus::Disbursed),
        )
        .col_expr(allocation::Column::TransferDate, Expr::value(Some(transfer_date)))
        .col_expr(
            allocation::Column::TransferReference,
            Expr::value(Some(transfer_reference.trim().to_string())),
        )
        .col_expr(allocation::Column::DisbursedAt, Expr::value(Some(Utc::now())))
        .filter(allocation::Column::Id.eq(allocation_id))
        .filter(allocation::Column::AllocationStatus.eq(AllocationStatus::Approved))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(refuse_transition(&txn, allocation_id, AllocationStatus::Approved).await);
    }

    let disbursed = Allocation::find_by_id(allocation_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::conflict(NOT_FOUND_OR_PROCESSED))?;

    let completed = complete_application(&txn, disbursed.application_id, &caller.user_id).await?;

    txn.commit().await?;

    info!(
        allocation_id,
        application_id = disbursed.application_id,
        amount = %disbursed.amount(),
        "Allocation disbursed"
    );
    Ok(Disbursement {
        allocation: disbursed,
        application: completed,
    })
}

/// Reads an allocation visible to `caller`: staff, or the funded student.
pub async fn get_allocation<C>(
    db: &C,
    caller: &Caller,
    allocation_id: i64,
) -> Result<allocation::Model>
where
    C: ConnectionTrait,
{
    let found = Allocation::find_by_id(allocation_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("allocation", allocation_id))?;

    if !caller.is_staff() {
        let app = Application::find_by_id(found.application_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("allocation", allocation_id))?;
        caller.require_owner(&app.student_id)?;
    }
    Ok(found)
}

/// The allocation attached to an application, if any.
pub async fn get_allocation_for_application<C>(
    db: &C,
    application_id: i64,
) -> Result<Option<allocation::Model>>
where
    C: ConnectionTrait,
{
    Allocation::find()
        .filter(allocation::Column::ApplicationId.eq(application_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a scholarship's allocations, oldest first. Staff only.
pub async fn list_allocations_for_scholarship<C>(
    db: &C,
    caller: &Caller,
    scholarship_id: i64,
) -> Result<Vec<allocation::Model>>
where
    C: ConnectionTrait,
{
    caller.require_staff()?;

    Allocation::find()
        .filter(allocation::Column::ScholarshipId.eq(scholarship_id))
        .order_by_asc(allocation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::{budget::get_budget, quota::quota_status};
    use crate::entities::ApplicationStatus;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    const YEAR: i32 = 2026;

    fn allocation_for(application_id: i64, amount: Option<Decimal>) -> NewAllocation {
        NewAllocation {
            application_id,
            amount,
            budget_year: Some(YEAR),
            disbursement: DisbursementDetails::bank_transfer("123-4-56789-0", "City Bank"),
        }
    }

    async fn allocation_count(db: &DatabaseConnection) -> Result<u64> {
        Ok(Allocation::find().count(db).await?)
    }

    #[tokio::test]
    async fn test_full_allocation_lifecycle() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 2).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;
        let app = create_approved_application(&db, "alice", scholarship.id).await?;

        let created = create_allocation(&db, &staff(), allocation_for(app.id, None)).await?;
        assert_eq!(created.allocation_status, AllocationStatus::Pending);
        assert_eq!(created.amount(), Decimal::from(10_000));
        assert_eq!(created.allocated_by, "officer-1");

        let budget = get_budget(&db, scholarship.id, YEAR).await?.unwrap();
        assert_eq!(budget.allocated(), Decimal::from(10_000));
        assert_eq!(budget.remaining(), Decimal::from(40_000));
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 1);

        let approved = approve_allocation(&db, &staff(), created.id).await?;
        assert_eq!(approved.allocation_status, AllocationStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("officer-1"));

        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let paid = disburse_allocation(&db, &staff(), created.id, date, "TRX-0001").await?;
        let disbursed = paid.allocation;
        assert_eq!(disbursed.allocation_status, AllocationStatus::Disbursed);
        assert_eq!(disbursed.transfer_date, Some(date));
        assert_eq!(disbursed.transfer_reference.as_deref(), Some("TRX-0001"));
        assert_eq!(disbursed.amount(), created.amount());
        assert_eq!(paid.application.id, app.id);
        assert_eq!(paid.application.student_id, "alice");
        assert_eq!(paid.application.status, ApplicationStatus::Completed);

        let app = Application::find_by_id(app.id).one(&db).await?.unwrap();
        assert_eq!(app.status, ApplicationStatus::Completed);

        // Ledgers are not touched again by approval or disbursement
        let budget = get_budget(&db, scholarship.id, YEAR).await?.unwrap();
        assert_eq!(budget.allocated(), Decimal::from(10_000));
        Ok(())
    }

    #[tokio::test]
    async fn test_transitions_are_linear_and_ambiguous_on_failure() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 2).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;
        let app = create_approved_application(&db, "alice", scholarship.id).await?;
        let created = create_allocation(&db, &staff(), allocation_for(app.id, None)).await?;
        let date = Utc::now().date_naive();

        // Cannot skip approval
        let err = disburse_allocation(&db, &staff(), created.id, date, "TRX")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), NOT_FOUND_OR_PROCESSED);

        approve_allocation(&db, &staff(), created.id).await?;
        let twice = approve_allocation(&db, &staff(), created.id)
            .await
            .unwrap_err();
        let missing = approve_allocation(&db, &staff(), 9_999).await.unwrap_err();
        assert_eq!(twice.kind(), ErrorKind::Conflict);
        assert_eq!(missing.kind(), ErrorKind::Conflict);
        assert_eq!(twice.user_message(), missing.user_message());

        let err = approve_allocation(&db, &student("alice"), created.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        Ok(())
    }

    #[tokio::test]
    async fn test_only_approved_applications_are_funded_once() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 5).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;
        let alice = student("alice");

        let submitted = submit_complete_new(&db, &alice, scholarship.id).await?;
        let err = create_allocation(&db, &staff(), allocation_for(submitted.id, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = create_allocation(&db, &staff(), allocation_for(9_999, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let approved = create_approved_application(&db, "bob", scholarship.id).await?;
        create_allocation(&db, &staff(), allocation_for(approved.id, None)).await?;
        let err = create_allocation(&db, &staff(), allocation_for(approved.id, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(allocation_count(&db).await?, 1);
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_budget_failure_rolls_back_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(5_000)).await?;
        let app = create_approved_application(&db, "alice", scholarship.id).await?;

        let err = create_allocation(&db, &staff(), allocation_for(app.id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded { .. }));
        assert_eq!(err.kind(), ErrorKind::ExhaustedResource);

        assert_eq!(allocation_count(&db).await?, 0);
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 3);
        let budget = get_budget(&db, scholarship.id, YEAR).await?.unwrap();
        assert_eq!(budget.allocated_budget, 0);

        // A smaller amount still fits afterwards
        create_allocation(
            &db,
            &staff(),
            allocation_for(app.id, Some(Decimal::from(5_000))),
        )
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_quota_failure_rolls_back_budget() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 1).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;
        let first = create_approved_application(&db, "alice", scholarship.id).await?;
        let second = create_approved_application(&db, "bob", scholarship.id).await?;

        create_allocation(&db, &staff(), allocation_for(first.id, None)).await?;
        let err = create_allocation(&db, &staff(), allocation_for(second.id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::QuotaExhausted { .. }));

        assert_eq!(allocation_count(&db).await?, 1);
        let budget = get_budget(&db, scholarship.id, YEAR).await?.unwrap();
        assert_eq!(budget.allocated(), Decimal::from(10_000));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_budget_year_rolls_back() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 1).await?;
        let app = create_approved_application(&db, "alice", scholarship.id).await?;

        let err = create_allocation(&db, &staff(), allocation_for(app.id, None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(allocation_count(&db).await?, 0);
        assert_eq!(quota_status(&db, scholarship.id).await?.available_quota, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_disbursement_details_are_validated() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 1).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;
        let app = create_approved_application(&db, "alice", scholarship.id).await?;

        let mut new = allocation_for(app.id, Some(Decimal::new(1, 3)));
        new.disbursement.bank_account = None;
        new.disbursement.bank_name = Some("  ".to_string());
        let err = create_allocation(&db, &staff(), new).await.unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["amount", "bank_account", "bank_name"]);

        let mut cheque = allocation_for(app.id, None);
        cheque.disbursement = DisbursementDetails::cheque();
        let created = create_allocation(&db, &staff(), cheque).await?;
        assert_eq!(created.disbursement_method, DisbursementMethod::Cheque);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_on_last_place() -> Result<()> {
        let pooled = setup_pooled_test_db(4).await?;
        let db = pooled.db.clone();
        let scholarship = create_test_scholarship(&db, "Merit", 1).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;

        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            ids.push(create_approved_application(&db, name, scholarship.id).await?.id);
        }

        let mut handles = Vec::new();
        for id in ids {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                create_allocation(&db, &staff(), allocation_for(id, None)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert_eq!(err.kind(), ErrorKind::ExhaustedResource),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(allocation_count(&db).await?, 1);
        let budget = get_budget(&db, scholarship.id, YEAR).await?.unwrap();
        assert_eq!(budget.allocated(), Decimal::from(10_000));
        Ok(())
    }

    #[tokio::test]
    async fn test_allocation_visibility() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 2).await?;
        create_test_budget(&db, scholarship.id, YEAR, Decimal::from(50_000)).await?;
        let app = create_approved_application(&db, "alice", scholarship.id).await?;
        let created = create_allocation(&db, &staff(), allocation_for(app.id, None)).await?;

        assert_eq!(get_allocation(&db, &student("alice"), created.id).await?.id, created.id);
        assert_eq!(
            get_allocation(&db, &student("bob"), created.id)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );
        assert!(get_allocation_for_application(&db, app.id).await?.is_some());

        let listed = list_allocations_for_scholarship(&db, &staff(), scholarship.id).await?;
        assert_eq!(listed.len(), 1);
        Ok(())
    }
}
