//! Application business logic - the application state machine.
//!
//! `status` is only ever changed by a conditional UPDATE keyed on both the
//! application id and the expected current status, and the affected-row count
//! is checked. Two racing transitions therefore produce one winner and one
//! `Conflict`. Every transition appends a row to `workflow_events`.

use crate::{
    core::{
        access::{Caller, Role},
        eligibility::{self, StudentProfile},
        is_unique_violation,
        money::from_minor_units,
        scholarship::require_scholarship,
    },
    entities::{
        Activity, Address, Application, ApplicationStatus, Document, EducationRecord,
        FamilyMember, FinancialInfo, PersonalInfo, WorkflowEvent, activity, address, application,
        document, education_record, family_member, financial_info, personal_info, workflow_event,
    },
    errors::{Error, FieldError, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// Statuses a reviewer may move an application into.
pub const REVIEW_TARGETS: [ApplicationStatus; 5] = [
    ApplicationStatus::UnderReview,
    ApplicationStatus::InterviewScheduled,
    ApplicationStatus::DocumentPending,
    ApplicationStatus::Approved,
    ApplicationStatus::Rejected,
];

/// Appends one audit row for a status change.
pub(crate) async fn record_event<C>(
    db: &C,
    application_id: i64,
    from_status: Option<ApplicationStatus>,
    to_status: ApplicationStatus,
    actor_id: &str,
    notes: Option<String>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    workflow_event::ActiveModel {
        application_id: Set(application_id),
        from_status: Set(from_status),
        to_status: Set(to_status),
        actor_id: Set(actor_id.to_string()),
        notes: Set(notes),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Bumps `updated_at` only if the application is in `status` (and owned by
/// `student_id` when given). Returns the affected-row count.
///
/// Inside a transaction this takes the write lock on the row, so later
/// precondition reads in the same unit of work see a stable status.
async fn touch_if<C>(
    db: &C,
    application_id: i64,
    status: ApplicationStatus,
    student_id: Option<&str>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let mut update = Application::update_many()
        .col_expr(application::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(application::Column::Id.eq(application_id))
        .filter(application::Column::Status.eq(status));
    if let Some(student_id) = student_id {
        update = update.filter(application::Column::StudentId.eq(student_id));
    }
    Ok(update.exec(db).await?.rows_affected)
}

async fn find_application<C>(db: &C, application_id: i64) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    Application::find_by_id(application_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("application", application_id))
}

/// Locks a draft for editing by `caller`.
///
/// Only the owning student may edit; staff may additionally pass
/// `allow_staff` (used for draft deletion). Failures are classified in the
/// order missing, not owned, not a draft.
pub(crate) async fn lock_draft<C>(
    db: &C,
    caller: &Caller,
    application_id: i64,
    allow_staff: bool,
) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    let staff_access = allow_staff && caller.is_staff();
    let owner = (!staff_access).then_some(caller.user_id.as_str());

    if touch_if(db, application_id, ApplicationStatus::Draft, owner).await? == 1 {
        return find_application(db, application_id).await;
    }

    let app = find_application(db, application_id).await?;
    if !staff_access {
        caller.require_owner(&app.student_id)?;
    }
    Err(Error::conflict("Only draft applications can be changed"))
}

/// Locks an `approved` application so an allocation can be attached to it.
pub(crate) async fn lock_approved<C>(db: &C, application_id: i64) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    if touch_if(db, application_id, ApplicationStatus::Approved, None).await? == 1 {
        return find_application(db, application_id).await;
    }

    let app = find_application(db, application_id).await?;
    warn!(
        application_id,
        status = %app.status,
        "Allocation refused: application is not approved"
    );
    Err(Error::conflict(
        "Only approved applications can receive an allocation",
    ))
}

/// Moves an application from `from` to `to`, recording the reviewer fields
/// when given. Zero affected rows means another writer got there first.
async fn transition<C>(
    db: &C,
    application_id: i64,
    from: ApplicationStatus,
    to: ApplicationStatus,
    review: Option<(&str, Option<String>)>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut update = Application::update_many()
        .col_expr(application::Column::Status, Expr::value(to))
        .col_expr(application::Column::UpdatedAt, Expr::value(now));
    if to == ApplicationStatus::Submitted {
        update = update.col_expr(application::Column::SubmittedAt, Expr::value(Some(now)));
    }
    if let Some((reviewer_id, notes)) = review {
        update = update
            .col_expr(
                application::Column::ReviewerId,
                Expr::value(Some(reviewer_id.to_string())),
            )
            .col_expr(application::Column::ReviewNotes, Expr::value(notes));
    }

    let result = update
        .filter(application::Column::Id.eq(application_id))
        .filter(application::Column::Status.eq(from))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        warn!(application_id, %from, %to, "Status transition lost a race");
        return Err(Error::conflict(
            "The application status changed; reload and try again",
        ));
    }

    debug!(application_id, %from, %to, "Application status changed");
    Ok(())
}

/// Marks an approved application as `completed` once its funds are paid.
pub(crate) async fn complete_application<C>(
    db: &C,
    application_id: i64,
    actor_id: &str,
) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    transition(
        db,
        application_id,
        ApplicationStatus::Approved,
        ApplicationStatus::Completed,
        None,
    )
    .await?;
    record_event(
        db,
        application_id,
        Some(ApplicationStatus::Approved),
        ApplicationStatus::Completed,
        actor_id,
        None,
    )
    .await?;
    find_application(db, application_id).await
}

/// Creates a draft application for the calling student.
///
/// The scholarship must be active and inside its application window, and the
/// student must not already hold an open application for it.
///
/// # Errors
/// - `Forbidden` unless the caller is a student
/// - `NotFound` for an unknown scholarship
/// - `Conflict` when the scholarship is closed or an open application exists
#[instrument(skip(db, caller), fields(student_id = %caller.user_id))]
pub async fn create_application(
    db: &DatabaseConnection,
    caller: &Caller,
    scholarship_id: i64,
) -> Result<application::Model> {
    if !caller.has_role(Role::Student) {
        return Err(Error::forbidden("Only students can apply for scholarships"));
    }

    let txn = db.begin().await?;

    let scholarship = require_scholarship(&txn, scholarship_id).await?;
    if !scholarship.is_open_on(Utc::now().date_naive()) {
        return Err(Error::conflict(
            "This scholarship is not accepting applications",
        ));
    }

    let existing = Application::find()
        .filter(application::Column::StudentId.eq(caller.user_id.as_str()))
        .filter(application::Column::ScholarshipId.eq(scholarship_id))
        .filter(application::Column::Status.is_in(ApplicationStatus::OPEN))
        .count(&txn)
        .await?;
    if existing > 0 {
        return Err(Error::conflict(
            "You already have an open application for this scholarship",
        ));
    }

    let now = Utc::now();
    let created = application::ActiveModel {
        student_id: Set(caller.user_id.clone()),
        scholarship_id: Set(scholarship_id),
        status: Set(ApplicationStatus::Draft),
        application_data: Set("{}".to_string()),
        terms_accepted: Set(false),
        submitted_at: Set(None),
        review_notes: Set(None),
        reviewer_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::conflict("You already have an open application for this scholarship")
        } else {
            Error::from(e)
        }
    })?;

    record_event(
        &txn,
        created.id,
        None,
        ApplicationStatus::Draft,
        &caller.user_id,
        None,
    )
    .await?;

    txn.commit().await?;

    info!(application_id = created.id, scholarship_id, "Draft application created");
    Ok(created)
}

/// Reads an application visible to `caller` (its owner or staff).
pub async fn get_application<C>(
    db: &C,
    caller: &Caller,
    application_id: i64,
) -> Result<application::Model>
where
    C: ConnectionTrait,
{
    let app = find_application(db, application_id).await?;
    caller.require_owner_or_staff(&app.student_id)?;
    Ok(app)
}

/// Lists a student's applications, newest first.
pub async fn list_for_student<C>(
    db: &C,
    caller: &Caller,
    student_id: &str,
) -> Result<Vec<application::Model>>
where
    C: ConnectionTrait,
{
    caller.require_owner_or_staff(student_id)?;

    Application::find()
        .filter(application::Column::StudentId.eq(student_id))
        .order_by_desc(application::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Audit trail of an application, oldest first.
pub async fn list_events<C>(
    db: &C,
    caller: &Caller,
    application_id: i64,
) -> Result<Vec<workflow_event::Model>>
where
    C: ConnectionTrait,
{
    get_application(db, caller, application_id).await?;

    WorkflowEvent::find()
        .filter(workflow_event::Column::ApplicationId.eq(application_id))
        .order_by_asc(workflow_event::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes a draft together with all of its section records.
///
/// Students may delete their own drafts; staff may delete any draft.
/// Submitted applications are never deleted.
#[instrument(skip(db, caller), fields(caller = %caller.user_id))]
pub async fn delete_application(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
) -> Result<()> {
    let txn = db.begin().await?;

    lock_draft(&txn, caller, application_id, true).await?;

    PersonalInfo::delete_many()
        .filter(personal_info::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    Address::delete_many()
        .filter(address::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    EducationRecord::delete_many()
        .filter(education_record::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    FamilyMember::delete_many()
        .filter(family_member::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    FinancialInfo::delete_many()
        .filter(financial_info::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    Activity::delete_many()
        .filter(activity::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    Document::delete_many()
        .filter(document::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;
    WorkflowEvent::delete_many()
        .filter(workflow_event::Column::ApplicationId.eq(application_id))
        .exec(&txn)
        .await?;

    let result = Application::delete_many()
        .filter(application::Column::Id.eq(application_id))
        .filter(application::Column::Status.eq(ApplicationStatus::Draft))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::conflict("Only draft applications can be deleted"));
    }

    txn.commit().await?;

    info!(application_id, "Draft application deleted");
    Ok(())
}

/// Collects every unmet submission requirement of an application.
///
/// The list is empty when the application may be submitted. Nothing is
/// short-circuited: each missing section, each missing document type and the
/// terms flag are reported separately.
pub async fn submission_issues<C>(db: &C, app: &application::Model) -> Result<Vec<FieldError>>
where
    C: ConnectionTrait,
{
    let id = app.id;
    let mut issues = Vec::new();

    match PersonalInfo::find()
        .filter(personal_info::Column::ApplicationId.eq(id))
        .one(db)
        .await?
    {
        None => issues.push(FieldError::new("personal_info", "personal information is required")),
        Some(info) => {
            if info.first_name.trim().is_empty() {
                issues.push(FieldError::new("personal_info.first_name", "first name is required"));
            }
            if info.last_name.trim().is_empty() {
                issues.push(FieldError::new("personal_info.last_name", "last name is required"));
            }
            if info.email.trim().is_empty() {
                issues.push(FieldError::new("personal_info.email", "email is required"));
            }
        }
    }

    let addresses = Address::find()
        .filter(address::Column::ApplicationId.eq(id))
        .count(db)
        .await?;
    if addresses == 0 {
        issues.push(FieldError::new("addresses", "at least one address is required"));
    }

    let education = EducationRecord::find()
        .filter(education_record::Column::ApplicationId.eq(id))
        .count(db)
        .await?;
    if education == 0 {
        issues.push(FieldError::new(
            "education_records",
            "at least one education record is required",
        ));
    }

    let family = FamilyMember::find()
        .filter(family_member::Column::ApplicationId.eq(id))
        .count(db)
        .await?;
    if family == 0 {
        issues.push(FieldError::new(
            "family_members",
            "at least one family member is required",
        ));
    }

    let financial = FinancialInfo::find()
        .filter(financial_info::Column::ApplicationId.eq(id))
        .count(db)
        .await?;
    if financial == 0 {
        issues.push(FieldError::new(
            "financial_info",
            "financial information is required",
        ));
    }

    let scholarship = require_scholarship(db, app.scholarship_id).await?;
    let present: BTreeSet<String> = Document::find()
        .filter(document::Column::ApplicationId.eq(id))
        .all(db)
        .await?
        .into_iter()
        .map(|d| d.document_type)
        .collect();
    let extra = scholarship.extra_required_documents()?;
    for missing in eligibility::missing_documents(&extra, &present) {
        issues.push(FieldError::new(
            format!("documents.{missing}"),
            "required document is missing",
        ));
    }

    if !app.terms_accepted {
        issues.push(FieldError::new("terms_accepted", "the terms must be accepted"));
    }

    if Utc::now().date_naive() > scholarship.application_end_date {
        issues.push(FieldError::new(
            "scholarship",
            "the application period has closed",
        ));
    }

    Ok(issues)
}

/// Submits a complete draft: `draft -> submitted`.
///
/// The draft lock, the completeness check and the guarded status flip run in
/// one transaction. Quota and budget are untouched.
///
/// # Errors
/// - `NotFound`, `Forbidden` or `Conflict` from the draft lock
/// - `Validation` listing every missing requirement
#[instrument(skip(db, caller), fields(student_id = %caller.user_id))]
pub async fn submit_application(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
) -> Result<application::Model> {
    let txn = db.begin().await?;

    let app = lock_draft(&txn, caller, application_id, false).await?;

    let errors = submission_issues(&txn, &app).await?;
    if !errors.is_empty() {
        debug!(application_id, missing = errors.len(), "Submission refused");
        return Err(Error::Validation { errors });
    }

    transition(
        &txn,
        application_id,
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        None,
    )
    .await?;
    record_event(
        &txn,
        application_id,
        Some(ApplicationStatus::Draft),
        ApplicationStatus::Submitted,
        &caller.user_id,
        None,
    )
    .await?;

    let submitted = find_application(&txn, application_id).await?;
    txn.commit().await?;

    info!(application_id, "Application submitted");
    Ok(submitted)
}

/// Staff review: moves an application between the review statuses or to a
/// final decision, recording notes and the reviewer.
///
/// Returns the previous status and the updated application.
///
/// # Errors
/// - `Forbidden` unless the caller is staff
/// - `Validation` for a target outside [`REVIEW_TARGETS`]
/// - `NotFound` for an unknown application
/// - `Conflict` when the application is not in a reviewable status
#[instrument(skip(db, caller, notes), fields(reviewer = %caller.user_id))]
pub async fn review_application(
    db: &DatabaseConnection,
    caller: &Caller,
    application_id: i64,
    target: ApplicationStatus,
    notes: Option<String>,
) -> Result<(ApplicationStatus, application::Model)> {
    caller.require_staff()?;

    if !REVIEW_TARGETS.contains(&target) {
        return Err(Error::invalid(
            "status",
            format!("`{target}` is not a review decision"),
        ));
    }

    let txn = db.begin().await?;

    let current = find_application(&txn, application_id).await?;
    if !current.status.is_reviewable() {
        return Err(Error::conflict(format!(
            "An application in status `{}` cannot be reviewed",
            current.status
        )));
    }

    transition(
        &txn,
        application_id,
        current.status,
        target,
        Some((caller.user_id.as_str(), notes.clone())),
    )
    .await?;
    record_event(
        &txn,
        application_id,
        Some(current.status),
        target,
        &caller.user_id,
        notes,
    )
    .await?;

    let reviewed = find_application(&txn, application_id).await?;
    txn.commit().await?;

    info!(application_id, from = %current.status, to = %target, "Application reviewed");
    Ok((current.status, reviewed))
}

/// Declared attributes of an application's student, for eligibility and
/// priority scoring.
pub async fn student_profile<C>(db: &C, application_id: i64) -> Result<StudentProfile>
where
    C: ConnectionTrait,
{
    let personal = PersonalInfo::find()
        .filter(personal_info::Column::ApplicationId.eq(application_id))
        .one(db)
        .await?;
    let financial = FinancialInfo::find()
        .filter(financial_info::Column::ApplicationId.eq(application_id))
        .one(db)
        .await?;
    let activities = Activity::find()
        .filter(activity::Column::ApplicationId.eq(application_id))
        .count(db)
        .await?;

    Ok(StudentProfile {
        gpa: personal.as_ref().and_then(|p| p.gpa),
        family_income: financial.map(|f| from_minor_units(f.family_income_minor)),
        faculty: personal.as_ref().and_then(|p| p.faculty.clone()),
        year_level: personal
            .as_ref()
            .and_then(|p| p.year_level)
            .and_then(|y| u8::try_from(y).ok()),
        activity_count: Some(u32::try_from(activities).unwrap_or(u32::MAX)),
    })
}

/// Screens an application against its scholarship's eligibility criteria
/// using the attributes declared so far.
///
/// Criteria the student has not answered yet are listed in `missing_fields`
/// and do not make the application ineligible on their own.
#[instrument(skip(db, caller), fields(caller = %caller.user_id))]
pub async fn check_eligibility<C>(
    db: &C,
    caller: &Caller,
    application_id: i64,
) -> Result<eligibility::EligibilityResult>
where
    C: ConnectionTrait,
{
    let app = get_application(db, caller, application_id).await?;
    let criteria = require_scholarship(db, app.scholarship_id).await?.criteria()?;
    let profile = student_profile(db, application_id).await?;

    let result = eligibility::evaluate(&criteria, &profile);
    debug!(
        application_id,
        eligible = result.is_eligible,
        score = result.score,
        missing = result.missing_fields.len(),
        "Eligibility evaluated"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::eligibility::{Criterion, CriterionOutcome, EligibilityCriteria};
    use crate::core::scholarship::create_scholarship;
    use crate::core::{priority, sections};
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use rust_decimal::Decimal;

    fn fields(err: &Error) -> Vec<&str> {
        err.field_errors().iter().map(|e| e.field.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_application_starts_as_draft() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");

        let app = create_application(&db, &alice, scholarship.id).await?;
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert!(app.submitted_at.is_none());

        let events = list_events(&db, &alice, app.id).await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from_status, None);
        assert_eq!(events[0].to_status, ApplicationStatus::Draft);
        Ok(())
    }

    #[tokio::test]
    async fn test_one_open_application_per_scholarship() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");

        let first = create_application(&db, &alice, scholarship.id).await?;
        let err = create_application(&db, &alice, scholarship.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Another student is unaffected
        create_application(&db, &student("bob"), scholarship.id).await?;

        // A rejected application no longer blocks a new one
        fill_draft(&db, &alice, first.id).await?;
        let first = submit_application(&db, &alice, first.id).await?;
        review_application(&db, &staff(), first.id, ApplicationStatus::Rejected, None).await?;
        create_application(&db, &alice, scholarship.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_application_checks_window_and_role() -> Result<()> {
        let db = setup_test_db().await?;
        let mut closed = new_scholarship("Closed");
        closed.application_start_date = Utc::now().date_naive() - chrono::Duration::days(60);
        closed.application_end_date = Utc::now().date_naive() - chrono::Duration::days(1);
        let closed = crate::core::scholarship::create_scholarship(&db, &staff(), closed).await?;

        let err = create_application(&db, &student("alice"), closed.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = create_application(&db, &student("alice"), 999)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let open = create_test_scholarship(&db, "Open", 1).await?;
        let err = create_application(&db, &staff(), open.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_complete_application() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        let submitted = submit_application(&db, &alice, app.id).await?;
        assert_eq!(submitted.status, ApplicationStatus::Submitted);
        assert!(submitted.submitted_at.is_some());

        // Quota untouched at submission
        let scholarship = require_scholarship(&db, scholarship.id).await?;
        assert_eq!(scholarship.available_quota, 3);

        let events = list_events(&db, &alice, app.id).await?;
        assert_eq!(events.last().unwrap().to_status, ApplicationStatus::Submitted);
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_empty_draft_reports_every_missing_piece() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_application(&db, &alice, scholarship.id).await?;

        let err = submit_application(&db, &alice, app.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            fields(&err),
            vec![
                "personal_info",
                "addresses",
                "education_records",
                "family_members",
                "financial_info",
                "documents.id_card",
                "documents.transcript",
                "terms_accepted",
            ]
        );

        let still = get_application(&db, &alice, app.id).await?;
        assert_eq!(still.status, ApplicationStatus::Draft);
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_names_the_single_missing_document() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        let transcript = Document::find()
            .filter(document::Column::ApplicationId.eq(app.id))
            .filter(document::Column::DocumentType.eq("transcript"))
            .one(&db)
            .await?
            .unwrap();
        sections::remove_document(&db, &alice, app.id, transcript.id).await?;

        let err = submit_application(&db, &alice, app.id).await.unwrap_err();
        assert_eq!(fields(&err), vec!["documents.transcript"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_requires_scholarship_specific_documents() -> Result<()> {
        let db = setup_test_db().await?;
        let mut new = new_scholarship("Need Based");
        new.required_documents = vec!["income_certificate".to_string()];
        let scholarship = crate::core::scholarship::create_scholarship(&db, &staff(), new).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        let err = submit_application(&db, &alice, app.id).await.unwrap_err();
        assert_eq!(fields(&err), vec!["documents.income_certificate"]);

        sections::add_document(&db, &alice, app.id, "income_certificate", "income.pdf").await?;
        submit_application(&db, &alice, app.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_access_errors() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        let err = submit_application(&db, &student("mallory"), app.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = submit_application(&db, &alice, 4242).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        submit_application(&db, &alice, app.id).await?;
        let err = submit_application(&db, &alice, app.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submits_have_one_winner() -> Result<()> {
        let pooled = setup_pooled_test_db(4).await?;
        let db = pooled.db.clone();
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let db = db.clone();
            let alice = alice.clone();
            let id = app.id;
            handles.push(tokio::spawn(async move {
                submit_application(&db, &alice, id).await
            }));
        }

        let mut submitted = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => submitted += 1,
                Err(err) if err.kind() == ErrorKind::Conflict => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((submitted, conflicts), (1, 1));

        let events = list_events(&db, &alice, app.id).await?;
        let submissions = events
            .iter()
            .filter(|e| e.to_status == ApplicationStatus::Submitted)
            .count();
        assert_eq!(submissions, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_review_moves_freely_then_decides() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        // Drafts are not reviewable
        let err = review_application(&db, &staff(), app.id, ApplicationStatus::UnderReview, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        submit_application(&db, &alice, app.id).await?;

        let err = review_application(&db, &alice, app.id, ApplicationStatus::Approved, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        for target in [
            ApplicationStatus::UnderReview,
            ApplicationStatus::InterviewScheduled,
            ApplicationStatus::DocumentPending,
            ApplicationStatus::UnderReview,
        ] {
            review_application(&db, &staff(), app.id, target, None).await?;
        }

        let (from, approved) = review_application(
            &db,
            &staff(),
            app.id,
            ApplicationStatus::Approved,
            Some("Strong candidate".to_string()),
        )
        .await?;
        assert_eq!(from, ApplicationStatus::UnderReview);
        assert_eq!(approved.status, ApplicationStatus::Approved);
        assert_eq!(approved.review_notes.as_deref(), Some("Strong candidate"));
        assert_eq!(approved.reviewer_id.as_deref(), Some("officer-1"));

        // Decisions are final for the review operation
        let err = review_application(&db, &staff(), app.id, ApplicationStatus::Rejected, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        Ok(())
    }

    #[tokio::test]
    async fn test_review_rejects_non_decision_targets() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = submit_complete_new(&db, &alice, scholarship.id).await?;

        for target in [
            ApplicationStatus::Draft,
            ApplicationStatus::Submitted,
            ApplicationStatus::Completed,
        ] {
            let err = review_application(&db, &staff(), app.id, target, None)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_only_while_draft() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");

        let draft = create_complete_draft(&db, &alice, scholarship.id).await?;
        let err = delete_application(&db, &student("bob"), draft.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        delete_application(&db, &alice, draft.id).await?;
        assert_eq!(
            get_application(&db, &alice, draft.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let orphans = Document::find()
            .filter(document::Column::ApplicationId.eq(draft.id))
            .count(&db)
            .await?;
        assert_eq!(orphans, 0);

        let submitted = submit_complete_new(&db, &alice, scholarship.id).await?;
        for caller in [alice.clone(), staff()] {
            let err = delete_application(&db, &caller, submitted.id)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conflict);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_student_profile_feeds_priority_score() -> Result<()> {
        let db = setup_test_db().await?;
        let scholarship = create_test_scholarship(&db, "Merit", 3).await?;
        let alice = student("alice");
        let app = create_complete_draft(&db, &alice, scholarship.id).await?;

        let profile = student_profile(&db, app.id).await?;
        assert_eq!(profile.gpa, Some(3.5));
        assert_eq!(profile.family_income, Some(Decimal::from(12_000)));
        assert_eq!(profile.faculty.as_deref(), Some("engineering"));
        assert_eq!(profile.year_level, Some(2));
        assert_eq!(profile.activity_count, Some(1));

        let scored = priority::score(
            profile.gpa.unwrap(),
            profile.family_income.unwrap(),
            profile.activity_count.unwrap(),
        );
        // 87.5*0.4 + 100*0.3 + 20*0.3
        assert!((scored.total - 71.0).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_check_eligibility_uses_scholarship_criteria() -> Result<()> {
        let db = setup_test_db().await?;
        let mut new = new_scholarship("Top Students");
        new.eligibility_criteria = EligibilityCriteria::default()
            .with(Criterion::MinGpa(3.8))
            .with(Criterion::MaxFamilyIncome(Decimal::from(20_000)));
        let scholarship = create_scholarship(&db, &staff(), new).await?;

        // GPA 3.5 declared, financial section not filled in yet
        let alice = student("alice");
        let app = create_application(&db, &alice, scholarship.id).await?;
        sections::upsert_personal_info(&db, &alice, app.id, personal_info_input()).await?;

        let result = check_eligibility(&db, &alice, app.id).await?;
        assert!(!result.is_eligible);
        assert!((result.score - 80.0).abs() < 1e-9);
        assert_eq!(result.missing_fields, vec!["family income"]);
        assert_eq!(result.criteria_results[0].outcome, CriterionOutcome::Unmet);
        assert_eq!(result.criteria_results[1].outcome, CriterionOutcome::MissingData);

        let mut stronger = personal_info_input();
        stronger.gpa = Some(3.9);
        sections::upsert_personal_info(&db, &alice, app.id, stronger).await?;
        let result = check_eligibility(&db, &staff(), app.id).await?;
        assert!(result.is_eligible);
        assert!((result.score - 100.0).abs() < 1e-9);
        assert_eq!(result.missing_fields, vec!["family income"]);

        let err = check_eligibility(&db, &student("bob"), app.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        Ok(())
    }
}
