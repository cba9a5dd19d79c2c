//! Shared test utilities for the scholarship engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        access::Caller,
        application::{create_application, review_application, submit_application},
        budget::create_budget,
        eligibility::EligibilityCriteria,
        scholarship::{NewScholarship, create_scholarship},
        sections::{
            ActivityInput, AddressInput, EducationInput, FamilyMemberInput, FinancialInput,
            PersonalInfoInput, accept_terms, add_activity, add_address, add_document,
            add_education_record, add_family_member, upsert_financial_info, upsert_personal_info,
        },
    },
    entities::{ApplicationStatus, application, budget, scholarship},
    errors::Result,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// opens its own private database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// File-backed database shared by a pool of connections. The backing
/// directory is removed when this value is dropped.
pub struct PooledTestDb {
    pub db: DatabaseConnection,
    _dir: tempfile::TempDir,
}

/// Creates a file-backed `SQLite` database behind a pool of `connections`
/// connections, so concurrent tests contend on separate connections.
pub async fn setup_pooled_test_db(connections: u32) -> Result<PooledTestDb> {
    let dir = tempfile::tempdir()?;
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("scholarships.sqlite").display()
    );
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(connections)
        .min_connections(connections)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(PooledTestDb { db, _dir: dir })
}

/// Installs a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Staff caller with id `officer-1`.
pub fn staff() -> Caller {
    Caller::officer("officer-1")
}

pub fn student(user_id: &str) -> Caller {
    Caller::student(user_id)
}

/// Scholarship input with sensible defaults.
///
/// # Defaults
/// * amount: 10,000
/// * quota: 5
/// * window: 30 days either side of today
/// * no eligibility criteria, no extra documents, active
pub fn new_scholarship(name: &str) -> NewScholarship {
    let today = Utc::now().date_naive();
    NewScholarship {
        name: name.to_string(),
        amount: Decimal::from(10_000),
        total_quota: 5,
        application_start_date: today - Duration::days(30),
        application_end_date: today + Duration::days(30),
        eligibility_criteria: EligibilityCriteria::default(),
        required_documents: Vec::new(),
        is_active: true,
    }
}

/// Creates an open scholarship with the given quota.
pub async fn create_test_scholarship(
    db: &DatabaseConnection,
    name: &str,
    total_quota: i32,
) -> Result<scholarship::Model> {
    let mut new = new_scholarship(name);
    new.total_quota = total_quota;
    create_scholarship(db, &staff(), new).await
}

/// Creates a budget year for a scholarship.
pub async fn create_test_budget(
    db: &DatabaseConnection,
    scholarship_id: i64,
    budget_year: i32,
    total: Decimal,
) -> Result<budget::Model> {
    create_budget(db, &staff(), scholarship_id, budget_year, total).await
}

/// Personal info that satisfies submission: GPA 3.5, engineering, year 2.
pub fn personal_info_input() -> PersonalInfoInput {
    PersonalInfoInput {
        first_name: "Somchai".to_string(),
        last_name: "Jaidee".to_string(),
        first_name_en: Some("Somchai".to_string()),
        last_name_en: Some("Jaidee".to_string()),
        email: "somchai@example.edu".to_string(),
        phone: Some("0812345678".to_string()),
        faculty: Some("engineering".to_string()),
        year_level: Some(2),
        gpa: Some(3.5),
    }
}

pub fn activity_input() -> ActivityInput {
    ActivityInput {
        title: "Robotics club".to_string(),
        role: Some("member".to_string()),
        year: Some(2025),
    }
}

/// Empty draft owned by `student_id`.
pub async fn create_application_for(
    db: &DatabaseConnection,
    student_id: &str,
    scholarship_id: i64,
) -> Result<application::Model> {
    create_application(db, &student(student_id), scholarship_id).await
}

/// Fills every section of a draft, uploads `id_card` and `transcript` and
/// accepts the terms. Family income is 12,000 with one activity.
pub async fn fill_draft(db: &DatabaseConnection, caller: &Caller, application_id: i64) -> Result<()> {
    upsert_personal_info(db, caller, application_id, personal_info_input()).await?;
    add_address(
        db,
        caller,
        application_id,
        AddressInput {
            address_type: "home".to_string(),
            line1: "99 Moo 1".to_string(),
            city: "Chiang Mai".to_string(),
            province: "Chiang Mai".to_string(),
            postal_code: "50200".to_string(),
        },
    )
    .await?;
    add_education_record(
        db,
        caller,
        application_id,
        EducationInput {
            institution: "Yupparaj Wittayalai".to_string(),
            level: "high_school".to_string(),
            gpa: Some(3.6),
            graduation_year: Some(2024),
        },
    )
    .await?;
    add_family_member(
        db,
        caller,
        application_id,
        FamilyMemberInput {
            relationship: "mother".to_string(),
            full_name: "Malee Jaidee".to_string(),
            occupation: Some("farmer".to_string()),
            monthly_income: Some(Decimal::from(1_000)),
        },
    )
    .await?;
    upsert_financial_info(
        db,
        caller,
        application_id,
        FinancialInput {
            family_income: Decimal::from(12_000),
            monthly_expenses: Some(Decimal::from(800)),
            has_student_loan: false,
        },
    )
    .await?;
    add_activity(db, caller, application_id, activity_input()).await?;
    add_document(db, caller, application_id, "id_card", "id_card.png").await?;
    add_document(db, caller, application_id, "transcript", "transcript.pdf").await?;
    accept_terms(db, caller, application_id).await?;
    Ok(())
}

/// Draft that passes every submission check.
pub async fn create_complete_draft(
    db: &DatabaseConnection,
    caller: &Caller,
    scholarship_id: i64,
) -> Result<application::Model> {
    let app = create_application(db, caller, scholarship_id).await?;
    fill_draft(db, caller, app.id).await?;
    Ok(app)
}

/// Complete application already in `submitted`.
pub async fn submit_complete_new(
    db: &DatabaseConnection,
    caller: &Caller,
    scholarship_id: i64,
) -> Result<application::Model> {
    let app = create_complete_draft(db, caller, scholarship_id).await?;
    submit_application(db, caller, app.id).await
}

/// Complete application reviewed to `approved` by [`staff`].
pub async fn create_approved_application(
    db: &DatabaseConnection,
    student_id: &str,
    scholarship_id: i64,
) -> Result<application::Model> {
    let app = submit_complete_new(db, &student(student_id), scholarship_id).await?;
    let (_, approved) =
        review_application(db, &staff(), app.id, ApplicationStatus::Approved, None).await?;
    Ok(approved)
}
