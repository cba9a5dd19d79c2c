//! Database configuration module for the scholarship engine.
//!
//! This module handles database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Constraints the entity macros cannot express (the composite budget
//! key and the one-open-application rule) are created as explicit indexes.

use crate::entities::{
    Activity, Address, Allocation, Application, ApplicationStatus, Budget, Document,
    EducationRecord, FamilyMember, FinancialInfo, PersonalInfo, Scholarship, WorkflowEvent,
    budget,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/scholarships.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let url = get_database_url();
    debug!("Connecting to database at {}", url);
    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(false);
    Database::connect(options).await.map_err(Into::into)
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Parents are created before the tables that reference them.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Scholarship),
        schema.create_table_from_entity(Budget),
        schema.create_table_from_entity(Application),
        schema.create_table_from_entity(WorkflowEvent),
        schema.create_table_from_entity(PersonalInfo),
        schema.create_table_from_entity(Address),
        schema.create_table_from_entity(EducationRecord),
        schema.create_table_from_entity(FamilyMember),
        schema.create_table_from_entity(FinancialInfo),
        schema.create_table_from_entity(Activity),
        schema.create_table_from_entity(Document),
        schema.create_table_from_entity(Allocation),
    ];

    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    // One budget row per scholarship and year
    let budget_year_index = Index::create()
        .name("idx_budgets_scholarship_year")
        .table(Budget)
        .col(budget::Column::ScholarshipId)
        .col(budget::Column::BudgetYear)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&budget_year_index)).await?;

    // At most one open application per student and scholarship
    let open_statuses = ApplicationStatus::OPEN
        .iter()
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    db.execute_unprepared(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_applications_one_open \
         ON applications (student_id, scholarship_id) \
         WHERE status IN ({open_statuses})"
    ))
    .await?;

    info!("Database tables and indexes ensured.");
    Ok(())
}
