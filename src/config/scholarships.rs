//! Scholarship configuration loading from config.toml
//!
//! Scholarships and their yearly budgets defined in config.toml are used to
//! seed the database at startup. Seeding is keyed by scholarship name and by
//! `(scholarship, year)` for budgets, so running it again changes nothing.

use crate::{
    core::{
        access::Caller,
        budget::{create_budget, get_budget},
        eligibility::{Criterion, EligibilityCriteria},
        scholarship::{NewScholarship, create_scholarship, get_scholarship_by_name},
    },
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Scholarships to seed
    #[serde(default)]
    pub scholarships: Vec<ScholarshipConfig>,
}

/// Configuration for a single scholarship
#[derive(Debug, Deserialize, Clone)]
pub struct ScholarshipConfig {
    /// Unique scholarship name
    pub name: String,
    /// Default award per recipient
    pub amount: Decimal,
    /// Number of recipients that can be funded
    pub total_quota: i32,
    /// First day applications are accepted (`YYYY-MM-DD`)
    pub application_start_date: NaiveDate,
    /// Last day applications are accepted (`YYYY-MM-DD`)
    pub application_end_date: NaiveDate,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Document types required on top of `id_card` and `transcript`
    #[serde(default)]
    pub required_documents: Vec<String>,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub budgets: Vec<BudgetConfig>,
}

/// One budget year of a scholarship
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BudgetConfig {
    pub year: i32,
    pub total: Decimal,
}

const fn default_active() -> bool {
    true
}

/// Counts of what a seeding run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub scholarships_created: usize,
    pub scholarships_existing: usize,
    pub budgets_created: usize,
}

/// Loads scholarship configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses config.toml contents.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads scholarship configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}

/// Creates every configured scholarship and budget that does not exist yet.
pub async fn seed_scholarships(db: &DatabaseConnection, config: &Config) -> Result<SeedReport> {
    let system = Caller::system();
    let mut report = SeedReport::default();

    for entry in &config.scholarships {
        let scholarship = if let Some(existing) = get_scholarship_by_name(db, &entry.name).await? {
            debug!(name = %entry.name, "Scholarship already seeded");
            report.scholarships_existing += 1;
            existing
        } else {
            let created = create_scholarship(
                db,
                &system,
                NewScholarship {
                    name: entry.name.clone(),
                    amount: entry.amount,
                    total_quota: entry.total_quota,
                    application_start_date: entry.application_start_date,
                    application_end_date: entry.application_end_date,
                    eligibility_criteria: EligibilityCriteria(entry.criteria.clone()),
                    required_documents: entry.required_documents.clone(),
                    is_active: entry.is_active,
                },
            )
            .await?;
            report.scholarships_created += 1;
            created
        };

        for budget in &entry.budgets {
            if get_budget(db, scholarship.id, budget.year).await?.is_none() {
                create_budget(db, &system, scholarship.id, budget.year, budget.total).await?;
                report.budgets_created += 1;
            }
        }
    }

    info!(
        created = report.scholarships_created,
        existing = report.scholarships_existing,
        budgets = report.budgets_created,
        "Scholarship seeding finished"
    );
    Ok(report)
}
