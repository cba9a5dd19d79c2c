use dotenvy::dotenv;
use scholarship_engine::{
    config::{database, scholarships, settings::EngineSettings},
    core::{budget::list_budgets, notify::TracingNotifier, scholarship::list_active_scholarships},
    errors::Result,
    service::ScholarshipService,
};
use std::{path::Path, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    let settings = EngineSettings::from_env()
        .inspect_err(|e| error!("Invalid engine settings: {}", e))?;
    info!(
        read_retry_attempts = settings.read_retry_attempts,
        "Engine settings loaded"
    );

    // 3. Connect and make sure the schema exists
    let url = database::get_database_url();
    if let Some(parent) = sqlite_file_parent(&url) {
        std::fs::create_dir_all(parent)?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 4. Seed scholarships and budgets from config.toml when present
    if Path::new("config.toml").exists() {
        let config = scholarships::load_default_config()?;
        scholarships::seed_scholarships(&db, &config)
            .await
            .inspect_err(|e| error!("Failed to seed scholarships: {}", e))?;
    } else {
        warn!("No config.toml found, skipping scholarship seeding.");
    }

    // 5. Budget utilization per active scholarship
    let service = ScholarshipService::new(db.clone(), Arc::new(TracingNotifier), settings);
    for scholarship in list_active_scholarships(&db).await? {
        for budget in list_budgets(&db, scholarship.id).await? {
            let report = service
                .utilization_report(scholarship.id, budget.budget_year)
                .await?;
            info!(
                scholarship = %report.scholarship_name,
                year = budget.budget_year,
                allocated = %report.budget.allocated_budget,
                remaining = %report.budget.remaining_budget,
                places_left = report.quota.available_quota,
                "{}",
                report.progress_bar
            );
        }
    }

    Ok(())
}

/// Directory holding a file-backed `SQLite` database, if the URL names one.
fn sqlite_file_parent(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    if path.is_empty() || path.contains(":memory:") {
        return None;
    }
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}
