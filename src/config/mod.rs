/// Database configuration and connection management
pub mod database;

/// Scholarship and budget seeding from config.toml
pub mod scholarships;

/// Runtime settings from environment variables
pub mod settings;
