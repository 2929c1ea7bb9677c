use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use config::{Config, Environment, File};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use tracing::{debug, error, info, trace};
use validator::Validate;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://expense-tracker.db?mode=rwc";
pub const DEFAULT_CONFIG_FILE: &str = "expense-tracker.toml";
const ENV_PREFIX: &str = "EXPENSE_TRACKER";

/// Application settings.
///
/// Sources, lowest precedence first: built-in defaults, the config file
/// (`expense-tracker.toml` or `EXPENSE_TRACKER_CONFIG`), plain `DATABASE_URL`,
/// then `EXPENSE_TRACKER_*` variables. Nested keys use a double underscore,
/// e.g. `EXPENSE_TRACKER_SCHEDULE__RUN_AT=06:30:00`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    pub database_url: String,
    #[validate(range(min = 1))]
    pub safety_limit: usize,
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    /// Local wall-clock time of the daily run.
    pub run_at: NaiveTime,
    /// Catch up immediately when the scheduler starts.
    pub run_on_startup: bool,
}

impl Settings {
    /// Loads `.env`, then the layered configuration from the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env(std::env::vars().collect())
    }

    /// Builds settings from an explicit set of environment variables.
    pub fn from_env(vars: HashMap<String, String>) -> Result<Self> {
        let config_file = vars.get("EXPENSE_TRACKER_CONFIG").map(PathBuf::from);
        let file = match &config_file {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let prefixed_url = format!("{}_DATABASE_URL", ENV_PREFIX);
        let legacy_url = if vars.contains_key(&prefixed_url) {
            None
        } else {
            vars.get("DATABASE_URL").cloned()
        };

        let settings: Settings = Config::builder()
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("safety_limit", compute::recurring::DEFAULT_SAFETY_LIMIT as i64)?
            .set_default("schedule.run_at", "00:00:00")?
            .set_default("schedule.run_on_startup", true)?
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .set_override_option("database_url", legacy_url)?
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate().context("Invalid configuration")?;
        debug!(?settings, "Configuration loaded");
        Ok(settings)
    }

    /// Applies command line overrides, held to the same rules as the configuration.
    pub fn with_overrides(
        mut self,
        database_url: Option<String>,
        safety_limit: Option<usize>,
    ) -> Result<Self> {
        if let Some(database_url) = database_url {
            self.database_url = database_url;
        }
        if let Some(safety_limit) = safety_limit {
            self.safety_limit = safety_limit;
        }
        self.validate().context("Invalid command line option")?;
        Ok(self)
    }
}

/// Connects to the database and brings the schema up to date.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Attempting to connect to database");
    debug!("Database URL: {}", database_url);
    let db = match Database::connect(database_url).await {
        Ok(connection) => {
            debug!("Database connection established");
            connection
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            return Err(e.into());
        }
    };

    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run database migrations: {}", e);
        return Err(e.into());
    }
    info!("Connected to database");

    Ok(db)
}
