//! Handles settings for the application. Configuration is read from
//! `settings.toml` and may be overridden by `SPENDWISE__*` environment
//! variables (e.g. `SPENDWISE__SERVER__PORT=8080`).
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
    /// Zone used for "now", "today" and default expense dates.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

/// Scheduled removal of old expenses.
#[derive(Debug, Deserialize)]
pub struct Purge {
    pub interval_secs: u64,
    /// Expenses dated more than this many days ago are deleted.
    pub retention_days: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Option<Server>,
    pub purge: Option<Purge>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Manila
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(
            Config::builder()
                .add_source(File::with_name("settings").required(false))
                .add_source(Environment::with_prefix("SPENDWISE").separator("__"))
                .build()?,
        )
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }
}
