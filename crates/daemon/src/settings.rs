// Worker process settings
//
// Sources, later ones win: built-in defaults, optional `tenantq.toml`
// (or the file named by TENANTQ_CONFIG), TENANTQ_* environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenantq_core::application::worker::constants::{
    DEFAULT_RECOVERY_WINDOW_MS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_WORKER_COUNT,
    IDLE_SLEEP_DURATION,
};
use tenantq_core::application::WorkerConfig;
use tenantq_core::domain::DEFAULT_QUEUE;

const DEFAULT_CONFIG_FILE: &str = "tenantq.toml";
const DEFAULT_DB_PATH: &str = "~/.tenantq/tenantq.db";
const DEFAULT_BASE_PATH: &str = "~/.tenantq/storage";
const ENV_PREFIX: &str = "TENANTQ";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite file shared by workers and the CLI
    pub db_path: String,
    /// Root directory for marker files
    pub base_path: String,
    pub queue: String,
    pub workers: usize,
    pub retry_base_delay_ms: i64,
    pub idle_sleep_ms: u64,
    pub recovery_window_ms: i64,
    /// `pretty` or `json`
    pub log_format: String,
    /// Daily-rolling log files are written here when set
    pub log_dir: Option<String>,
}

impl Settings {
    /// Load from the default file location and the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(format!("{}_CONFIG", ENV_PREFIX))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_sources(Some(&file), None)
    }

    /// Load from explicit sources; `env` replaces the process environment when given
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("base_path", DEFAULT_BASE_PATH)?
            .set_default("queue", DEFAULT_QUEUE)?
            .set_default("workers", DEFAULT_WORKER_COUNT as i64)?
            .set_default("retry_base_delay_ms", DEFAULT_RETRY_BASE_DELAY_MS)?
            .set_default("idle_sleep_ms", IDLE_SLEEP_DURATION.as_millis() as i64)?
            .set_default("recovery_window_ms", DEFAULT_RECOVERY_WINDOW_MS)?
            .set_default("log_format", "pretty")?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings.expanded())
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.workers > 0, "workers must be at least 1");
        anyhow::ensure!(!self.queue.trim().is_empty(), "queue must not be empty");
        anyhow::ensure!(
            self.retry_base_delay_ms >= 0,
            "retry_base_delay_ms must not be negative"
        );
        anyhow::ensure!(
            matches!(self.log_format.as_str(), "pretty" | "json"),
            "log_format must be \"pretty\" or \"json\", got {:?}",
            self.log_format
        );
        Ok(())
    }

    fn expanded(mut self) -> Self {
        self.db_path = shellexpand::tilde(&self.db_path).into_owned();
        self.base_path = shellexpand::tilde(&self.base_path).into_owned();
        self.log_dir = self
            .log_dir
            .map(|dir| shellexpand::tilde(&dir).into_owned());
        self
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            idle_sleep: Duration::from_millis(self.idle_sleep_ms),
            ..WorkerConfig::for_queue(self.queue.clone())
        }
    }
}
