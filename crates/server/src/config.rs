use agency_core::{DeadlinePolicy, DeadlineError};
use agency_import::ExtractOptions;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "AGENCY_CONFIG";
pub const BIND_ENV: &str = "AGENCY_BIND";
pub const DATABASE_ENV: &str = "AGENCY_DATABASE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeadlineSettings {
    pub critical_fraction: f64,
    pub warning_fraction: f64,
}

impl Default for DeadlineSettings {
    fn default() -> Self {
        let policy = DeadlinePolicy::default();
        Self {
            critical_fraction: policy.critical_fraction(),
            warning_fraction: policy.warning_fraction(),
        }
    }
}

impl DeadlineSettings {
    pub fn policy(&self) -> Result<DeadlinePolicy, DeadlineError> {
        DeadlinePolicy::new(self.critical_fraction, self.warning_fraction)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
    /// Seconds after which an import left in `processing` may be retried.
    pub stale_import_secs: u64,
    pub deadline: DeadlineSettings,
    pub import: ExtractOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            database_path: default_database_path(),
            max_body_bytes: 10 * 1024 * 1024,
            log_format: LogFormat::default(),
            stale_import_secs: 300,
            deadline: DeadlineSettings::default(),
            import: ExtractOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `$AGENCY_CONFIG` when set, then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.deadline_policy()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: ServerConfig = toml::from_str(text)?;
        config.deadline_policy()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind = bind;
        }
        if let Some(path) = lookup(DATABASE_ENV) {
            self.database_path = PathBuf::from(path);
        }
    }

    pub fn deadline_policy(&self) -> anyhow::Result<DeadlinePolicy> {
        Ok(self.deadline.policy()?)
    }

    pub fn stale_import_after(&self) -> Duration {
        Duration::from_secs(self.stale_import_secs)
    }
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "agency", "Agency")
        .map(|dirs| dirs.data_dir().join("agency.db"))
        .unwrap_or_else(|| PathBuf::from("agency.db"))
}
