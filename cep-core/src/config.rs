use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    http::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, RetryPolicy},
    history::DEFAULT_HISTORY_LIMIT,
    provider::{brasilapi, viacep},
    weather::{self, validate_forecast_days},
};

pub const DEFAULT_FORECAST_DAYS: u8 = 3;

/// Base URLs of the remote services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub brasilapi: String,
    pub viacep: String,
    pub geocoding: String,
    pub forecast: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            brasilapi: brasilapi::DEFAULT_BASE_URL.to_string(),
            viacep: viacep::DEFAULT_BASE_URL.to_string(),
            geocoding: weather::DEFAULT_GEOCODING_URL.to_string(),
            forecast: weather::DEFAULT_FORECAST_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL (used against a local mock server).
    pub fn local(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            brasilapi: format!("{base}/api/cep/v2"),
            viacep: format!("{base}/ws"),
            geocoding: format!("{base}/v1/search"),
            forecast: format!("{base}/v1/forecast"),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// timeout_ms = 5000
/// max_retries = 2
/// forecast_days = 3
///
/// [endpoints]
/// viacep = "https://viacep.com.br/ws"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-request deadline in milliseconds.
    pub timeout_ms: u64,
    /// Retries per CEP provider after the first attempt.
    pub max_retries: u32,
    /// First backoff delay in milliseconds; doubled on every retry.
    pub backoff_base_ms: u64,
    /// Default number of forecast days, 1 to 7.
    pub forecast_days: u8,
    /// Number of lookups kept in the history.
    pub history_limit: usize,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE.as_millis() as u64,
            forecast_days: DEFAULT_FORECAST_DAYS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_base_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            bail!("timeout_ms must be greater than zero");
        }
        if self.history_limit == 0 {
            bail!("history_limit must be greater than zero");
        }
        validate_forecast_days(self.forecast_days).map_err(|_| {
            anyhow!("forecast_days must be between 1 and 7, got {}", self.forecast_days)
        })?;
        Ok(())
    }

    pub fn set_forecast_days(&mut self, days: u8) -> Result<()> {
        self.forecast_days = validate_forecast_days(days)
            .map_err(|_| anyhow!("forecast_days must be between 1 and 7, got {days}"))?;
        Ok(())
    }

    /// Load config from the platform location, or defaults on first run.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "cep-lookup", "cep-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the search history.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let cfg = Config::default();

        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.forecast_days, 3);
        assert_eq!(cfg.history_limit, 10);
        assert_eq!(cfg.endpoints.viacep, "https://viacep.com.br/ws");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.timeout_ms = 2500;
        cfg.set_forecast_days(7).unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "max_retries = 0\n[endpoints]\nviacep = \"http://localhost:1/ws\"\n",
        )
        .unwrap();

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.max_retries, 0);
        assert_eq!(cfg.endpoints.viacep, "http://localhost:1/ws");
        assert_eq!(cfg.endpoints.brasilapi, brasilapi::DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout_ms, 5000);
    }

    #[test]
    fn invalid_forecast_days_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "forecast_days = 9\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("forecast_days must be between 1 and 7"));

        let mut cfg = Config::default();
        assert!(cfg.set_forecast_days(0).is_err());
        assert_eq!(cfg.forecast_days, 3);
    }

    #[test]
    fn local_endpoints_share_base() {
        let endpoints = Endpoints::local("http://127.0.0.1:8080/");
        assert_eq!(endpoints.brasilapi, "http://127.0.0.1:8080/api/cep/v2");
        assert_eq!(endpoints.forecast, "http://127.0.0.1:8080/v1/forecast");
    }
}
