use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::SearchFilters;

pub const CONFIG_ENV: &str = "PRICE_TRACKER_CONFIG";
const APP_DIR: &str = "price-tracker";

/// Everything a run needs, loaded once and handed to each component.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct TrackerConfig {
    pub search_term: String,
    pub currency: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub filters: SearchFilters,
    pub browser: BrowserConfig,
    pub wait: WaitPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            search_term: "PS4".to_string(),
            currency: "€".to_string(),
            base_url: "https://www.amazon.de/".to_string(),
            output_dir: PathBuf::from("./reports"),
            filters: SearchFilters::default(),
            browser: BrowserConfig::default(),
            wait: WaitPolicy::default(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub incognito: bool,
    pub ignore_certificate_errors: bool,
    /// Use this driver binary instead of provisioning one.
    pub chromedriver_path: Option<PathBuf>,
    /// Passed to Chrome as `--user-data-dir`.
    pub chrome_profile: Option<String>,
    pub window_size: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            incognito: true,
            ignore_certificate_errors: true,
            chromedriver_path: None,
            chrome_profile: None,
            window_size: "1920,1080".to_string(),
        }
    }
}

/// Polling schedule for readiness waits: the interval doubles after each
/// probe, capped at `max_interval_ms`, until `timeout_ms` has elapsed.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WaitPolicy {
    pub timeout_ms: u64,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            initial_interval_ms: 250,
            max_interval_ms: 2_000,
        }
    }
}

impl WaitPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms.max(1))
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.initial_interval_ms).max(1))
    }
}

impl TrackerConfig {
    /// Loads from `$PRICE_TRACKER_CONFIG`, then the per-user config file,
    /// falling back to defaults when neither exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Detail URLs are built as `base_url + "dp/" + id`, so the base must end
    /// with a slash.
    fn normalize(&mut self) {
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search_term.trim().is_empty() {
            return Err(ConfigError::Invalid("search_term is empty".into()));
        }
        if self.currency.is_empty() {
            return Err(ConfigError::Invalid("currency is empty".into()));
        }
        if self.wait.timeout_ms == 0 {
            return Err(ConfigError::Invalid("wait.timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}
