//! Runtime configuration
//!
//! Defaults, overridden by `~/.coinpulse/config.toml` when present, then by
//! environment and command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::services::normalizer::normalize_currency;
use crate::types::{CoinpulseError, Result, Symbol};

pub const DEFAULT_API_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Backend base URL
    pub api_url: String,
    /// Quote currency for prices and streams
    pub currency: String,
    /// Symbols monitored in the live view
    pub symbols: Vec<Symbol>,
    /// Batch price refresh period for the summary cards
    pub refresh_interval_secs: u64,
    /// Timeout for request/response calls
    pub request_timeout_secs: u64,
    /// Retries for idempotent requests
    pub retries: u32,
    /// Points requested from `/api/history`
    pub history_limit: u32,
    /// Default forecast horizon
    pub forecast_steps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            currency: "USD".to_string(),
            symbols: Symbol::all().to_vec(),
            refresh_interval_secs: 30,
            request_timeout_secs: 15,
            retries: 2,
            history_limit: 30,
            forecast_steps: 10,
        }
    }
}

impl Config {
    /// `~/.coinpulse/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|d| d.home_dir().join(".coinpulse").join("config.toml"))
    }

    /// Load from the default path, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| CoinpulseError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CoinpulseError::Config(e.to_string()))?;
        config.normalized()
    }

    /// Apply command-line / environment overrides
    pub fn with_overrides(mut self, api_url: Option<String>, currency: Option<String>) -> Result<Self> {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(cur) = currency {
            self.currency = cur;
        }
        self.normalized()
    }

    fn normalized(mut self) -> Result<Self> {
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        self.currency = normalize_currency(&self.currency);
        self.symbols.sort();
        self.symbols.dedup();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(CoinpulseError::Config(format!(
                "api_url must start with http:// or https:// (got '{}')",
                self.api_url
            )));
        }
        if self.currency.is_empty() || !self.currency.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoinpulseError::Config(format!(
                "currency must be a non-empty code (got '{}')",
                self.currency
            )));
        }
        if self.symbols.is_empty() {
            return Err(CoinpulseError::Config("symbols must not be empty".into()));
        }
        if self.refresh_interval_secs == 0 || self.request_timeout_secs == 0 {
            return Err(CoinpulseError::Config(
                "refresh_interval_secs and request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
