//! Shared data types and error definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tracked instrument identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Symbol {
    Btc,
    Eth,
    Sol,
    Ada,
    Dot,
    Avax,
    Matic,
    Link,
}

impl Symbol {
    /// Upper-case ticker as used on the wire
    pub fn ticker(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Sol => "SOL",
            Self::Ada => "ADA",
            Self::Dot => "DOT",
            Self::Avax => "AVAX",
            Self::Matic => "MATIC",
            Self::Link => "LINK",
        }
    }

    /// All tracked symbols in display order
    pub fn all() -> &'static [Symbol] {
        &[
            Symbol::Btc,
            Symbol::Eth,
            Symbol::Sol,
            Symbol::Ada,
            Symbol::Dot,
            Symbol::Avax,
            Symbol::Matic,
            Symbol::Link,
        ]
    }

    /// Next symbol (wrapping), used by selectors
    pub fn next(self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|s| *s == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for Symbol {
    type Err = CoinpulseError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Symbol::all()
            .iter()
            .copied()
            .find(|sym| sym.ticker().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoinpulseError::Config(format!("Unknown symbol: {}", wanted)))
    }
}

/// Forecast model offered by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    #[default]
    Arimax,
    Xgboost,
}

impl ForecastModel {
    /// Path segment for `/api/predict/{model}`
    pub fn path(self) -> &'static str {
        match self {
            Self::Arimax => "arimax",
            Self::Xgboost => "xgboost",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Arimax => "ARIMAX",
            Self::Xgboost => "XGBoost",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Arimax => Self::Xgboost,
            Self::Xgboost => Self::Arimax,
        }
    }
}

impl FromStr for ForecastModel {
    type Err = CoinpulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arimax" => Ok(Self::Arimax),
            "xgboost" => Ok(Self::Xgboost),
            other => Err(CoinpulseError::Config(format!(
                "Invalid model choice '{}'. Choose \"arimax\" or \"xgboost\".",
                other
            ))),
        }
    }
}

/// One push-delivered price observation
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: Symbol,
    pub time: String,
    pub price: f64,
    pub predicted_price: Option<f64>,
}

/// One entry of the combined live table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub time: String,
    pub symbol: Symbol,
    pub price: f64,
    pub change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_price: Option<f64>,
}

/// Historical price point from `/api/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: String,
    pub actual: f64,
}

/// Forecast point from `/api/predict/{model}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: String,
    pub predicted: f64,
}

/// Error metrics reported alongside a forecast
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    #[serde(rename = "MAE")]
    pub mae: f64,
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "MdAE")]
    pub mdae: f64,
}

/// Forecast response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub predictions: Vec<ForecastPoint>,
    #[serde(default)]
    pub metrics: Option<ForecastMetrics>,
}

/// Error type for coinpulse operations
#[derive(Error, Debug)]
pub enum CoinpulseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Auth error: {0}")]
    Auth(String),
}

pub type Result<T> = std::result::Result<T, CoinpulseError>;

/// Live-feed error kinds surfaced to the renderer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// Connection dropped or could not be opened
    #[error("Failed to connect to real-time data stream ({symbol}): {reason}")]
    Transport { symbol: Symbol, reason: String },

    /// Payload was not valid JSON
    #[error("Failed to parse server response")]
    Parse,

    /// Payload lacked `time` or the currency price field
    #[error("Invalid data received from server")]
    Validation,

    /// Server reported an error inside a well-formed payload
    #[error("{message}")]
    Upstream { symbol: Symbol, message: String },
}
