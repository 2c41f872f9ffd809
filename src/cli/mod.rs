//! CLI command handling

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::Config;
use crate::logging::{self, LogStore};
use crate::services::normalizer::{display_name, format_price};
use crate::services::series::merge_series;
use crate::services::{ApiClient, SessionStore};
use crate::tui::widgets::tabs::Tab;
use crate::tui::TuiConfig;
use crate::types::{ForecastMetrics, ForecastModel, ForecastPoint, PricePoint, Symbol};

/// Live crypto prices, history and model forecasts in the terminal
#[derive(Parser)]
#[command(name = "coinpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "COINPULSE_API_URL")]
    api_url: Option<String>,

    /// Quote currency (e.g. USD)
    #[arg(long, global = true)]
    currency: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the live dashboard (default)
    Live {
        /// Open on the forecast tab
        #[arg(long)]
        forecast: bool,
    },

    /// Show recent price history for a symbol
    History {
        #[arg(long, default_value = "BTC")]
        symbol: Symbol,

        /// Number of points (defaults to config)
        #[arg(long)]
        limit: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a model forecast for a symbol
    Forecast {
        #[arg(long, default_value = "arimax")]
        model: ForecastModel,

        #[arg(long, default_value = "BTC")]
        symbol: Symbol,

        /// Periods to predict (defaults to config)
        #[arg(long)]
        steps: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show current prices
    Prices {
        /// Comma-separated symbols (defaults to config)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<Symbol>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in and keep the session token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account and log in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the saved session
    Logout,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?.with_overrides(self.api_url, self.currency)?;
        let command = self.command.unwrap_or(Commands::Live { forecast: false });

        // The dashboard owns the terminal and installs its own logger
        if !matches!(command, Commands::Live { .. }) {
            logging::init_for_cli().map_err(anyhow::Error::msg)?;
        }
        run_command(command, config)
    }
}

fn run_live(config: Config, initial_tab: Tab) -> anyhow::Result<()> {
    let log_store = Arc::new(Mutex::new(LogStore::new(200)));
    logging::init_for_tui(log_store.clone()).map_err(anyhow::Error::msg)?;

    crate::tui::run(TuiConfig {
        initial_tab,
        token: saved_token(),
        config,
        log_store,
    })
}

fn saved_token() -> Option<String> {
    SessionStore::new().ok().and_then(|store| store.token())
}

fn api_client(config: &Config) -> anyhow::Result<ApiClient> {
    Ok(
        ApiClient::new(&config.api_url, config.request_timeout(), config.retries)?
            .with_token(saved_token()),
    )
}

fn run_command(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Live { forecast } => {
            let tab = if forecast { Tab::Forecast } else { Tab::Live };
            run_live(config, tab)
        }
        Commands::History {
            symbol,
            limit,
            json,
        } => run_history(&config, symbol, limit.unwrap_or(config.history_limit), json),
        Commands::Forecast {
            model,
            symbol,
            steps,
            json,
        } => run_forecast(
            &config,
            model,
            symbol,
            steps.unwrap_or(config.forecast_steps),
            json,
        ),
        Commands::Prices { symbols, json } => {
            let symbols = if symbols.is_empty() {
                config.symbols.clone()
            } else {
                symbols
            };
            run_prices(&config, &symbols, json)
        }
        Commands::Login { username, password } => {
            let token = api_client(&config)?.login(&username, &password)?;
            SessionStore::new()?.save(&username, &token)?;
            println!("Logged in as {}", username);
            Ok(())
        }
        Commands::Register { username, password } => {
            let token = api_client(&config)?.register(&username, &password)?;
            SessionStore::new()?.save(&username, &token)?;
            println!("Registered and logged in as {}", username);
            Ok(())
        }
        Commands::Logout => {
            SessionStore::new()?.clear()?;
            println!("Logged out");
            Ok(())
        }
    }
}

/// Output price history
fn run_history(config: &Config, symbol: Symbol, limit: u32, json: bool) -> anyhow::Result<()> {
    let history = api_client(config)?
        .history(symbol, &config.currency, limit)
        .with_context(|| format!("fetching {} history", symbol))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!(
        "{} ({}) in {}",
        display_name(symbol),
        symbol,
        config.currency
    );
    for point in &history {
        println!("  {:<22} {:>16}", point.time, format_price(point.actual));
    }
    if history.is_empty() {
        println!("  No data available");
    }
    Ok(())
}

#[derive(Serialize)]
struct ForecastReport {
    symbol: Symbol,
    model: ForecastModel,
    currency: String,
    history: Vec<PricePoint>,
    predictions: Vec<ForecastPoint>,
    metrics: Option<ForecastMetrics>,
}

/// Output history plus model predictions
fn run_forecast(
    config: &Config,
    model: ForecastModel,
    symbol: Symbol,
    steps: u32,
    json: bool,
) -> anyhow::Result<()> {
    let api = api_client(config)?;
    let history = api.history(symbol, &config.currency, config.history_limit)?;
    let forecast = api
        .forecast(model, symbol, &config.currency, steps)
        .with_context(|| format!("{} forecast for {}", model.label(), symbol))?;

    if json {
        let report = ForecastReport {
            symbol,
            model,
            currency: config.currency.clone(),
            history,
            predictions: forecast.predictions,
            metrics: forecast.metrics,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} forecast for {} ({} steps, {})",
        model.label(),
        symbol,
        steps,
        config.currency
    );
    println!("  {:<22} {:>16} {:>16}", "Time", "Actual", "Predicted");
    for point in merge_series(&history, &forecast.predictions) {
        let cell = |v: Option<f64>| v.map(format_price).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<22} {:>16} {:>16}",
            point.time,
            cell(point.actual),
            cell(point.predicted)
        );
    }
    if let Some(m) = forecast.metrics {
        println!(
            "  RMSE {:.4}  MAE {:.4}  MSE {:.4}  MdAE {:.4}",
            m.rmse, m.mae, m.mse, m.mdae
        );
    }
    Ok(())
}

/// Output current prices
fn run_prices(config: &Config, symbols: &[Symbol], json: bool) -> anyhow::Result<()> {
    let prices = api_client(config)?.current_prices(symbols, &config.currency)?;

    if json {
        let ordered: std::collections::BTreeMap<Symbol, f64> = prices.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    for symbol in symbols {
        let price = prices
            .get(symbol)
            .map(|p| format_price(*p))
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "  {:<6} {:<10} {:>16} {}",
            symbol.ticker(),
            display_name(*symbol),
            price,
            config.currency
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::try_parse_from(["coinpulse"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_live() {
        let cli = Cli::try_parse_from(["coinpulse", "live"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Live { forecast: false })));

        let cli = Cli::try_parse_from(["coinpulse", "live", "--forecast"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Live { forecast: true })));
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "coinpulse",
            "prices",
            "--api-url",
            "http://10.0.0.2:5001",
            "--currency",
            "eur",
        ])
        .unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://10.0.0.2:5001"));
        assert_eq!(cli.currency.as_deref(), Some("eur"));
    }

    #[test]
    fn test_cli_parse_history() {
        let cli = Cli::try_parse_from(["coinpulse", "history", "--symbol", "eth", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::History {
                symbol: Symbol::Eth,
                limit: None,
                json: true
            })
        ));
    }

    #[test]
    fn test_cli_parse_forecast() {
        let cli = Cli::try_parse_from([
            "coinpulse",
            "forecast",
            "--model",
            "xgboost",
            "--steps",
            "5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Forecast {
                model: ForecastModel::Xgboost,
                symbol: Symbol::Btc,
                steps: Some(5),
                json: false
            })
        ));
    }

    #[test]
    fn test_cli_parse_forecast_rejects_unknown_model() {
        let result = Cli::try_parse_from(["coinpulse", "forecast", "--model", "lstm"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_prices_list() {
        let cli = Cli::try_parse_from(["coinpulse", "prices", "--symbols", "BTC,SOL"]).unwrap();
        match cli.command {
            Some(Commands::Prices { symbols, json }) => {
                assert_eq!(symbols, vec![Symbol::Btc, Symbol::Sol]);
                assert!(!json);
            }
            _ => panic!("expected prices command"),
        }
    }

    #[test]
    fn test_cli_parse_prices_rejects_unknown_symbol() {
        let result = Cli::try_parse_from(["coinpulse", "prices", "--symbols", "BTC,DOGE"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_login_requires_credentials() {
        assert!(Cli::try_parse_from(["coinpulse", "login", "--username", "ann"]).is_err());
        let cli = Cli::try_parse_from([
            "coinpulse",
            "login",
            "--username",
            "ann",
            "--password",
            "pw",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Login { .. })));
    }

    #[test]
    fn test_cli_parse_logout() {
        let cli = Cli::try_parse_from(["coinpulse", "logout"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Logout)));
    }
}
