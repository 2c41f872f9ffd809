//! Terminal dashboard for live crypto prices, price history and forecasts

pub mod cli;
pub mod config;
pub mod logging;
pub mod parsers;
pub mod services;
pub mod tui;
pub mod types;
