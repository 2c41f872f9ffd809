//! Display and input normalization helpers
//!
//! Turns symbols, currencies and prices into the forms shown in the
//! dashboard and sent to the backend.

use crate::types::Symbol;

/// Human-readable instrument name.
///
/// # Examples
/// - `BTC` → "Bitcoin"
/// - `MATIC` → "Polygon"
pub fn display_name(symbol: Symbol) -> &'static str {
    match symbol {
        Symbol::Btc => "Bitcoin",
        Symbol::Eth => "Ethereum",
        Symbol::Sol => "Solana",
        Symbol::Ada => "Cardano",
        Symbol::Dot => "Polkadot",
        Symbol::Avax => "Avalanche",
        Symbol::Matic => "Polygon",
        Symbol::Link => "Chainlink",
    }
}

/// Normalize a currency code: trim and upper-case ("usd " → "USD")
pub fn normalize_currency(currency: &str) -> String {
    currency.trim().to_ascii_uppercase()
}

/// Format a price with two decimals and thousand separators
/// (e.g., 1234567.891 -> "1,234,567.89")
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "N/A".to_string();
    }

    let fixed = format!("{:.2}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    let chars: Vec<char> = int_part.chars().collect();
    for (i, ch) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let sign = if price < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Format a percent change ("+1.23%", "-0.50%", or "N/A" when undefined)
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) if c.is_finite() => format!("{:+.2}%", c),
        _ => "N/A".to_string(),
    }
}
