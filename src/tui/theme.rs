//! Colour palette, picked from the terminal background

use ratatui::style::Color;

use crate::types::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub up: Color,
    pub down: Color,
    pub error: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            accent: Color::Cyan,
            text: Color::White,
            muted: Color::DarkGray,
            up: Color::Green,
            down: Color::Red,
            error: Color::LightRed,
        }
    }

    pub fn light() -> Self {
        Self {
            accent: Color::Blue,
            text: Color::Black,
            muted: Color::Gray,
            up: Color::Rgb(0, 128, 0),
            down: Color::Rgb(178, 34, 34),
            error: Color::Red,
        }
    }

    /// Light palette on bright backgrounds, dark otherwise
    pub fn detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.6 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Colour for a percent change; neutral when undefined or flat
    pub fn change_color(self, change: Option<f64>) -> Color {
        match change {
            Some(c) if c > 0.0 => self.up,
            Some(c) if c < 0.0 => self.down,
            _ => self.muted,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

/// Brand colour per instrument
pub fn symbol_color(symbol: Symbol) -> Color {
    match symbol {
        Symbol::Btc => Color::Rgb(247, 147, 26),
        Symbol::Eth => Color::Rgb(98, 126, 234),
        Symbol::Sol => Color::Rgb(0, 255, 163),
        Symbol::Ada => Color::Rgb(0, 51, 173),
        Symbol::Dot => Color::Rgb(230, 0, 122),
        Symbol::Avax => Color::Rgb(232, 65, 66),
        Symbol::Matic => Color::Rgb(130, 71, 229),
        Symbol::Link => Color::Rgb(42, 90, 218),
    }
}
