//! Tab bar with a status badge per view

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::tui::theme::Theme;

/// Available tabs in the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Live,
    Forecast,
}

impl Tab {
    pub fn label(self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Forecast => "Forecast",
        }
    }

    pub fn all() -> &'static [Tab] {
        &[Tab::Live, Tab::Forecast]
    }

    /// Get the next tab (wrapping)
    pub fn next(self) -> Self {
        match self {
            Self::Live => Self::Forecast,
            Self::Forecast => Self::Live,
        }
    }

    /// Get the previous tab (wrapping)
    pub fn prev(self) -> Self {
        // Two tabs: same as next
        self.next()
    }
}

/// What each tab is doing right now
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabStatus {
    /// Live streams still open, out of all symbols. `None` while stopped.
    pub streams: Option<(usize, usize)>,
    /// Spinner glyph while a forecast request runs
    pub forecast_spinner: Option<char>,
}

pub struct TabBar {
    selected: Tab,
    status: TabStatus,
    theme: Theme,
}

impl TabBar {
    pub fn new(selected: Tab, status: TabStatus, theme: Theme) -> Self {
        Self {
            selected,
            status,
            theme,
        }
    }

    fn badge(&self, tab: Tab) -> Option<Span<'static>> {
        match tab {
            Tab::Live => Some(match self.status.streams {
                None => Span::styled("○ off", Style::default().fg(self.theme.muted)),
                Some((open, total)) => {
                    let color = if open == total && total > 0 {
                        self.theme.up
                    } else {
                        self.theme.down
                    };
                    Span::styled(format!("● {}/{}", open, total), Style::default().fg(color))
                }
            }),
            Tab::Forecast => self
                .status
                .forecast_spinner
                .map(|c| Span::styled(c.to_string(), Style::default().fg(self.theme.accent))),
        }
    }
}

impl Widget for TabBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let accent = Style::default()
            .fg(self.theme.accent)
            .add_modifier(Modifier::BOLD);
        let mut spans = vec![Span::styled(" coinpulse", accent), Span::raw("   ")];

        for &tab in Tab::all() {
            let style = if tab == self.selected {
                accent.add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(self.theme.muted)
            };
            spans.push(Span::styled(format!(" {} ", tab.label()), style));
            if let Some(badge) = self.badge(tab) {
                spans.push(Span::raw(" "));
                spans.push(badge);
            }
            spans.push(Span::raw("  "));
        }

        // Line clips at the area edge
        Line::from(spans).render(Rect { height: 1, ..area }, buf);
    }
}
