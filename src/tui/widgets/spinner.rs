//! Loading indicator for background requests

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};

use crate::tui::theme::Theme;

const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// What the app is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStage {
    RefreshingPrices,
    FetchingHistory,
    Forecasting,
}

impl LoadingStage {
    pub fn message(self) -> &'static str {
        match self {
            Self::RefreshingPrices => "Refreshing prices...",
            Self::FetchingHistory => "Fetching price history...",
            Self::Forecasting => "Running forecast...",
        }
    }

    /// Position within a multi-request job, as (step, of)
    pub fn progress(self) -> Option<(u8, u8)> {
        match self {
            Self::RefreshingPrices => None,
            Self::FetchingHistory => Some((1, 2)),
            Self::Forecasting => Some((2, 2)),
        }
    }
}

pub struct Spinner {
    frame: usize,
    stage: LoadingStage,
    theme: Theme,
}

impl Spinner {
    pub fn new(frame: usize, stage: LoadingStage) -> Self {
        Self {
            frame,
            stage,
            theme: Theme::dark(),
        }
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn current_char(&self) -> char {
        SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
    }

    /// Advance to next frame, returning the new frame index
    pub fn next_frame(frame: usize) -> usize {
        (frame + 1) % SPINNER_FRAMES.len()
    }

    fn line(&self, width: u16) -> Line<'static> {
        let glyph = Span::styled(
            self.current_char().to_string(),
            Style::default().fg(self.theme.accent),
        );
        let mut spans = vec![
            glyph.clone(),
            Span::raw(" "),
            Span::styled(self.stage.message(), Style::default().fg(self.theme.text)),
        ];
        if let Some((step, of)) = self.stage.progress() {
            spans.push(Span::styled(
                format!("  step {}/{}", step, of),
                Style::default().fg(self.theme.muted),
            ));
        }

        let line = Line::from(spans);
        if line.width() > usize::from(width) {
            // Too narrow for the message; keep the animation
            Line::from(glyph)
        } else {
            line
        }
    }
}

impl Widget for Spinner {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let row = Rect {
            y: area.y + area.height / 2,
            height: 1,
            ..area
        };
        self.line(area.width).centered().render(row, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_current_char() {
        let spinner = Spinner::new(0, LoadingStage::RefreshingPrices);
        assert_eq!(spinner.current_char(), '⠋');

        let spinner = Spinner::new(5, LoadingStage::RefreshingPrices);
        assert_eq!(spinner.current_char(), '⠴');
    }

    #[test]
    fn test_spinner_wraps() {
        let spinner = Spinner::new(10, LoadingStage::Forecasting);
        assert_eq!(spinner.current_char(), '⠋');
    }

    #[test]
    fn test_next_frame() {
        assert_eq!(Spinner::next_frame(0), 1);
        assert_eq!(Spinner::next_frame(9), 0);
    }

    #[test]
    fn test_loading_stage_message() {
        assert_eq!(
            LoadingStage::RefreshingPrices.message(),
            "Refreshing prices..."
        );
        assert_eq!(
            LoadingStage::FetchingHistory.message(),
            "Fetching price history..."
        );
        assert_eq!(LoadingStage::Forecasting.message(), "Running forecast...");
    }

    fn render_text(spinner: Spinner, area: Rect) -> String {
        let mut buf = Buffer::empty(area);
        spinner.render(area, &mut buf);
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_spinner_shows_stage_and_step() {
        let content = render_text(
            Spinner::new(1, LoadingStage::Forecasting),
            Rect::new(0, 0, 50, 3),
        );
        assert!(content.contains("⠙ Running forecast...  step 2/2"));

        let content = render_text(
            Spinner::new(0, LoadingStage::RefreshingPrices),
            Rect::new(0, 0, 50, 3),
        );
        assert!(content.contains("Refreshing prices..."));
        assert!(!content.contains("step"));
    }

    #[test]
    fn test_spinner_narrow_area_keeps_glyph() {
        let content = render_text(
            Spinner::new(0, LoadingStage::FetchingHistory),
            Rect::new(0, 0, 10, 3),
        );
        assert_eq!(content.trim(), "⠋");
    }
}
