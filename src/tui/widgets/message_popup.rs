//! Message popup widget - overlay for request failures

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

const POPUP_WIDTH: u16 = 56;
const POPUP_HEIGHT: u16 = 7;

/// Centered message box, dismissed by any key
pub struct MessagePopup<'a> {
    title: &'a str,
    message: &'a str,
    color: Color,
}

impl<'a> MessagePopup<'a> {
    pub fn new(title: &'a str, message: &'a str, color: Color) -> Self {
        Self {
            title,
            message,
            color,
        }
    }

    /// Calculate centered popup area
    pub fn centered_area(area: Rect) -> Rect {
        let x = area.x + (area.width.saturating_sub(POPUP_WIDTH)) / 2;
        let y = area.y + (area.height.saturating_sub(POPUP_HEIGHT)) / 2;
        Rect {
            x,
            y,
            width: POPUP_WIDTH.min(area.width),
            height: POPUP_HEIGHT.min(area.height),
        }
    }
}

impl Widget for MessagePopup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.color));

        let inner = block.inner(area);
        block.render(area, buf);

        let chunks = Layout::vertical([
            Constraint::Min(1),    // Message
            Constraint::Length(1), // Key hint
        ])
        .split(inner);

        Paragraph::new(Line::from(Span::styled(
            self.message,
            Style::default().fg(self.color),
        )))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[0], buf);

        let hint = Line::from(Span::styled(
            "Press any key",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
        Paragraph::new(hint)
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    }
}
