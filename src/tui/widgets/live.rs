//! Live view: summary cards over the combined price table

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table, Widget},
};

use crate::services::aggregator::{Snapshot, SubscriptionState};
use crate::services::normalizer::{format_change, format_price};
use crate::tui::theme::{symbol_color, Theme};
use crate::types::Symbol;

/// Cards per summary row
pub const CARDS_PER_ROW: usize = 4;
const CARD_HEIGHT: u16 = 4;

/// Summary card rows needed for `count` symbols
pub fn card_rows(count: usize) -> usize {
    count.div_ceil(CARDS_PER_ROW)
}

/// Data for the live display
pub struct LiveData<'a> {
    pub snapshot: &'a Snapshot,
    pub symbols: &'a [Symbol],
    pub states: &'a [(Symbol, Option<SubscriptionState>)],
    pub currency: &'a str,
    pub monitoring: bool,
}

/// Live widget combining status, cards and table
pub struct LiveView<'a> {
    data: LiveData<'a>,
    theme: Theme,
}

impl<'a> LiveView<'a> {
    pub fn new(data: LiveData<'a>, theme: Theme) -> Self {
        Self { data, theme }
    }
}

impl Widget for LiveView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let cards_height = card_rows(self.data.symbols.len()) as u16 * CARD_HEIGHT;
        let error_height = u16::from(self.data.snapshot.error.is_some());

        let chunks = Layout::vertical([
            Constraint::Length(1),             // Status
            Constraint::Length(error_height),  // Error banner
            Constraint::Length(cards_height),  // Summary cards
            Constraint::Min(3),                // Table
        ])
        .split(area);

        self.render_status(chunks[0], buf);
        if let Some(error) = &self.data.snapshot.error {
            let line = Line::from(Span::styled(
                format!(" ! {}", error),
                Style::default()
                    .fg(self.theme.error)
                    .add_modifier(Modifier::BOLD),
            ));
            Paragraph::new(line).render(chunks[1], buf);
        }
        self.render_cards(chunks[2], buf);
        self.render_table(chunks[3], buf);
    }
}

impl LiveView<'_> {
    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let mut spans = vec![Span::styled(
            if self.data.monitoring {
                " ● streaming "
            } else {
                " ○ stopped "
            },
            Style::default().fg(if self.data.monitoring {
                self.theme.up
            } else {
                self.theme.muted
            }),
        )];
        spans.push(Span::styled(
            format!("{}  ", self.data.currency),
            Style::default().fg(self.theme.accent),
        ));

        for (symbol, state) in self.data.states {
            let marker = match state {
                Some(SubscriptionState::Open) => "…",
                Some(SubscriptionState::Delivering) => "✓",
                Some(SubscriptionState::Closed) | None => "×",
            };
            spans.push(Span::styled(
                format!("{}{} ", symbol.ticker(), marker),
                Style::default().fg(self.theme.muted),
            ));
        }

        Paragraph::new(Line::from(spans)).render(area, buf);
    }

    fn render_cards(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let rows = Layout::vertical(vec![
            Constraint::Length(CARD_HEIGHT);
            card_rows(self.data.symbols.len())
        ])
        .split(area);

        for (row_idx, chunk) in self.data.symbols.chunks(CARDS_PER_ROW).enumerate() {
            let Some(row_area) = rows.get(row_idx) else {
                break;
            };
            let cols = Layout::horizontal(vec![
                Constraint::Ratio(1, CARDS_PER_ROW as u32);
                CARDS_PER_ROW
            ])
            .split(*row_area);

            for (symbol, card_area) in chunk.iter().zip(cols.iter()) {
                self.render_card(*symbol, *card_area, buf);
            }
        }
    }

    fn render_card(&self, symbol: Symbol, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.muted))
            .title(Span::styled(
                format!(" {} ", symbol.ticker()),
                Style::default()
                    .fg(symbol_color(symbol))
                    .add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);
        block.render(area, buf);

        // Symbols without any price yet show zero
        let entry = self.data.snapshot.summary.get(&symbol);
        let price = entry.map(|e| e.price).unwrap_or(0.0);
        let change = entry.and_then(|e| e.change_percent);

        let lines = vec![
            Line::from(Span::styled(
                format_price(price),
                Style::default()
                    .fg(self.theme.text)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format_change(change),
                Style::default().fg(self.theme.change_color(change)),
            )),
        ];
        Paragraph::new(lines).render(inner, buf);
    }

    fn render_table(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(self.theme.muted))
            .title(Span::styled(
                " Recent prices ",
                Style::default().fg(self.theme.accent),
            ));

        if self.data.snapshot.table.is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            let text = if self.data.monitoring {
                "No data yet."
            } else {
                "Monitoring stopped. Press 's' to start."
            };
            Paragraph::new(Line::from(Span::styled(
                text,
                Style::default().fg(self.theme.muted),
            )))
            .render(inner, buf);
            return;
        }

        let header = TableRow::new(vec!["Time", "Symbol", "Price", "Change", "Predicted"]).style(
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<TableRow> = self
            .data
            .snapshot
            .table
            .iter()
            .map(|row| {
                TableRow::new(vec![
                    Cell::from(row.time.clone()),
                    Cell::from(Span::styled(
                        row.symbol.ticker(),
                        Style::default().fg(symbol_color(row.symbol)),
                    )),
                    Cell::from(format_price(row.price)),
                    Cell::from(Span::styled(
                        format_change(row.change_percent),
                        Style::default().fg(self.theme.change_color(row.change_percent)),
                    )),
                    Cell::from(
                        row.predicted_price
                            .map(format_price)
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(20),
            Constraint::Length(7),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(16),
        ];

        Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(1)
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::SummaryEntry;
    use crate::types::Row;

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn render(data: LiveData<'_>) -> String {
        let area = Rect::new(0, 0, 100, 24);
        let mut buf = Buffer::empty(area);
        LiveView::new(data, Theme::dark()).render(area, &mut buf);
        buffer_text(&buf)
    }

    #[test]
    fn test_card_rows() {
        assert_eq!(card_rows(0), 0);
        assert_eq!(card_rows(1), 1);
        assert_eq!(card_rows(4), 1);
        assert_eq!(card_rows(5), 2);
        assert_eq!(card_rows(8), 2);
    }

    #[test]
    fn test_renders_cards_and_rows() {
        let mut snapshot = Snapshot::default();
        snapshot.summary.insert(
            Symbol::Btc,
            SummaryEntry {
                price: 64000.0,
                change_percent: Some(5.0),
            },
        );
        snapshot.table.push(Row {
            time: "2024-05-01 10:00:00".into(),
            symbol: Symbol::Btc,
            price: 64000.0,
            change_percent: Some(5.0),
            predicted_price: Some(64100.0),
        });
        let symbols = [Symbol::Btc, Symbol::Eth];
        let states = [
            (Symbol::Btc, Some(SubscriptionState::Delivering)),
            (Symbol::Eth, Some(SubscriptionState::Open)),
        ];

        let text = render(LiveData {
            snapshot: &snapshot,
            symbols: &symbols,
            states: &states,
            currency: "USD",
            monitoring: true,
        });

        assert!(text.contains("BTC"));
        assert!(text.contains("64,000.00"));
        assert!(text.contains("+5.00%"));
        assert!(text.contains("64,100.00"));
        assert!(text.contains("2024-05-01 10:00:00"));
        // ETH has no price yet
        assert!(text.contains("0.00"));
        assert!(text.contains("N/A"));
        assert!(text.contains("streaming"));
    }

    #[test]
    fn test_empty_table_messages() {
        let snapshot = Snapshot::default();
        let symbols = [Symbol::Btc];
        let states = [(Symbol::Btc, None)];

        let text = render(LiveData {
            snapshot: &snapshot,
            symbols: &symbols,
            states: &states,
            currency: "USD",
            monitoring: true,
        });
        assert!(text.contains("No data yet."));

        let text = render(LiveData {
            snapshot: &snapshot,
            symbols: &symbols,
            states: &states,
            currency: "USD",
            monitoring: false,
        });
        assert!(text.contains("Press 's' to start."));
        assert!(text.contains("stopped"));
    }

    #[test]
    fn test_error_banner() {
        let snapshot = Snapshot {
            error: Some("Invalid data received from server".into()),
            ..Snapshot::default()
        };
        let symbols = [Symbol::Btc];
        let states = [(Symbol::Btc, Some(SubscriptionState::Delivering))];

        let text = render(LiveData {
            snapshot: &snapshot,
            symbols: &symbols,
            states: &states,
            currency: "USD",
            monitoring: true,
        });
        assert!(text.contains("Invalid data received from server"));
    }
}
