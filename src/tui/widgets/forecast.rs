//! Forecast view: actual vs predicted line chart with error metrics

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget},
};

use crate::services::normalizer::format_price;
use crate::services::series::{chart_coords, ChartPoint};
use crate::tui::theme::{symbol_color, Theme};
use crate::types::{ForecastMetrics, ForecastModel, Symbol};

/// Y range covering both series, padded by 5% (or 1.0 for a flat line)
pub fn y_bounds(points: &[ChartPoint]) -> Option<[f64; 2]> {
    let values = points
        .iter()
        .flat_map(|p| p.actual.into_iter().chain(p.predicted))
        .filter(|v| v.is_finite());

    let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;

    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    Some([min - pad, max + pad])
}

/// Forecast panel parameters and results
pub struct ForecastData<'a> {
    pub model: ForecastModel,
    pub symbol: Symbol,
    pub steps: u32,
    pub currency: &'a str,
    pub points: &'a [ChartPoint],
    pub metrics: Option<&'a ForecastMetrics>,
}

pub struct ForecastPanel<'a> {
    data: ForecastData<'a>,
    theme: Theme,
}

impl<'a> ForecastPanel<'a> {
    pub fn new(data: ForecastData<'a>, theme: Theme) -> Self {
        Self { data, theme }
    }
}

impl Widget for ForecastPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::vertical([
            Constraint::Length(1), // Parameters
            Constraint::Min(5),    // Chart
            Constraint::Length(1), // Metrics
        ])
        .split(area);

        self.render_params(chunks[0], buf);
        self.render_chart(chunks[1], buf);
        self.render_metrics(chunks[2], buf);
    }
}

impl ForecastPanel<'_> {
    fn render_params(&self, area: Rect, buf: &mut Buffer) {
        let label = Style::default().fg(self.theme.muted);
        let value = Style::default()
            .fg(self.theme.accent)
            .add_modifier(Modifier::BOLD);

        let line = Line::from(vec![
            Span::styled(" Model ", label),
            Span::styled(self.data.model.label(), value),
            Span::styled("  Symbol ", label),
            Span::styled(
                self.data.symbol.ticker(),
                Style::default()
                    .fg(symbol_color(self.data.symbol))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Steps ", label),
            Span::styled(self.data.steps.to_string(), value),
            Span::styled("  Currency ", label),
            Span::styled(self.data.currency, value),
        ]);
        Paragraph::new(line).render(area, buf);
    }

    fn render_chart(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.muted))
            .title(Span::styled(
                " Actual vs predicted ",
                Style::default().fg(self.theme.accent),
            ));

        let Some([y_min, y_max]) = y_bounds(self.data.points) else {
            let inner = block.inner(area);
            block.render(area, buf);
            Paragraph::new(Line::from(Span::styled(
                "No forecast yet. Press Enter to run one.",
                Style::default().fg(self.theme.muted),
            )))
            .render(inner, buf);
            return;
        };

        let (actual, predicted) = chart_coords(self.data.points);
        let x_max = self.data.points.len().saturating_sub(1).max(1) as f64;

        let datasets = vec![
            Dataset::default()
                .name("Actual")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(symbol_color(self.data.symbol)))
                .data(&actual),
            Dataset::default()
                .name("Predicted")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(self.theme.accent))
                .data(&predicted),
        ];

        let first = self.data.points.first().map(|p| p.time.as_str()).unwrap_or("");
        let last = self.data.points.last().map(|p| p.time.as_str()).unwrap_or("");

        let axis_style = Style::default().fg(self.theme.muted);
        Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .style(axis_style)
                    .bounds([0.0, x_max])
                    .labels([first.to_string(), last.to_string()]),
            )
            .y_axis(
                Axis::default()
                    .style(axis_style)
                    .bounds([y_min, y_max])
                    .labels([format_price(y_min), format_price(y_max)]),
            )
            .render(area, buf);
    }

    fn render_metrics(&self, area: Rect, buf: &mut Buffer) {
        let Some(m) = self.data.metrics else {
            return;
        };
        let label = Style::default().fg(self.theme.muted);
        let value = Style::default().fg(self.theme.text);

        let mut spans = Vec::new();
        for (name, v) in [("RMSE", m.rmse), ("MAE", m.mae), ("MSE", m.mse), ("MdAE", m.mdae)] {
            spans.push(Span::styled(format!(" {} ", name), label));
            let shown = if v.is_finite() {
                format!("{:.4}", v)
            } else {
                "N/A".to_string()
            };
            spans.push(Span::styled(shown, value));
        }
        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}
