//! Application state and event loop

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use parking_lot::Mutex;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    DefaultTerminal, Frame,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::logging::{LogStore, SharedLogStore};
use crate::services::aggregator::{Connector, LiveAggregator, Snapshot, SubscriptionState};
use crate::services::series::{merge_series, ChartPoint};
use crate::services::{ApiClient, SseConnector};
use crate::types::{Forecast, ForecastMetrics, ForecastModel, PricePoint, Symbol};

use super::theme::Theme;
use super::widgets::{
    forecast::{ForecastData, ForecastPanel},
    live::{LiveData, LiveView},
    message_popup::MessagePopup,
    spinner::{LoadingStage, Spinner},
    tabs::{Tab, TabBar, TabStatus},
};

/// Forecast horizon bounds for the `+`/`-` keys
pub const MIN_STEPS: u32 = 1;
pub const MAX_STEPS: u32 = 60;

/// TUI startup options
pub struct TuiConfig {
    pub initial_tab: Tab,
    pub config: Config,
    pub token: Option<String>,
    pub log_store: SharedLogStore,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            initial_tab: Tab::default(),
            config: Config::default(),
            token: None,
            log_store: Arc::new(Mutex::new(LogStore::new(200))),
        }
    }
}

/// Results posted back by request threads
pub enum Background {
    Prices(Result<HashMap<Symbol, f64>, String>),
    ForecastStage {
        id: u64,
        stage: LoadingStage,
    },
    Forecast {
        id: u64,
        result: Result<(Vec<PricePoint>, Forecast), String>,
    },
}

/// Forecast tab parameters and last result
struct ForecastState {
    model: ForecastModel,
    symbol: Symbol,
    steps: u32,
    loading: Option<LoadingStage>,
    request_id: u64,
    points: Vec<ChartPoint>,
    metrics: Option<ForecastMetrics>,
}

struct Popup {
    title: String,
    message: String,
}

/// Main application
pub struct App<C: Connector> {
    tab: Tab,
    aggregator: LiveAggregator<C>,
    snapshot: Snapshot,
    symbols: Vec<Symbol>,
    api: Arc<ApiClient>,
    forecast: ForecastState,
    history_limit: u32,
    refresh_interval: Duration,
    last_refresh: Option<Instant>,
    prices_in_flight: bool,
    spinner_frame: usize,
    popup: Option<Popup>,
    log_store: SharedLogStore,
    theme: Theme,
    bg_tx: Sender<Background>,
    bg_rx: Receiver<Background>,
    should_quit: bool,
}

impl<C: Connector> App<C> {
    pub fn new(
        connector: C,
        api: ApiClient,
        config: &Config,
        initial_tab: Tab,
        log_store: SharedLogStore,
        theme: Theme,
    ) -> Self {
        let (bg_tx, bg_rx) = mpsc::channel();
        Self {
            tab: initial_tab,
            aggregator: LiveAggregator::new(connector, config.currency.clone()),
            snapshot: Snapshot::default(),
            symbols: config.symbols.clone(),
            api: Arc::new(api),
            forecast: ForecastState {
                model: ForecastModel::default(),
                symbol: config.symbols.first().copied().unwrap_or(Symbol::Btc),
                steps: config.forecast_steps.clamp(MIN_STEPS, MAX_STEPS),
                loading: None,
                request_id: 0,
                points: Vec::new(),
                metrics: None,
            },
            history_limit: config.history_limit,
            refresh_interval: config.refresh_interval(),
            last_refresh: None,
            prices_in_flight: false,
            spinner_frame: 0,
            popup: None,
            log_store,
            theme,
            bg_tx,
            bg_rx,
            should_quit: false,
        }
    }

    /// (Re)open live subscriptions for every configured symbol
    pub fn start_monitoring(&mut self) {
        self.aggregator.start(self.symbols.iter().copied());
        self.snapshot = self.aggregator.snapshot();
        self.last_refresh = None;
    }

    pub fn stop_monitoring(&mut self) {
        self.aggregator.stop();
        self.snapshot = self.aggregator.snapshot();
    }

    /// Handle keyboard events
    pub fn handle_event(&mut self, event: Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }

        // Any key dismisses the popup
        if self.popup.take().is_some() {
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::Char('s') => self.start_monitoring(),
            KeyCode::Char('x') => self.stop_monitoring(),
            code if self.tab == Tab::Forecast => self.handle_forecast_key(code),
            _ => {}
        }
    }

    fn handle_forecast_key(&mut self, code: KeyCode) {
        if code == KeyCode::Enter {
            self.request_forecast();
            return;
        }
        let f = &mut self.forecast;
        match code {
            KeyCode::Char('m') => f.model = f.model.next(),
            KeyCode::Char('c') => f.symbol = f.symbol.next(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                f.steps = (f.steps + 1).min(MAX_STEPS);
            }
            KeyCode::Char('-') => {
                f.steps = f.steps.saturating_sub(1).max(MIN_STEPS);
            }
            _ => {}
        }
    }

    /// Advance animation, apply arrived data, refresh quotes when due
    pub fn tick(&mut self) {
        self.spinner_frame = Spinner::next_frame(self.spinner_frame);
        self.sync();
    }

    /// One pass of the event loop: a key or resize if one arrived, otherwise
    /// an idle tick. Feed and background results are applied either way.
    pub fn step(&mut self, event: Option<Event>) {
        match event {
            Some(event) => {
                self.handle_event(event);
                self.sync();
            }
            None => self.tick(),
        }
    }

    fn sync(&mut self) {
        self.pump_feed();
        while let Ok(msg) = self.bg_rx.try_recv() {
            self.apply_background(msg);
        }
        if self.refresh_due() {
            self.request_prices();
        }
    }

    /// Apply queued stream events to the snapshot
    pub fn pump_feed(&mut self) -> usize {
        let updates = self.aggregator.pump();
        if updates > 0 {
            self.snapshot = self.aggregator.snapshot();
        }
        updates
    }

    fn refresh_due(&self) -> bool {
        self.aggregator.is_started()
            && !self.prices_in_flight
            && self
                .last_refresh
                .is_none_or(|at| at.elapsed() >= self.refresh_interval)
    }

    fn request_prices(&mut self) {
        self.prices_in_flight = true;
        self.last_refresh = Some(Instant::now());

        let api = Arc::clone(&self.api);
        let tx = self.bg_tx.clone();
        let symbols = self.symbols.clone();
        let currency = self.aggregator.currency().to_string();
        thread::spawn(move || {
            let result = api
                .current_prices(&symbols, &currency)
                .map_err(|e| e.to_string());
            let _ = tx.send(Background::Prices(result));
        });
    }

    fn request_forecast(&mut self) {
        if self.forecast.loading.is_some() {
            return;
        }
        self.forecast.request_id += 1;
        self.forecast.loading = Some(LoadingStage::FetchingHistory);

        let id = self.forecast.request_id;
        let (model, symbol, steps) = (
            self.forecast.model,
            self.forecast.symbol,
            self.forecast.steps,
        );
        let limit = self.history_limit;
        let currency = self.aggregator.currency().to_string();
        let api = Arc::clone(&self.api);
        let tx = self.bg_tx.clone();
        info!(%symbol, model = model.path(), steps, "forecast requested");

        thread::spawn(move || {
            let result = api
                .history(symbol, &currency, limit)
                .and_then(|history| {
                    let _ = tx.send(Background::ForecastStage {
                        id,
                        stage: LoadingStage::Forecasting,
                    });
                    let forecast = api.forecast(model, symbol, &currency, steps)?;
                    Ok((history, forecast))
                })
                .map_err(|e| e.to_string());
            let _ = tx.send(Background::Forecast { id, result });
        });
    }

    pub fn apply_background(&mut self, msg: Background) {
        match msg {
            Background::Prices(result) => {
                self.prices_in_flight = false;
                match result {
                    Ok(prices) => {
                        if self.aggregator.apply_quotes(&prices) {
                            self.snapshot = self.aggregator.snapshot();
                        }
                    }
                    Err(e) => warn!(error = %e, "price refresh failed"),
                }
            }
            Background::ForecastStage { id, stage } => {
                if id == self.forecast.request_id && self.forecast.loading.is_some() {
                    self.forecast.loading = Some(stage);
                }
            }
            Background::Forecast { id, result } => {
                if id != self.forecast.request_id {
                    return;
                }
                self.forecast.loading = None;
                match result {
                    Ok((history, forecast)) => {
                        self.forecast.points = merge_series(&history, &forecast.predictions);
                        self.forecast.metrics = forecast.metrics;
                    }
                    Err(e) => {
                        warn!(error = %e, "forecast failed");
                        self.popup = Some(Popup {
                            title: "Forecast failed".to_string(),
                            message: e,
                        });
                    }
                }
            }
        }
    }

    /// Check if app should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Draw the application
    pub fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn subscription_states(&self) -> Vec<(Symbol, Option<SubscriptionState>)> {
        self.symbols
            .iter()
            .map(|s| (*s, self.aggregator.subscription_state(*s)))
            .collect()
    }

    fn tab_status(&self) -> TabStatus {
        let streams = self.aggregator.is_started().then(|| {
            let open = self
                .symbols
                .iter()
                .filter(|s| {
                    matches!(
                        self.aggregator.subscription_state(**s),
                        Some(SubscriptionState::Open | SubscriptionState::Delivering)
                    )
                })
                .count();
            (open, self.symbols.len())
        });
        TabStatus {
            streams,
            forecast_spinner: self
                .forecast
                .loading
                .map(|stage| Spinner::new(self.spinner_frame, stage).current_char()),
        }
    }

    fn render_footer(&self, area: Rect, buf: &mut Buffer) {
        let key = Style::default()
            .fg(self.theme.muted)
            .add_modifier(Modifier::BOLD);
        let text = Style::default().fg(self.theme.muted);

        let mut hints = vec![
            Span::styled(" q", key),
            Span::styled(" quit  ", text),
            Span::styled("Tab", key),
            Span::styled(" switch  ", text),
            Span::styled("s", key),
            Span::styled(" start  ", text),
            Span::styled("x", key),
            Span::styled(" stop  ", text),
        ];
        if self.tab == Tab::Forecast {
            hints.extend([
                Span::styled("m", key),
                Span::styled(" model  ", text),
                Span::styled("c", key),
                Span::styled(" coin  ", text),
                Span::styled("+/-", key),
                Span::styled(" steps  ", text),
                Span::styled("Enter", key),
                Span::styled(" run", text),
            ]);
        }
        if self.prices_in_flight {
            let stage = LoadingStage::RefreshingPrices;
            let spinner = Spinner::new(self.spinner_frame, stage);
            hints.push(Span::styled(
                format!("  {} {}", spinner.current_char(), stage.message()),
                Style::default().fg(self.theme.accent),
            ));
        }

        let log_line = match self.log_store.lock().last() {
            Some(entry) => {
                let color = if entry.is_problem() {
                    self.theme.error
                } else {
                    self.theme.muted
                };
                Line::from(Span::styled(
                    format!(" {} {}", entry.level, entry.text),
                    Style::default().fg(color),
                ))
            }
            None => Line::default(),
        };

        Paragraph::new(vec![Line::from(hints), log_line])
        .render(area, buf);
    }
}

impl<C: Connector> Widget for &App<C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::vertical([
            Constraint::Length(1), // Tabs
            Constraint::Min(5),    // Body
            Constraint::Length(2), // Footer
        ])
        .split(area);

        TabBar::new(self.tab, self.tab_status(), self.theme).render(chunks[0], buf);

        match self.tab {
            Tab::Live => {
                let states = self.subscription_states();
                LiveView::new(
                    LiveData {
                        snapshot: &self.snapshot,
                        symbols: &self.symbols,
                        states: &states,
                        currency: self.aggregator.currency(),
                        monitoring: self.aggregator.is_started(),
                    },
                    self.theme,
                )
                .render(chunks[1], buf);
            }
            Tab::Forecast => match self.forecast.loading {
                Some(stage) => Spinner::new(self.spinner_frame, stage)
                    .theme(self.theme)
                    .render(chunks[1], buf),
                None => ForecastPanel::new(
                    ForecastData {
                        model: self.forecast.model,
                        symbol: self.forecast.symbol,
                        steps: self.forecast.steps,
                        currency: self.aggregator.currency(),
                        points: &self.forecast.points,
                        metrics: self.forecast.metrics.as_ref(),
                    },
                    self.theme,
                )
                .render(chunks[1], buf),
            },
        }

        self.render_footer(chunks[2], buf);

        if let Some(popup) = &self.popup {
            MessagePopup::new(&popup.title, &popup.message, self.theme.error)
                .render(MessagePopup::centered_area(area), buf);
        }
    }
}

/// Run the TUI application
pub fn run(config: TuiConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let settings = &config.config;
    let connector = SseConnector::new(
        &settings.api_url,
        settings.request_timeout(),
        runtime.handle().clone(),
    )?;
    let api = ApiClient::new(&settings.api_url, settings.request_timeout(), settings.retries)?
        .with_token(config.token.clone());

    let mut app = App::new(
        connector,
        api,
        settings,
        config.initial_tab,
        config.log_store.clone(),
        Theme::detect(),
    );
    app.start_monitoring();

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut app);
    ratatui::restore();

    // Close streams before the runtime goes away
    drop(app);
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}

fn run_app<C: Connector>(terminal: &mut DefaultTerminal, app: &mut App<C>) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| app.draw(frame))?;

        if app.should_quit() {
            break;
        }

        // Poll for events with 100ms timeout for spinner animation
        let event = if event::poll(Duration::from_millis(100))? {
            Some(event::read()?)
        } else {
            None
        };
        app.step(event);
    }

    Ok(())
}
