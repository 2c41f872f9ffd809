//! Live multi-stream aggregation
//!
//! Owns one push subscription per tracked symbol, folds incoming ticks into
//! per-symbol state, and exposes a bounded, deduplicated, time-ordered view
//! across all symbols.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::parsers::{parse_tick_message, parse_time, TickMessage};
use crate::types::{FeedError, Result, Row, Symbol, Tick};

/// Maximum rows kept per symbol
pub const HISTORY_LIMIT: usize = 40;

/// Maximum rows in the combined table
pub const TABLE_LIMIT: usize = 40;

/// Event delivered by a transport on behalf of one subscription
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Message {
        symbol: Symbol,
        generation: u64,
        payload: Vec<u8>,
    },
    /// The transport dropped a message it could not frame
    Malformed { symbol: Symbol, generation: u64 },
    Disconnected {
        symbol: Symbol,
        generation: u64,
        reason: String,
    },
}

/// Sending side handed to a transport when a subscription is opened
#[derive(Debug, Clone)]
pub struct FeedSink {
    symbol: Symbol,
    generation: u64,
    tx: UnboundedSender<FeedEvent>,
}

impl FeedSink {
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Forward a raw payload; false once the aggregator is gone
    pub fn message(&self, payload: Vec<u8>) -> bool {
        self.tx
            .send(FeedEvent::Message {
                symbol: self.symbol,
                generation: self.generation,
                payload,
            })
            .is_ok()
    }

    /// Report a message dropped before it could be parsed
    pub fn malformed(&self) -> bool {
        self.tx
            .send(FeedEvent::Malformed {
                symbol: self.symbol,
                generation: self.generation,
            })
            .is_ok()
    }

    /// Report that the connection is gone
    pub fn disconnected(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(FeedEvent::Disconnected {
                symbol: self.symbol,
                generation: self.generation,
                reason: reason.into(),
            })
            .is_ok()
    }
}

/// An open streaming connection
pub trait StreamHandle {
    /// Release the connection. Must be idempotent.
    fn close(&mut self);
}

/// Opens push subscriptions
pub trait Connector {
    type Handle: StreamHandle;

    fn connect(&self, symbol: Symbol, currency: &str, sink: FeedSink) -> Result<Self::Handle>;
}

/// Subscription lifecycle: `Open -> Delivering -> Closed`, or `Open -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubscriptionState {
    Open,
    Delivering,
    Closed,
}

struct Subscription<H: StreamHandle> {
    state: SubscriptionState,
    handle: Option<H>,
}

impl<H: StreamHandle> Subscription<H> {
    fn open(handle: H) -> Self {
        Self {
            state: SubscriptionState::Open,
            handle: Some(handle),
        }
    }

    fn failed() -> Self {
        Self {
            state: SubscriptionState::Closed,
            handle: None,
        }
    }

    fn is_live(&self) -> bool {
        self.state != SubscriptionState::Closed
    }

    fn mark_delivering(&mut self) {
        if self.state == SubscriptionState::Open {
            self.state = SubscriptionState::Delivering;
        }
    }

    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.state = SubscriptionState::Closed;
    }
}

/// Per-symbol derived state
#[derive(Debug, Clone, Default)]
struct SymbolState {
    /// Newest first
    history: VecDeque<Row>,
    /// Most recent accepted price; the base for the next change
    last_price: Option<f64>,
    last_change: Option<f64>,
    /// Summary reads 0 / N/A until the next accepted tick
    price_reset: bool,
    /// Batch-refresh price shown while no tick price is on display
    quote: Option<f64>,
}

impl SymbolState {
    fn reset_summary(&mut self) {
        self.price_reset = true;
        self.last_change = None;
        self.quote = None;
    }

    fn awaiting_tick(&self) -> bool {
        self.last_price.is_none() || self.price_reset
    }

    fn summary(&self) -> SummaryEntry {
        match self.last_price {
            Some(price) if !self.price_reset => SummaryEntry {
                price,
                change_percent: self.last_change,
            },
            _ => SummaryEntry {
                price: self.quote.unwrap_or(0.0),
                change_percent: None,
            },
        }
    }
}

/// Quick-glance price and change for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub price: f64,
    pub change_percent: Option<f64>,
}

/// Consistent view handed to the renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub summary: BTreeMap<Symbol, SummaryEntry>,
    pub table: Vec<Row>,
    pub error: Option<String>,
}

/// Live aggregator over one subscription per symbol
pub struct LiveAggregator<C: Connector> {
    connector: C,
    currency: String,
    states: BTreeMap<Symbol, SymbolState>,
    subscriptions: BTreeMap<Symbol, Subscription<C::Handle>>,
    error: Option<FeedError>,
    generation: u64,
    started: bool,
    tx: UnboundedSender<FeedEvent>,
    rx: UnboundedReceiver<FeedEvent>,
}

impl<C: Connector> LiveAggregator<C> {
    pub fn new(connector: C, currency: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            connector,
            currency: currency.into(),
            states: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            error: None,
            generation: 0,
            started: false,
            tx,
            rx,
        }
    }

    /// Open one subscription per symbol, discarding all prior state
    pub fn start(&mut self, symbols: impl IntoIterator<Item = Symbol>) {
        self.stop();

        self.states.clear();
        self.subscriptions.clear();
        self.error = None;
        self.generation += 1;
        // Anything still queued belongs to the previous generation
        while self.rx.try_recv().is_ok() {}

        let symbols: BTreeSet<Symbol> = symbols.into_iter().collect();
        for symbol in symbols {
            self.states.insert(symbol, SymbolState::default());

            let sink = FeedSink {
                symbol,
                generation: self.generation,
                tx: self.tx.clone(),
            };
            match self.connector.connect(symbol, &self.currency, sink) {
                Ok(handle) => {
                    self.subscriptions.insert(symbol, Subscription::open(handle));
                }
                Err(e) => {
                    self.subscriptions.insert(symbol, Subscription::failed());
                    self.fail_symbol(
                        symbol,
                        FeedError::Transport {
                            symbol,
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        self.started = true;
        info!(
            generation = self.generation,
            symbols = self.states.len(),
            currency = %self.currency,
            "live monitoring started"
        );
    }

    /// Release every open subscription. No-op when not started.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        for subscription in self.subscriptions.values_mut() {
            subscription.close();
        }
        self.started = false;
        info!(generation = self.generation, "live monitoring stopped");
    }

    /// Drain queued transport events, returning how many changed the snapshot
    pub fn pump(&mut self) -> usize {
        let mut updates = 0;
        while let Ok(event) = self.rx.try_recv() {
            if self.handle_event(event) {
                updates += 1;
            }
        }
        updates
    }

    fn handle_event(&mut self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Message {
                symbol,
                generation,
                payload,
            } => generation == self.generation && self.on_tick(symbol, &payload),
            FeedEvent::Malformed { symbol, generation } => {
                generation == self.generation && self.on_malformed(symbol)
            }
            FeedEvent::Disconnected {
                symbol,
                generation,
                reason,
            } => generation == self.generation && self.on_disconnect(symbol, reason),
        }
    }

    /// Apply one push payload for `symbol`. Returns true if the snapshot changed.
    fn on_tick(&mut self, symbol: Symbol, raw: &[u8]) -> bool {
        let Some(subscription) = self.subscriptions.get_mut(&symbol) else {
            return false;
        };
        if !subscription.is_live() {
            return false;
        }
        subscription.mark_delivering();

        match parse_tick_message(symbol, &self.currency, raw) {
            Ok(TickMessage::Tick(tick)) => {
                self.record(tick);
            }
            Ok(TickMessage::Upstream(message)) => {
                self.fail_symbol(symbol, FeedError::Upstream { symbol, message });
            }
            Err(err) => {
                debug!(%symbol, error = %err, "discarding push message");
                self.error = Some(err);
            }
        }
        true
    }

    fn on_malformed(&mut self, symbol: Symbol) -> bool {
        let Some(subscription) = self.subscriptions.get_mut(&symbol) else {
            return false;
        };
        if !subscription.is_live() {
            return false;
        }
        subscription.mark_delivering();
        debug!(%symbol, "discarding oversized push message");
        self.error = Some(FeedError::Parse);
        true
    }

    fn on_disconnect(&mut self, symbol: Symbol, reason: String) -> bool {
        let Some(subscription) = self.subscriptions.get_mut(&symbol) else {
            return false;
        };
        if !subscription.is_live() {
            return false;
        }
        subscription.close();
        self.fail_symbol(symbol, FeedError::Transport { symbol, reason });
        true
    }

    fn record(&mut self, tick: Tick) {
        let Some(state) = self.states.get_mut(&tick.symbol) else {
            return;
        };

        let change = state
            .last_price
            .filter(|prev| *prev != 0.0)
            .map(|prev| (tick.price - prev) / prev * 100.0);

        // Summary follows every observation, even a suppressed row
        state.last_price = Some(tick.price);
        state.last_change = change;
        state.price_reset = false;
        state.quote = None;

        let duplicate = state
            .history
            .front()
            .is_some_and(|row| row.time == tick.time);
        if duplicate {
            return;
        }

        state.history.push_front(Row {
            time: tick.time,
            symbol: tick.symbol,
            price: tick.price,
            change_percent: change,
            predicted_price: tick.predicted_price,
        });
        state.history.truncate(HISTORY_LIMIT);
    }

    fn fail_symbol(&mut self, symbol: Symbol, err: FeedError) {
        warn!(%symbol, error = %err, "live feed error");
        if let Some(state) = self.states.get_mut(&symbol) {
            state.reset_summary();
        }
        self.error = Some(err);
    }

    /// Fill summary prices from a batch quote for live symbols with no
    /// price on display. History and change tracking are untouched.
    pub fn apply_quotes(&mut self, prices: &HashMap<Symbol, f64>) -> bool {
        let mut changed = false;
        for (symbol, state) in self.states.iter_mut() {
            let live = self
                .subscriptions
                .get(symbol)
                .is_some_and(|s| s.is_live());
            if !live || !state.awaiting_tick() {
                continue;
            }
            if let Some(price) = prices.get(symbol).copied().filter(|p| p.is_finite()) {
                state.quote = Some(price);
                changed = true;
            }
        }
        changed
    }

    /// Current summary, combined table, and error state
    pub fn snapshot(&self) -> Snapshot {
        let summary = self
            .states
            .iter()
            .map(|(symbol, state)| (*symbol, state.summary()))
            .collect();

        Snapshot {
            summary,
            table: combined_table(self.states.values().map(|s| &s.history)),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }

    pub fn error(&self) -> Option<&FeedError> {
        self.error.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn subscription_state(&self, symbol: Symbol) -> Option<SubscriptionState> {
        self.subscriptions.get(&symbol).map(|s| s.state)
    }

    pub fn history_len(&self, symbol: Symbol) -> usize {
        self.states.get(&symbol).map_or(0, |s| s.history.len())
    }

    pub fn last_price(&self, symbol: Symbol) -> Option<f64> {
        self.states.get(&symbol).and_then(|s| s.last_price)
    }
}

impl<C: Connector> Drop for LiveAggregator<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Merge per-symbol histories: time descending, then ticker, then arrival.
/// Labels that do not read as dates sort after all dated rows.
fn combined_table<'a>(histories: impl Iterator<Item = &'a VecDeque<Row>>) -> Vec<Row> {
    let mut rows: Vec<(Option<NaiveDateTime>, &Row)> = histories
        .flatten()
        .map(|row| (parse_time(&row.time), row))
        .collect();

    rows.sort_by(|(ta, a), (tb, b)| {
        let by_time = match (ta, tb) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| a.symbol.ticker().cmp(b.symbol.ticker()))
    });

    rows.into_iter()
        .take(TABLE_LIMIT)
        .map(|(_, row)| row.clone())
        .collect()
}
