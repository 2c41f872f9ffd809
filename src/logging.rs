//! Tracing setup
//!
//! The TUI owns the terminal, so in that mode log lines go to a bounded
//! in-memory store that the footer reads from. Other commands log to stderr.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::io;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "COINPULSE_LOG";

/// One captured event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    /// Message followed by `key=value` fields
    pub text: String,
}

impl LogEntry {
    /// WARN or ERROR
    pub fn is_problem(&self) -> bool {
        self.level <= Level::WARN
    }
}

/// Most recent events, oldest dropped first
pub struct LogStore {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if entry.text.is_empty() {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}

pub type SharedLogStore = Arc<Mutex<LogStore>>;

/// Records every event that passes the filter into a `LogStore`
pub struct StoreLayer {
    store: SharedLogStore,
}

impl StoreLayer {
    pub fn new(store: SharedLogStore) -> Self {
        Self { store }
    }
}

impl<S: Subscriber> Layer<S> for StoreLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut text = EventText::default();
        event.record(&mut text);
        self.store.lock().push(LogEntry {
            level: *event.metadata().level(),
            text: text.finish(),
        });
    }
}

#[derive(Default)]
struct EventText {
    message: String,
    fields: String,
}

impl EventText {
    fn finish(self) -> String {
        let mut text = self.message;
        text.push_str(&self.fields);
        text.trim().to_string()
    }
}

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

fn env_filter() -> Result<EnvFilter, String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    EnvFilter::try_new(filter).map_err(|err| format!("invalid log filter: {err}"))
}

/// Route tracing output into `store` (TUI mode)
pub fn init_for_tui(store: SharedLogStore) -> Result<(), String> {
    tracing_subscriber::registry()
        .with(env_filter()?)
        .with(StoreLayer::new(store))
        .try_init()
        .map_err(|err| format!("failed to install logger: {err}"))
}

/// Route tracing output to stderr (one-shot commands)
pub fn init_for_cli() -> Result<(), String> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(_) => env_filter()?,
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| format!("failed to install logger: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: Level, text: &str) -> LogEntry {
        LogEntry {
            level,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_store_is_bounded() {
        let mut store = LogStore::new(2);
        store.push(entry(Level::INFO, "a"));
        store.push(entry(Level::INFO, "b"));
        store.push(entry(Level::INFO, "c"));
        let texts: Vec<&str> = store.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
        assert_eq!(store.last().map(|e| e.text.as_str()), Some("c"));
    }

    #[test]
    fn test_store_skips_empty_entries() {
        let mut store = LogStore::new(4);
        store.push(entry(Level::WARN, ""));
        assert!(store.last().is_none());
    }

    #[test]
    fn test_problem_levels() {
        assert!(entry(Level::ERROR, "x").is_problem());
        assert!(entry(Level::WARN, "x").is_problem());
        assert!(!entry(Level::INFO, "x").is_problem());
        assert!(!entry(Level::DEBUG, "x").is_problem());
    }

    #[test]
    fn test_layer_captures_message_and_fields() {
        let store: SharedLogStore = Arc::new(Mutex::new(LogStore::new(10)));
        let subscriber = tracing_subscriber::registry().with(StoreLayer::new(store.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(generation = 3, "live monitoring started");
            tracing::warn!(symbol = "BTC", error = %"rate limited", "live feed error");
        });

        let store = store.lock();
        assert_eq!(store.entries.len(), 2);
        assert_eq!(store.entries[0].text, "live monitoring started generation=3");
        assert_eq!(
            store.last(),
            Some(&entry(Level::WARN, "live feed error symbol=BTC error=rate limited"))
        );
    }
}
