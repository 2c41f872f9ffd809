//! Services for live aggregation, backend access and local state

pub mod aggregator;
pub mod api;
pub mod normalizer;
pub mod series;
pub mod session;
pub mod stream;

pub use aggregator::{LiveAggregator, Snapshot, SummaryEntry};
pub use api::ApiClient;
pub use session::SessionStore;
pub use stream::SseConnector;
