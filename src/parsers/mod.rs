//! Push-channel wire decoding

pub mod sse;
pub mod tick;

pub use sse::{SseDecoder, SseEvent};
pub use tick::{parse_tick_message, parse_time, TickMessage};
