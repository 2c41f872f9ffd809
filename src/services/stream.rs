//! Server-Sent-Events transport for live prices

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Url;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use super::aggregator::{Connector, FeedSink, StreamHandle};
use crate::parsers::{SseDecoder, SseEvent};
use crate::types::{CoinpulseError, Result, Symbol};

/// Opens one `/stream_realtime` connection per symbol on a tokio runtime
pub struct SseConnector {
    client: reqwest::Client,
    base_url: String,
    runtime: Handle,
}

impl SseConnector {
    pub fn new(base_url: &str, connect_timeout: Duration, runtime: Handle) -> Result<Self> {
        // No overall timeout: the body is open-ended
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            runtime,
        })
    }

    fn stream_url(&self, symbol: Symbol, currency: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/stream_realtime", self.base_url),
            &[("symbol", symbol.ticker()), ("currency", currency)],
        )
        .map_err(|e| CoinpulseError::Config(format!("Invalid API URL '{}': {}", self.base_url, e)))
    }
}

/// Running stream task; closing aborts it and drops the connection
pub struct SseHandle {
    task: AbortHandle,
}

impl StreamHandle for SseHandle {
    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for SseHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Connector for SseConnector {
    type Handle = SseHandle;

    fn connect(&self, symbol: Symbol, currency: &str, sink: FeedSink) -> Result<SseHandle> {
        let url = self.stream_url(symbol, currency)?;
        let client = self.client.clone();
        info!(%symbol, %url, "opening live stream");

        let task = self.runtime.spawn(async move {
            let reason = match pump_stream(client, url, &sink).await {
                Ok(()) => "stream closed by server".to_string(),
                Err(e) => e.to_string(),
            };
            debug!(symbol = %sink.symbol(), %reason, "live stream ended");
            sink.disconnected(reason);
        });

        Ok(SseHandle {
            task: task.abort_handle(),
        })
    }
}

async fn pump_stream(client: reqwest::Client, url: Url, sink: &FeedSink) -> Result<()> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?
        .error_for_status()?;

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            let delivered = match event {
                SseEvent::Data(payload) => sink.message(payload),
                SseEvent::Oversized => sink.malformed(),
            };
            if !delivered {
                // Aggregator dropped
                return Ok(());
            }
        }
    }
    if decoder.finish() {
        debug!(symbol = %sink.symbol(), "dropping unterminated event at end of stream");
    }
    Ok(())
}
