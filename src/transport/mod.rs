// Transport seam between the connection manager and the wire
//
// The manager only needs two things from a transport: open a connection to a
// URL, and read inbound text frames until the peer goes away. Keeping that
// behind a trait lets the reconnect logic run against a scripted transport in
// tests.

#[cfg(test)]
pub(crate) mod scripted;
mod websocket;

use crate::types::{FeedError, FeedResult};
use async_trait::async_trait;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

pub use websocket::{WebSocketFrameStream, WebSocketTransport};

/// Opens push connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a connection to `url`
    async fn connect(&self, url: &str) -> FeedResult<Box<dyn FrameStream>>;
}

/// Inbound side of an open connection
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound application frame.
    ///
    /// `None` means the connection is closed; `Some(Err(_))` is a transport
    /// failure and the connection should be treated as broken.
    async fn next_frame(&mut self) -> Option<FeedResult<String>>;

    /// Close the connection. Safe to call on an already closed stream.
    async fn close(&mut self) -> FeedResult<()>;
}

/// Check that `url` is a usable WebSocket endpoint
pub fn validate_url(url: &str) -> FeedResult<()> {
    let url = url.trim();
    let rest = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))
        .ok_or_else(|| {
            FeedError::InvalidConfig(format!("endpoint must use ws:// or wss://: {url:?}"))
        })?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(FeedError::InvalidConfig(format!(
            "endpoint has no host: {url:?}"
        )));
    }

    url.into_client_request()
        .map(|_| ())
        .map_err(|e| FeedError::InvalidConfig(format!("invalid endpoint {url:?}: {e}")))
}
