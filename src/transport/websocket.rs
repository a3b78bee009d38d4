// WebSocket transport
//
// Connects with tokio-tungstenite and yields inbound text frames. The feed is
// receive-only: nothing is written to the socket apart from the protocol's own
// control frames.

use super::{FrameStream, Transport};
use crate::types::{FeedError, FeedResult};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> FeedResult<Box<dyn FrameStream>> {
        debug!(url, "Opening WebSocket");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| FeedError::Connection(format!("{url}: {e}")))?;

        info!(url, "WebSocket connected");

        Ok(Box::new(WebSocketFrameStream {
            inner: ws_stream,
            closed: false,
        }))
    }
}

pub struct WebSocketFrameStream {
    inner: WsStream,
    closed: bool,
}

#[async_trait]
impl FrameStream for WebSocketFrameStream {
    async fn next_frame(&mut self) -> Option<FeedResult<String>> {
        if self.closed {
            return None;
        }

        while let Some(message) = self.inner.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        warn!(len = data.len(), "Skipping non UTF-8 binary frame");
                    }
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    self.closed = true;
                    return None;
                }
                // Control frames are answered by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Err(e) => {
                    self.closed = true;
                    return Some(Err(FeedError::WebSocket(e.to_string())));
                }
            }
        }

        self.closed = true;
        None
    }

    async fn close(&mut self) -> FeedResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.inner
            .close(None)
            .await
            .map_err(|e| FeedError::WebSocket(e.to_string()))
    }
}
