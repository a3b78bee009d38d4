// Connection manager for the live metrics feed
//
// Owns at most one push connection to the configured endpoint and keeps it
// alive: a dropped or failed connection is retried after the policy delay
// until the attempt budget is spent. The manager exposes the current status,
// the consecutive reconnect attempt count and the latest decoded sample, and
// streams every change as a `FeedEvent`.
//
// Lifecycle:
// - `start` spawns a session task and returns its event receiver
// - `stop` cancels the session (pending timer, open connection) immediately
// - `shutdown` stops and waits for the session task to finish

pub mod policy;
mod session;

use crate::transport::{validate_url, Transport, WebSocketTransport};
use crate::types::{ConnectionStatus, FeedEvent, FeedResult, Sample};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use policy::{Backoff, ReconnectPolicy};
use session::Session;

/// Observable state of the manager
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Consecutive reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
    pub last_sample: Option<Sample>,
    pub samples_received: u64,
    pub decode_failures: u64,
}

pub(crate) struct SharedState {
    /// Identifies the session allowed to write `state`
    generation: u64,
    state: ConnectionState,
}

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    shared: Arc<RwLock<SharedState>>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
    events: Option<mpsc::WeakUnboundedSender<FeedEvent>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            shared: Arc::new(RwLock::new(SharedState {
                generation: 0,
                state: ConnectionState::default(),
            })),
            cancel_token: CancellationToken::new(),
            task: None,
            events: None,
        }
    }

    /// Manager backed by the WebSocket transport
    pub fn websocket() -> Self {
        Self::new(Arc::new(WebSocketTransport::new()))
    }

    /// Begin connecting to `url`, replacing any running session.
    ///
    /// The attempt counter starts from zero. Events for this session arrive on
    /// the returned receiver, which closes when the session ends.
    pub fn start(
        &mut self,
        url: &str,
        policy: ReconnectPolicy,
    ) -> FeedResult<mpsc::UnboundedReceiver<FeedEvent>> {
        let url = url.trim();
        validate_url(url)?;

        self.stop();

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let generation = {
            let mut shared = self.shared.write();
            shared.generation += 1;
            shared.state.status = ConnectionStatus::Connecting;
            shared.state.reconnect_attempts = 0;
            let _ = tx.send(FeedEvent::StatusChanged {
                status: ConnectionStatus::Connecting,
                reconnect_attempts: 0,
            });
            shared.generation
        };

        info!(
            url,
            delay_ms = policy.delay.as_millis() as u64,
            max_attempts = policy.max_attempts,
            "Starting metrics feed"
        );

        let session = Session {
            generation,
            url: url.to_string(),
            policy,
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            cancel_token: cancel_token.clone(),
            events: tx.clone(),
        };

        self.events = Some(tx.downgrade());
        self.cancel_token = cancel_token;
        self.task = Some(tokio::spawn(session.run()));

        Ok(rx)
    }

    /// Tear down the current session.
    ///
    /// Cancels a pending reconnect, closes an open connection and prevents any
    /// further automatic reconnect. Safe to call at any time.
    pub fn stop(&mut self) {
        {
            let mut shared = self.shared.write();
            shared.generation += 1;
            shared.state.status = ConnectionStatus::Disconnected;

            if let Some(events) = self.events.take().and_then(|weak| weak.upgrade()) {
                let _ = events.send(FeedEvent::StatusChanged {
                    status: ConnectionStatus::Disconnected,
                    reconnect_attempts: shared.state.reconnect_attempts,
                });
            }
        }

        self.cancel_token.cancel();

        if self.is_active() {
            info!("Metrics feed stopped");
        }
    }

    /// Stop and wait for the session task to exit
    pub async fn shutdown(&mut self) {
        self.stop();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Feed session task failed");
            }
        }
    }

    /// Whether a session task is still running
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.read().state.status
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.read().state.reconnect_attempts
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.shared.read().state.last_sample.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.read().state.clone()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
