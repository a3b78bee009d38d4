// Live feed - wires the connection manager to the sample window
//
// The feed starts the manager, drains its event channel in a single pump task
// and appends every sample to the window in the order it was emitted.
// Presentation reads `FeedView` snapshots and never mutates the feed.

use crate::config::FeedConfig;
use crate::connection::ConnectionManager;
use crate::transport::{Transport, WebSocketTransport};
use crate::types::{ConnectionStatus, FeedEvent, FeedResult, Sample};
use crate::window::{SlidingWindow, WindowMetrics};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type EventCallback = Arc<RwLock<Option<Box<dyn Fn(&FeedEvent) + Send + Sync>>>>;

/// Point-in-time view handed to presentation
#[derive(Debug, Clone, Serialize)]
pub struct FeedView {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    /// Window contents, oldest first
    pub samples: Vec<Sample>,
    pub latest: Option<Sample>,
    /// Latest sample carries the alarm flag
    pub alarm_active: bool,
    pub has_scores: bool,
    pub window: WindowMetrics,
}

pub struct LiveFeed {
    config: FeedConfig,
    manager: ConnectionManager,
    window: Arc<SlidingWindow<Sample>>,
    pump: Option<JoinHandle<()>>,
    event_callback: EventCallback,
}

impl LiveFeed {
    pub fn new(config: FeedConfig, transport: Arc<dyn Transport>) -> FeedResult<Self> {
        let window = Arc::new(SlidingWindow::new(config.window_capacity)?);

        Ok(Self {
            config,
            manager: ConnectionManager::new(transport),
            window,
            pump: None,
            event_callback: Arc::new(RwLock::new(None)),
        })
    }

    /// Feed reading from the configured WebSocket endpoint
    pub fn websocket(config: FeedConfig) -> FeedResult<Self> {
        Self::new(config, Arc::new(WebSocketTransport::new()))
    }

    /// Observe every event after the window has been updated for it
    pub fn set_event_callback<F>(&self, callback: F)
    where
        F: Fn(&FeedEvent) + Send + Sync + 'static,
    {
        *self.event_callback.write() = Some(Box::new(callback));
    }

    /// Connect and start filling the window. Restarts a running feed.
    pub fn start(&mut self) -> FeedResult<()> {
        let mut events = self
            .manager
            .start(&self.config.url, self.config.reconnect)?;

        if let Some(previous) = self.pump.take() {
            previous.abort();
        }

        let window = Arc::clone(&self.window);
        let event_callback = Arc::clone(&self.event_callback);

        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let FeedEvent::Sample(sample) = &event {
                    window.append(sample.clone());
                }

                if let Some(callback) = event_callback.read().as_ref() {
                    callback(&event);
                }
            }

            debug!("Feed event pump finished");
        }));

        Ok(())
    }

    /// Stop the connection; no further reconnects happen
    pub fn stop(&mut self) {
        self.manager.stop();
    }

    /// Stop and wait until every pending event has been applied
    pub async fn shutdown(&mut self) {
        self.manager.shutdown().await;
        self.closed().await;
    }

    /// Wait until the current session ends (stopped or out of retries)
    pub async fn closed(&mut self) {
        if let Some(pump) = self.pump.as_mut() {
            if let Err(e) = pump.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Feed event pump failed");
                }
            }
            self.pump = None;
        }
    }

    pub fn view(&self) -> FeedView {
        let state = self.manager.state();
        let latest = self.window.latest();

        FeedView {
            status: state.status,
            reconnect_attempts: state.reconnect_attempts,
            samples: self.window.snapshot(),
            alarm_active: latest.as_ref().is_some_and(Sample::is_alarm),
            has_scores: latest.as_ref().is_some_and(Sample::has_scores),
            latest,
            window: self.window.metrics(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.manager.reconnect_attempts()
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.window.snapshot()
    }

    /// Drop everything in the window
    pub fn clear(&self) {
        self.window.clear();
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}
