// One connect/read/retry lifetime of the connection manager
//
// All lifecycle handlers (open, frame, error, close, timer fired) run as
// sequential steps of the single session task. Every state write is checked
// against the session generation under the state lock, so a session that was
// stopped or superseded can never touch the shared state again, even when its
// reconnect timer already fired.

use super::{policy::ReconnectPolicy, ConnectionState, SharedState};
use crate::transport::{FrameStream, Transport};
use crate::types::{ConnectionStatus, FeedEvent, Sample};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

enum ReadOutcome {
    Closed,
    Cancelled,
}

pub(super) struct Session {
    pub(super) generation: u64,
    pub(super) url: String,
    pub(super) policy: ReconnectPolicy,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) shared: Arc<RwLock<SharedState>>,
    pub(super) cancel_token: CancellationToken,
    pub(super) events: mpsc::UnboundedSender<FeedEvent>,
}

impl Session {
    pub(super) async fn run(self) {
        loop {
            let connected = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                result = self.transport.connect(&self.url) => result,
            };

            match connected {
                Ok(mut stream) => {
                    if !self.on_open() {
                        let _ = stream.close().await;
                        break;
                    }
                    if let ReadOutcome::Cancelled = self.read_frames(stream).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Connection failed");
                    if !self.set_status(ConnectionStatus::Error) {
                        break;
                    }
                }
            }

            if !self.set_status(ConnectionStatus::Disconnected) {
                break;
            }

            let Some(attempts) = self.reconnect_attempts() else {
                break;
            };

            if attempts >= self.policy.max_attempts {
                warn!(
                    url = %self.url,
                    attempts,
                    "Reconnect attempts exhausted, staying disconnected"
                );
                self.apply(|_| FeedEvent::ReconnectsExhausted { attempts });
                break;
            }

            let attempt = attempts + 1;
            let delay = self.policy.delay_for(attempt);
            info!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnect"
            );
            if !self.apply(|_| FeedEvent::ReconnectScheduled { attempt, delay }) {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            // The timer may have fired concurrently with stop() or a restart
            if !self.begin_retry() {
                break;
            }
        }

        debug!(generation = self.generation, "Feed session ended");
    }

    async fn read_frames(&self, mut stream: Box<dyn FrameStream>) -> ReadOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => None,
                frame = stream.next_frame() => Some(frame),
            };

            let Some(frame) = next else {
                if let Err(e) = stream.close().await {
                    debug!(error = %e, "Close after stop failed");
                }
                return ReadOutcome::Cancelled;
            };

            match frame {
                Some(Ok(text)) => self.on_frame(&text),
                Some(Err(e)) => {
                    error!(url = %self.url, error = %e, "Connection error");
                    self.set_status(ConnectionStatus::Error);
                    let _ = stream.close().await;
                    return ReadOutcome::Closed;
                }
                None => {
                    info!(url = %self.url, "Connection closed");
                    return ReadOutcome::Closed;
                }
            }
        }
    }

    fn on_open(&self) -> bool {
        self.apply(|state| {
            state.status = ConnectionStatus::Connected;
            state.reconnect_attempts = 0;
            FeedEvent::StatusChanged {
                status: state.status,
                reconnect_attempts: 0,
            }
        })
    }

    fn on_frame(&self, text: &str) {
        match Sample::from_json(text) {
            Ok(sample) => {
                self.apply(|state| {
                    state.samples_received += 1;
                    state.last_sample = Some(sample.clone());
                    FeedEvent::Sample(sample)
                });
            }
            Err(e) => {
                warn!(error = %e, len = text.len(), "Discarding malformed frame");
                self.apply(|state| {
                    state.decode_failures += 1;
                    FeedEvent::DecodeFailed {
                        error: e.to_string(),
                    }
                });
            }
        }
    }

    fn begin_retry(&self) -> bool {
        self.apply(|state| {
            state.reconnect_attempts += 1;
            state.status = ConnectionStatus::Connecting;
            FeedEvent::StatusChanged {
                status: state.status,
                reconnect_attempts: state.reconnect_attempts,
            }
        })
    }

    fn set_status(&self, status: ConnectionStatus) -> bool {
        self.apply(|state| {
            state.status = status;
            FeedEvent::StatusChanged {
                status,
                reconnect_attempts: state.reconnect_attempts,
            }
        })
    }

    fn reconnect_attempts(&self) -> Option<u32> {
        let shared = self.shared.read();
        (shared.generation == self.generation).then_some(shared.state.reconnect_attempts)
    }

    /// Mutate the shared state and emit the resulting event, but only while
    /// this session is still the current one. Returns false once superseded.
    fn apply(&self, f: impl FnOnce(&mut ConnectionState) -> FeedEvent) -> bool {
        let mut shared = self.shared.write();
        if shared.generation != self.generation {
            return false;
        }

        let event = f(&mut shared.state);
        // A dropped receiver doesn't stop the session; state stays observable
        let _ = self.events.send(event);
        true
    }
}
