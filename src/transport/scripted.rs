// Scripted transport for exercising the connection lifecycle in tests

use super::{FrameStream, Transport};
use crate::types::{FeedError, FeedResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outcome of one `connect` call
pub(crate) enum Plan {
    /// Connection refused
    Refuse,
    /// Connection opens, delivers these frames, then the peer closes
    Frames(Vec<Frame>),
    /// Connection opens and stays open until the sender is dropped
    Held(mpsc::UnboundedReceiver<Frame>),
}

pub(crate) enum Frame {
    Text(String),
    Error(String),
}

impl Frame {
    pub(crate) fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Plays back a queue of connect outcomes; refuses once the queue is empty
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    plans: Mutex<VecDeque<Plan>>,
    connects: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub(crate) fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into_iter().collect()),
            ..Default::default()
        }
    }

    pub(crate) fn push(&self, plan: Plan) {
        self.plans.lock().push_back(plan);
    }

    /// Number of `connect` calls so far
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of streams closed from the client side
    pub(crate) fn client_closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, url: &str) -> FeedResult<Box<dyn FrameStream>> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let plan = self.plans.lock().pop_front().unwrap_or(Plan::Refuse);
        let source = match plan {
            Plan::Refuse => {
                return Err(FeedError::Connection(format!("{url}: connection refused")))
            }
            Plan::Frames(frames) => Source::Queue(frames.into()),
            Plan::Held(rx) => Source::Channel(rx),
        };

        Ok(Box::new(ScriptedStream {
            source,
            closed: false,
            closes: self.closes.clone(),
        }))
    }
}

enum Source {
    Queue(VecDeque<Frame>),
    Channel(mpsc::UnboundedReceiver<Frame>),
}

struct ScriptedStream {
    source: Source,
    closed: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<FeedResult<String>> {
        if self.closed {
            return None;
        }

        let frame = match &mut self.source {
            Source::Queue(frames) => frames.pop_front(),
            Source::Channel(rx) => rx.recv().await,
        };

        match frame {
            Some(Frame::Text(text)) => Some(Ok(text)),
            Some(Frame::Error(message)) => Some(Err(FeedError::WebSocket(message))),
            None => None,
        }
    }

    async fn close(&mut self) -> FeedResult<()> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
