// Live system-metrics feed
//
// Client-side pipeline behind the metrics dashboard:
// - `connection`: reconnecting push-connection manager
// - `window`: bounded sliding window of recent samples
// - `transport`: connection seam, WebSocket implementation
// - `feed`: manager + window wiring and presentation snapshots
// - `config`: environment configuration

pub mod config;
pub mod connection;
pub mod feed;
pub mod transport;
pub mod types;
pub mod window;

pub use config::{ConfigError, FeedConfig};
pub use connection::{Backoff, ConnectionManager, ConnectionState, ReconnectPolicy};
pub use feed::{FeedView, LiveFeed};
pub use transport::{FrameStream, Transport, WebSocketTransport};
pub use types::{ConnectionStatus, FeedError, FeedEvent, FeedResult, Sample};
pub use window::{SlidingWindow, WindowMetrics};
