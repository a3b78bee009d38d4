// Common types for the live metrics feed

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can occur while running the feed
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// One metric record pushed by the upstream collector.
///
/// Required fields are always present on the wire; the anomaly fields are only
/// sent when the upstream has detection enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// ISO-8601 timestamp, kept as sent
    pub ts: String,

    /// CPU usage percentage
    pub cpu: f64,

    /// Memory usage percentage
    pub mem: f64,

    #[serde(rename = "netInBps")]
    pub net_in_bps: f64,

    #[serde(rename = "netOutBps")]
    pub net_out_bps: f64,

    #[serde(rename = "diskReadBps")]
    pub disk_read_bps: f64,

    #[serde(rename = "diskWriteBps")]
    pub disk_write_bps: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_ecod: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_iforest: Option<f64>,

    /// Ensemble of the detector scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_ens: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,

    /// Ensemble score crossed the threshold on this sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceed: Option<bool>,

    /// Sustained exceedance, drives alarm state in presentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm: Option<bool>,
}

impl Sample {
    /// Decode a sample from an inbound text frame
    pub fn from_json(text: &str) -> FeedResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse `ts`. Offset-less timestamps are read as UTC.
    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.ts) {
            return Some(ts);
        }

        NaiveDateTime::parse_from_str(&self.ts, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    }

    pub fn is_alarm(&self) -> bool {
        self.alarm.unwrap_or(false)
    }

    pub fn exceeds_threshold(&self) -> bool {
        self.exceed.unwrap_or(false)
    }

    /// Whether the upstream attached detector scores to this sample
    pub fn has_scores(&self) -> bool {
        self.score_ens.is_some()
    }
}

/// Connectivity state of the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    /// Label shown next to the status indicator
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Error => "Error",
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Events emitted by a connection session, in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    StatusChanged {
        status: ConnectionStatus,
        reconnect_attempts: u32,
    },
    Sample(Sample),
    DecodeFailed {
        error: String,
    },
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
    },
    ReconnectsExhausted {
        attempts: u32,
    },
}
