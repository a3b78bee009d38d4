use clap::Parser;

/// Follow a live metrics feed from the terminal
#[derive(Parser, Debug)]
#[command(name = "live-metrics", version, about, long_about = None)]
pub struct Cli {
    /// WebSocket endpoint (overrides METRICS_WS_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Delay before each reconnect attempt, in milliseconds
    #[arg(long, value_name = "MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Reconnect attempts per outage before giving up
    #[arg(long, value_name = "N")]
    pub max_reconnect_attempts: Option<u32>,

    /// Number of samples kept in the window
    #[arg(long, value_name = "N")]
    pub window_capacity: Option<usize>,

    /// Reconnect delay growth: fixed or exponential
    #[arg(long, value_name = "MODE")]
    pub backoff: Option<String>,

    /// Only log every Nth sample
    #[arg(long, default_value_t = 1, value_name = "N")]
    pub every: u64,
}
