use anyhow::{Context, Result};
use clap::Parser;
use live_metrics::config::parse_backoff;
use live_metrics::connection::policy::DEFAULT_MAX_RECONNECT_DELAY;
use live_metrics::{Backoff, ConnectionStatus, FeedConfig, FeedEvent, LiveFeed, Sample};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_metrics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = apply_overrides(FeedConfig::from_env()?, &cli)?;

    info!("📡 Following metrics feed at {}", config.url);
    info!(
        "   Reconnect: {} ms x {} ({:?})",
        config.reconnect.delay.as_millis(),
        config.reconnect.max_attempts,
        config.reconnect.backoff
    );
    info!("   Window: {} samples", config.window_capacity);

    let mut feed = LiveFeed::websocket(config).context("failed to create feed")?;

    let every = cli.every.max(1);
    let received = AtomicU64::new(0);
    let alarm_active = AtomicBool::new(false);
    feed.set_event_callback(move |event| match event {
        FeedEvent::Sample(sample) => {
            let was_alarm = alarm_active.swap(sample.is_alarm(), Ordering::Relaxed);
            if sample.is_alarm() && !was_alarm {
                warn!("🚨 ALARM ACTIVE at {}", sample.ts);
            } else if !sample.is_alarm() && was_alarm {
                info!("✅ Alarm cleared at {}", sample.ts);
            }

            if received.fetch_add(1, Ordering::Relaxed) % every == 0 {
                info!("{}", render_sample(sample));
            }
        }
        FeedEvent::StatusChanged {
            status,
            reconnect_attempts,
        } => {
            if *reconnect_attempts > 0 && *status == ConnectionStatus::Connecting {
                info!("{} (attempt {})", status.label(), reconnect_attempts);
            } else {
                info!("{}", status.label());
            }
        }
        FeedEvent::ReconnectsExhausted { attempts } => {
            warn!("Giving up after {} reconnect attempts", attempts);
        }
        FeedEvent::DecodeFailed { .. } | FeedEvent::ReconnectScheduled { .. } => {}
    });

    feed.start().context("failed to start feed")?;

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = feed.closed() => false,
    };

    if interrupted {
        info!("Interrupted, shutting down");
        feed.shutdown().await;
    }

    print_summary(&feed.samples());

    Ok(())
}

fn apply_overrides(mut config: FeedConfig, cli: &Cli) -> Result<FeedConfig> {
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(delay) = cli.reconnect_delay_ms {
        config.reconnect.delay = Duration::from_millis(delay);
    }
    if let Some(attempts) = cli.max_reconnect_attempts {
        config.reconnect.max_attempts = attempts;
    }
    if let Some(capacity) = cli.window_capacity {
        config.window_capacity = capacity;
    }
    if let Some(mode) = &cli.backoff {
        let max_delay = match config.reconnect.backoff {
            Backoff::Exponential { max_delay } => max_delay,
            Backoff::Fixed => DEFAULT_MAX_RECONNECT_DELAY,
        };
        config.reconnect.backoff = parse_backoff(mode, max_delay)?;
    }

    config.validate()?;
    Ok(config)
}

fn render_sample(sample: &Sample) -> String {
    let mut line = format!(
        "cpu {:>6.2}%  mem {:>6.2}%  net ↓{} ↑{}  disk r {} w {}",
        sample.cpu,
        sample.mem,
        format_bps(sample.net_in_bps),
        format_bps(sample.net_out_bps),
        format_bps(sample.disk_read_bps),
        format_bps(sample.disk_write_bps),
    );

    if let Some(score) = sample.score_ens {
        line.push_str(&format!("  score {score:.3}"));
        if let Some(threshold) = sample.threshold {
            line.push_str(&format!("/{threshold:.3}"));
        }
    }

    line
}

fn format_bps(bps: f64) -> String {
    if bps < 1024.0 {
        format!("{bps:.0} B/s")
    } else if bps < 1024.0 * 1024.0 {
        format!("{:.2} KB/s", bps / 1024.0)
    } else {
        format!("{:.2} MB/s", bps / (1024.0 * 1024.0))
    }
}

fn print_summary(samples: &[Sample]) {
    if samples.is_empty() {
        println!("No samples received");
        return;
    }

    let peak = |f: fn(&Sample) -> f64| samples.iter().map(f).fold(f64::MIN, f64::max);
    let alarms = samples.iter().filter(|s| s.is_alarm()).count();

    println!("{:<12} {}", "Samples", samples.len());
    println!("{:<12} {:.2}%", "Peak CPU", peak(|s| s.cpu));
    println!("{:<12} {:.2}%", "Peak memory", peak(|s| s.mem));
    println!("{:<12} {}", "Alarms", alarms);
    println!(
        "{:<12} {} .. {}",
        "Span",
        samples[0].ts,
        samples[samples.len() - 1].ts
    );
}
