//! Price Ticker Binary
//!
//! Runs the ticker for one instrument, logging every change to the read
//! model and evaluating configured price alerts.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-ticker
//! ```
//!
//! # Console Commands (stdin)
//!
//! - `reconnect`: Reconnect the stream now with a fresh budget
//! - `switch <INSTRUMENT>`: Track another instrument
//! - `status`: Print the current snapshot as JSON
//! - `rearm`: Re-arm price alerts that already fired
//! - `quit`: Shut down
//!
//! # Environment Variables
//!
//! - `TICKER_INSTRUMENT`: Instrument to track (default: BTC-USD)
//! - `TICKER_WS_URL`: WebSocket feed (default: wss://ws-feed.exchange.coinbase.com)
//! - `TICKER_REST_URL`: REST API (default: <https://api.exchange.coinbase.com>)
//! - `TICKER_ALERTS`: Comma-separated `above:<price>` / `below:<price>`
//! - `TICKER_CAN_NOTIFY`: Log triggered alerts as notifications (default: false)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context as _;
use price_ticker::infrastructure::telemetry;
use price_ticker::{
    AppContext, CoinbaseCodec, Instrument, RestQuoteFetcher, TickerConfig, TickerHandle,
    TickerRuntime, TickerSnapshot,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting price ticker");

    let config = TickerConfig::from_env().context("invalid ticker configuration")?;
    log_config(&config);

    let ctx = AppContext::new(config, telemetry_guard);

    let fetcher = RestQuoteFetcher::new(&ctx.config().rest_config())
        .context("failed to build REST client")?;
    let handle = TickerRuntime::spawn(
        ctx.config().manager_config(),
        Box::new(CoinbaseCodec::new()),
        Arc::new(fetcher),
    );
    handle.start(ctx.config().instrument.clone())?;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    run_console(&ctx, &handle, &shutdown_token).await;

    handle.shutdown().await?;
    ctx.dispose();
    Ok(())
}

/// Operator command read from stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Reconnect,
    Switch(Instrument),
    Status,
    Rearm,
    Quit,
}

fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("reconnect"), None) => Ok(ConsoleCommand::Reconnect),
        (Some("status"), None) => Ok(ConsoleCommand::Status),
        (Some("rearm"), None) => Ok(ConsoleCommand::Rearm),
        (Some("quit" | "exit"), None) => Ok(ConsoleCommand::Quit),
        (Some("switch"), Some(id)) => Instrument::new(id)
            .map(ConsoleCommand::Switch)
            .map_err(|e| e.to_string()),
        _ => Err(format!("unknown command: {}", line.trim())),
    }
}

/// Process snapshot updates and operator commands until shutdown.
async fn run_console(ctx: &AppContext, handle: &TickerHandle, shutdown_token: &CancellationToken) {
    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    tracing::error!("Ticker runtime exited unexpectedly");
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                log_snapshot(&snapshot);
                ctx.on_snapshot(&snapshot);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    if !apply_command(&line, ctx, handle) {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed, console commands disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin, console commands disabled");
                    stdin_open = false;
                }
            },
        }
    }
}

/// Apply one console command. Returns `false` when the console should exit.
fn apply_command(line: &str, ctx: &AppContext, handle: &TickerHandle) -> bool {
    let result = match parse_command(line) {
        Ok(ConsoleCommand::Reconnect) => handle.reconnect(),
        Ok(ConsoleCommand::Switch(instrument)) => {
            tracing::info!(instrument = %instrument, "Switching instrument");
            handle.start(instrument)
        }
        Ok(ConsoleCommand::Status) => {
            match serde_json::to_string_pretty(&handle.snapshot()) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::warn!(error = %e, "Failed to render snapshot"),
            }
            Ok(())
        }
        Ok(ConsoleCommand::Rearm) => {
            ctx.rearm_alerts();
            Ok(())
        }
        Ok(ConsoleCommand::Quit) => return false,
        Err(message) => {
            tracing::warn!(%message, "Ignoring console input");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Ticker command failed");
        return false;
    }
    true
}

/// Log a read model change.
fn log_snapshot(snapshot: &TickerSnapshot) {
    let instrument = snapshot
        .instrument
        .as_ref()
        .map_or("-", Instrument::as_str);
    let price = snapshot
        .price
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    let change = snapshot
        .quote
        .as_ref()
        .and_then(price_ticker::Quote::change_24h_percent)
        .map(|p| format!("{:+.2}%", p.round_dp(2)));

    if let Some(error) = &snapshot.error {
        tracing::warn!(
            instrument,
            price = %price,
            source = snapshot.source.as_str(),
            state = snapshot.connection_state.as_str(),
            attempts = snapshot.reconnect_attempts,
            error = %error,
            "Ticker degraded"
        );
    } else {
        tracing::info!(
            instrument,
            price = %price,
            change_24h = change.as_deref().unwrap_or("-"),
            source = snapshot.source.as_str(),
            state = snapshot.connection_state.as_str(),
            connected = snapshot.connected,
            "Ticker updated"
        );
    }
}

/// Log the parsed configuration.
fn log_config(config: &TickerConfig) {
    tracing::info!(
        instrument = %config.instrument,
        poll_interval_ms = config.timing.poll_interval.as_millis(),
        max_reconnect_attempts = config.timing.max_reconnect_attempts,
        alerts = config.alerts.len(),
        can_notify = config.capabilities.can_notify,
        "Configuration loaded"
    );
    tracing::debug!(
        ws_url = %config.feed.ws_url,
        rest_url = %config.feed.rest_url,
        "Exchange endpoints"
    );
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }

    shutdown_token.cancel();
}
