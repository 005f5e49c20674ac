//! Ticker Manager
//!
//! Orchestrates REST polling and the WebSocket stream for one instrument
//! and owns the read model consumed by the rest of the application.
//!
//! # Source authority
//!
//! Polling is on by default. The first ticker from the stream for the
//! active instrument makes streaming authoritative and pauses polling.
//! Polling comes back when the stream gives up (reconnect budget exhausted),
//! the peer closes it normally, or a connect attempt times out. Neither producer flips these switches
//! itself; they only report to the manager.
//!
//! # Dispatch
//!
//! Every input goes through [`TickerManager::handle`], which returns the
//! side effects to perform. The manager does no I/O and has no clock, so
//! every transition can be driven from tests with synthetic events.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;

use super::commands::{Command, Effects, Event, TimerKind};
use super::polling::{DEFAULT_POLL_INTERVAL, PollingSchedule};
use super::streaming::{StreamSignal, StreamingClient, StreamingConfig};
use crate::application::ports::{FeedCodec, FetchError};
use crate::domain::connection::{ConnectionState, FetchId, SourceMode, TimerId};
use crate::domain::quote::{Instrument, Quote};

/// Message surfaced when polling fails for any reason but rate limiting.
pub const FETCH_FAILED_MESSAGE: &str = "Unable to fetch price data";

/// Message surfaced when polling is rate limited at the given cadence.
#[must_use]
pub fn rate_limited_message(interval: Duration) -> String {
    let cadence = if interval.subsec_nanos() == 0 && interval.as_secs() > 0 {
        format!("{}s", interval.as_secs())
    } else {
        format!("{}ms", interval.as_millis())
    };
    format!("Rate limited by price API - keeping {cadence} polling cadence")
}

/// Reason sent when the ticker is stopped.
const STOP_REASON: &str = "Ticker stopped";

/// Configuration for the ticker manager.
#[derive(Debug, Clone)]
pub struct TickerManagerConfig {
    /// Streaming client configuration.
    pub streaming: StreamingConfig,
    /// REST polling interval.
    pub poll_interval: Duration,
    /// Delay between start and the first streaming attempt.
    pub settle_delay: Duration,
}

impl TickerManagerConfig {
    /// Create a configuration with default timings.
    #[must_use]
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            streaming: StreamingConfig::new(ws_url),
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Read model exposed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickerSnapshot {
    /// Instrument being tracked, if started.
    pub instrument: Option<Instrument>,
    /// Last visible price.
    pub price: Option<Decimal>,
    /// Last visible quote.
    pub quote: Option<Quote>,
    /// Whether the stream socket is open.
    pub connected: bool,
    /// User-visible error, if any.
    pub error: Option<String>,
    /// Authoritative source.
    pub source: SourceMode,
    /// Stream connection state.
    pub connection_state: ConnectionState,
    /// Reconnect attempts since the last reset.
    pub reconnect_attempts: u32,
}

/// Pure ticker orchestrator.
#[derive(Debug)]
pub struct TickerManager {
    config: TickerManagerConfig,
    effects: Effects,
    streaming: StreamingClient,
    polling: PollingSchedule,
    instrument: Option<Instrument>,
    settle_timer: Option<TimerId>,
    source: SourceMode,
    quote: Option<Quote>,
    error: Option<String>,
}

impl TickerManager {
    /// Create a stopped manager.
    #[must_use]
    pub fn new(config: TickerManagerConfig, codec: Box<dyn FeedCodec>) -> Self {
        let streaming = StreamingClient::new(config.streaming.clone(), codec);
        let polling = PollingSchedule::new(config.poll_interval);
        Self {
            config,
            effects: Effects::new(),
            streaming,
            polling,
            instrument: None,
            settle_timer: None,
            source: SourceMode::Polling,
            quote: None,
            error: None,
        }
    }

    /// Dispatch one event and return the side effects it requires.
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Start(instrument) => self.start(instrument),
            Event::Stop => self.stop(),
            Event::Reconnect => self.reconnect(),
            Event::TimerFired(timer) => self.on_timer(timer),
            Event::FetchCompleted { fetch, result } => self.on_fetch(fetch, result),
            Event::SocketOpened { connection } => {
                if let Some(instrument) = self.instrument.clone() {
                    let signals = self
                        .streaming
                        .on_opened(connection, &instrument, &mut self.effects);
                    self.apply(signals);
                }
            }
            Event::SocketMessage { connection, text } => {
                if let Some(instrument) = self.instrument.clone() {
                    let signals = self.streaming.on_message(connection, &text, &instrument);
                    self.apply(signals);
                }
            }
            Event::SocketError {
                connection,
                message,
            } => {
                if self.instrument.is_some() {
                    let signals = self
                        .streaming
                        .on_error(connection, &message, &mut self.effects);
                    self.apply(signals);
                }
            }
            Event::SocketClosed {
                connection,
                code,
                reason,
            } => {
                if self.instrument.is_some() {
                    let signals =
                        self.streaming
                            .on_closed(connection, code, &reason, &mut self.effects);
                    self.apply(signals);
                }
            }
        }

        self.effects.drain()
    }

    /// Current read model.
    #[must_use]
    pub fn snapshot(&self) -> TickerSnapshot {
        TickerSnapshot {
            instrument: self.instrument.clone(),
            price: self.quote.as_ref().map(|quote| quote.price),
            quote: self.quote.clone(),
            connected: self.streaming.is_connected(),
            error: self.error.clone(),
            source: self.source,
            connection_state: self.streaming.state(),
            reconnect_attempts: self.streaming.attempt_count(),
        }
    }

    /// Whether a session is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.instrument.is_some()
    }

    /// Whether REST polling is running.
    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.polling.is_active()
    }

    /// Get the manager configuration.
    #[must_use]
    pub const fn config(&self) -> &TickerManagerConfig {
        &self.config
    }

    fn start(&mut self, instrument: Instrument) {
        if self.instrument.is_some() {
            self.teardown("Switching instrument");
        }

        tracing::info!(instrument = %instrument, "Starting ticker");

        self.quote = None;
        self.error = None;
        self.source = SourceMode::Polling;
        self.streaming.reset();
        self.polling.reset_ordering();

        self.polling.activate(&instrument, &mut self.effects);
        self.settle_timer = Some(
            self.effects
                .schedule(TimerKind::Settle, self.config.settle_delay),
        );
        self.instrument = Some(instrument);
    }

    fn stop(&mut self) {
        if self.instrument.is_none() {
            return;
        }
        self.teardown(STOP_REASON);
    }

    fn teardown(&mut self, reason: &str) {
        if let Some(instrument) = self.instrument.take() {
            tracing::info!(instrument = %instrument, reason, "Stopping ticker");
        }
        self.effects.cancel(self.settle_timer.take());
        self.streaming.shutdown(reason, &mut self.effects);
        self.polling.deactivate(&mut self.effects);
    }

    fn reconnect(&mut self) {
        let Some(instrument) = self.instrument.clone() else {
            tracing::debug!("Reconnect ignored, ticker not running");
            return;
        };
        // Streaming starts now, so the pending first attempt is redundant.
        self.effects.cancel(self.settle_timer.take());
        self.streaming
            .manual_reconnect(&instrument, &mut self.effects);
    }

    fn on_timer(&mut self, timer: TimerId) {
        let Some(instrument) = self.instrument.clone() else {
            return;
        };

        if self.settle_timer == Some(timer) {
            self.settle_timer = None;
            self.streaming.connect(&instrument, &mut self.effects);
            return;
        }

        if self.polling.on_timer(timer, &instrument, &mut self.effects) {
            return;
        }

        match self
            .streaming
            .on_timer(timer, &instrument, &mut self.effects)
        {
            Some(signals) => self.apply(signals),
            None => tracing::trace!(%timer, "Ignoring stale timer"),
        }
    }

    fn on_fetch(&mut self, fetch: FetchId, result: Result<Quote, FetchError>) {
        if !self.polling.is_current(fetch) {
            tracing::debug!(%fetch, "Discarding fetch from inactive polling session");
            return;
        }

        match result {
            Ok(quote) => {
                if self.instrument.as_ref() != Some(&quote.instrument) {
                    tracing::debug!(%fetch, product = %quote.instrument, "Discarding fetch for another instrument");
                    return;
                }
                if self.polling.accept(fetch) {
                    tracing::debug!(%fetch, price = %quote.price, "Polled quote applied");
                    self.quote = Some(quote);
                    self.error = None;
                }
            }
            Err(e) => {
                if !self.polling.is_latest(fetch) {
                    tracing::debug!(%fetch, error = %e, "Discarding failure older than the applied quote");
                    return;
                }
                tracing::warn!(%fetch, error = %e, "Polling fetch failed");
                let message = if e.is_rate_limited() {
                    rate_limited_message(self.config.poll_interval)
                } else {
                    FETCH_FAILED_MESSAGE.to_string()
                };
                self.error = Some(message);
            }
        }
    }

    fn apply(&mut self, signals: Vec<StreamSignal>) {
        for signal in signals {
            match signal {
                StreamSignal::Quote(quote) => {
                    self.quote = Some(quote);
                    self.error = None;
                    if self.source == SourceMode::Polling {
                        self.source = SourceMode::Streaming;
                        self.polling.deactivate(&mut self.effects);
                        tracing::info!("Stream delivering data, REST polling paused");
                    }
                }
                StreamSignal::Error(message) => {
                    self.error = Some(message);
                }
                StreamSignal::ResumePolling => {
                    self.source = SourceMode::Polling;
                    if let Some(instrument) = self.instrument.clone() {
                        self.polling.activate(&instrument, &mut self.effects);
                    }
                }
            }
        }
    }
}
