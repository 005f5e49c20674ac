//! Streaming Client
//!
//! State machine for the WebSocket ticker subscription:
//!
//! ```text
//! Idle ──connect──► Connecting ──open──► Open ──close──► Closed
//!                       │                                  │
//!                   watchdog                    policy: retry │ fall back
//!                       ▼                                  ▼
//!              Closed + fixed retry            Connecting │ (polling)
//! ```
//!
//! The client never touches the visible quote or the polling loop. It
//! reports [`StreamSignal`]s and the orchestrator decides what to do.

use std::time::Duration;

use super::commands::{Command, Effects, TimerKind};
use super::reconnect::{NORMAL_CLOSURE, ReconnectConfig, ReconnectDecision, ReconnectPolicy};
use crate::application::ports::{FeedCodec, FeedEvent};
use crate::domain::connection::{ConnectionId, ConnectionState, TimerId};
use crate::domain::quote::{Instrument, Quote};

/// Message surfaced on a transport error event.
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error occurred";

/// Message surfaced when the watchdog abandons a pending connect.
pub const CONNECT_TIMEOUT_MESSAGE: &str = "Connection timeout - retrying";

/// Configuration for the streaming client.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// WebSocket URL.
    pub url: String,
    /// How long a connect may stay pending before it is abandoned.
    pub watchdog_timeout: Duration,
    /// Fixed delay before retrying after a watchdog timeout.
    pub watchdog_retry_delay: Duration,
    /// Reconnection policy configuration.
    pub reconnect: ReconnectConfig,
}

impl StreamingConfig {
    /// Create a configuration with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            watchdog_timeout: Duration::from_secs(15),
            watchdog_retry_delay: Duration::from_secs(3),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Outcome reported to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// A ticker for the subscribed instrument arrived.
    Quote(Quote),
    /// A user-visible error should be surfaced.
    Error(String),
    /// Streaming is not healthy; polling should run.
    ResumePolling,
}

/// WebSocket ticker state machine.
#[derive(Debug)]
pub struct StreamingClient {
    config: StreamingConfig,
    codec: Box<dyn FeedCodec>,
    policy: ReconnectPolicy,
    state: ConnectionState,
    connection: Option<ConnectionId>,
    connecting: bool,
    connected: bool,
    watchdog: Option<TimerId>,
    watchdog_retry: Option<TimerId>,
    reconnect_timer: Option<TimerId>,
}

impl StreamingClient {
    /// Create an idle client.
    #[must_use]
    pub fn new(config: StreamingConfig, codec: Box<dyn FeedCodec>) -> Self {
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            config,
            codec,
            policy,
            state: ConnectionState::Idle,
            connection: None,
            connecting: false,
            connected: false,
            watchdog: None,
            watchdog_retry: None,
            reconnect_timer: None,
        }
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the socket is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether a connect attempt is in flight.
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Currently tracked socket, if any.
    #[must_use]
    pub const fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Reconnect attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.policy.attempt_count()
    }

    /// Whether an automatic reconnect is scheduled.
    #[must_use]
    pub const fn has_pending_reconnect(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    /// Open a new socket, discarding any previous one.
    ///
    /// No-op while a connect is already in flight.
    pub fn connect(&mut self, instrument: &Instrument, fx: &mut Effects) {
        if self.connecting {
            tracing::debug!(instrument = %instrument, "Connect already in flight, ignoring");
            return;
        }

        if let Some(previous) = self.connection.take() {
            fx.push(Command::CloseSocket {
                connection: previous,
                code: NORMAL_CLOSURE,
                reason: "Superseded by new connection".to_string(),
            });
        }
        fx.cancel(self.watchdog.take());
        fx.cancel(self.watchdog_retry.take());
        fx.cancel(self.reconnect_timer.take());

        let connection = fx.next_connection();
        self.connection = Some(connection);
        self.connecting = true;
        self.connected = false;
        self.state = ConnectionState::Connecting;
        self.watchdog = Some(fx.schedule(TimerKind::Watchdog, self.config.watchdog_timeout));

        tracing::info!(
            instrument = %instrument,
            %connection,
            url = %self.config.url,
            attempt = self.policy.attempt_count(),
            "Connecting to ticker stream"
        );

        fx.push(Command::OpenSocket {
            connection,
            url: self.config.url.clone(),
        });
    }

    /// Manual reconnect: drop any pending retry, reset the budget, and
    /// connect immediately.
    pub fn manual_reconnect(&mut self, instrument: &Instrument, fx: &mut Effects) {
        fx.cancel(self.reconnect_timer.take());
        fx.cancel(self.watchdog_retry.take());
        self.policy.reset();

        tracing::info!(instrument = %instrument, "Manual reconnect requested");
        self.connect(instrument, fx);
    }

    /// Handle a timer firing.
    ///
    /// Returns `None` if the timer does not belong to this client.
    pub fn on_timer(
        &mut self,
        timer: TimerId,
        instrument: &Instrument,
        fx: &mut Effects,
    ) -> Option<Vec<StreamSignal>> {
        if self.watchdog == Some(timer) {
            self.watchdog = None;
            return Some(self.on_watchdog(fx));
        }

        if self.watchdog_retry == Some(timer) {
            self.watchdog_retry = None;
            tracing::info!("Retrying after connect timeout");
            self.connect(instrument, fx);
            return Some(Vec::new());
        }

        if self.reconnect_timer == Some(timer) {
            self.reconnect_timer = None;
            self.connect(instrument, fx);
            return Some(Vec::new());
        }

        None
    }

    fn on_watchdog(&mut self, fx: &mut Effects) -> Vec<StreamSignal> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        tracing::warn!(
            timeout_ms = self.config.watchdog_timeout.as_millis(),
            "Ticker stream connect timed out"
        );

        if let Some(connection) = self.connection.take() {
            fx.push(Command::CloseSocket {
                connection,
                code: NORMAL_CLOSURE,
                reason: "Connection timeout".to_string(),
            });
        }
        self.connecting = false;
        self.connected = false;
        self.state = ConnectionState::Closed;
        self.watchdog_retry =
            Some(fx.schedule(TimerKind::WatchdogRetry, self.config.watchdog_retry_delay));

        vec![
            StreamSignal::Error(CONNECT_TIMEOUT_MESSAGE.to_string()),
            StreamSignal::ResumePolling,
        ]
    }

    /// Handle the socket finishing its handshake.
    pub fn on_opened(
        &mut self,
        connection: ConnectionId,
        instrument: &Instrument,
        fx: &mut Effects,
    ) -> Vec<StreamSignal> {
        if !self.is_current(connection) {
            tracing::debug!(%connection, "Ignoring open from stale socket");
            return Vec::new();
        }

        fx.cancel(self.watchdog.take());
        self.connecting = false;
        self.connected = true;
        self.state = ConnectionState::Open;

        tracing::info!(%connection, instrument = %instrument, "Ticker stream connected");

        // The feed drops connections that do not subscribe promptly.
        match self.codec.subscribe_request(instrument) {
            Ok(text) => {
                fx.push(Command::SendText { connection, text });
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build subscribe request");
                vec![StreamSignal::Error(format!("Failed to subscribe: {e}"))]
            }
        }
    }

    /// Handle an inbound text frame.
    pub fn on_message(
        &mut self,
        connection: ConnectionId,
        text: &str,
        instrument: &Instrument,
    ) -> Vec<StreamSignal> {
        if !self.is_current(connection) {
            tracing::trace!(%connection, "Ignoring message from stale socket");
            return Vec::new();
        }

        let event = match self.codec.decode(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed feed message");
                return Vec::new();
            }
        };

        match event {
            FeedEvent::Ticker(quote) if quote.instrument == *instrument => {
                self.policy.reset();
                vec![StreamSignal::Quote(quote)]
            }
            FeedEvent::Ticker(quote) => {
                tracing::trace!(
                    product = %quote.instrument,
                    "Ignoring ticker for another instrument"
                );
                Vec::new()
            }
            FeedEvent::Subscriptions { products } => {
                tracing::debug!(?products, "Subscription confirmed");
                Vec::new()
            }
            FeedEvent::Error { message } => {
                tracing::warn!(%message, "Feed reported an error");
                vec![StreamSignal::Error(format!("WebSocket error: {message}"))]
            }
            FeedEvent::Other => Vec::new(),
        }
    }

    /// Handle a transport error. The close event that follows decides on
    /// recovery.
    pub fn on_error(
        &mut self,
        connection: ConnectionId,
        message: &str,
        fx: &mut Effects,
    ) -> Vec<StreamSignal> {
        if !self.is_current(connection) {
            tracing::debug!(%connection, "Ignoring error from stale socket");
            return Vec::new();
        }

        tracing::warn!(%connection, error = %message, "Ticker stream error");
        self.connected = false;
        self.connecting = false;
        self.state = ConnectionState::Closed;
        fx.cancel(self.watchdog.take());

        vec![StreamSignal::Error(CONNECTION_ERROR_MESSAGE.to_string())]
    }

    /// Handle the socket closing.
    pub fn on_closed(
        &mut self,
        connection: ConnectionId,
        code: u16,
        reason: &str,
        fx: &mut Effects,
    ) -> Vec<StreamSignal> {
        if !self.is_current(connection) {
            tracing::debug!(%connection, code, "Ignoring close from stale socket");
            return Vec::new();
        }

        self.connection = None;
        self.connected = false;
        self.connecting = false;
        self.state = ConnectionState::Closed;
        fx.cancel(self.watchdog.take());

        // Local closes drop the connection first, so a current 1000 came from the peer.
        if code == NORMAL_CLOSURE {
            tracing::info!(%connection, reason, "Ticker stream closed normally by peer");
            return vec![StreamSignal::ResumePolling];
        }

        let decision = self.policy.on_close(code);
        if let Some(close) = self.policy.last_close() {
            tracing::warn!(
                %connection,
                code,
                class = close.class.as_str(),
                peer_reason = reason,
                attempt = self.policy.attempt_count(),
                "Ticker stream closed abnormally"
            );
        }

        match decision {
            ReconnectDecision::Retry {
                delay,
                attempt,
                message,
            } => {
                tracing::info!(attempt, delay_ms = delay.as_millis(), "Scheduling reconnect");
                self.reconnect_timer = Some(fx.schedule(TimerKind::Reconnect, delay));
                vec![StreamSignal::Error(message)]
            }
            ReconnectDecision::FallBackToPolling { attempt, message } => {
                tracing::warn!(attempt, "Reconnect budget exhausted, falling back to REST");
                vec![StreamSignal::Error(message), StreamSignal::ResumePolling]
            }
        }
    }

    /// Release every timer and the socket.
    pub fn shutdown(&mut self, reason: &str, fx: &mut Effects) {
        fx.cancel(self.watchdog.take());
        fx.cancel(self.watchdog_retry.take());
        fx.cancel(self.reconnect_timer.take());

        if let Some(connection) = self.connection.take() {
            fx.push(Command::CloseSocket {
                connection,
                code: NORMAL_CLOSURE,
                reason: reason.to_string(),
            });
            self.state = ConnectionState::Closed;
        }

        self.connecting = false;
        self.connected = false;
    }

    /// Reset per-instrument state. Call after [`Self::shutdown`].
    pub fn reset(&mut self) {
        self.policy.reset();
        self.state = ConnectionState::Idle;
    }

    fn is_current(&self, connection: ConnectionId) -> bool {
        self.connection == Some(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::coinbase::CoinbaseCodec;

    fn btc() -> Instrument {
        Instrument::new("BTC-USD").unwrap()
    }

    fn client() -> StreamingClient {
        StreamingClient::new(
            StreamingConfig::new("wss://feed.test"),
            Box::new(CoinbaseCodec::new()),
        )
    }

    fn opened(fx: &mut Effects) -> ConnectionId {
        fx.drain()
            .into_iter()
            .find_map(|c| match c {
                Command::OpenSocket { connection, .. } => Some(connection),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn connect_is_guarded() {
        let mut fx = Effects::new();
        let mut client = client();

        client.connect(&btc(), &mut fx);
        let first = opened(&mut fx);
        assert!(client.is_connecting());
        assert_eq!(client.state(), ConnectionState::Connecting);

        client.connect(&btc(), &mut fx);
        assert!(fx.drain().is_empty(), "second connect must be a no-op");
        assert_eq!(client.connection(), Some(first));
    }

    #[test]
    fn open_sends_subscribe_immediately() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let connection = opened(&mut fx);

        let signals = client.on_opened(connection, &btc(), &mut fx);
        assert!(signals.is_empty());
        assert!(client.is_connected());
        assert!(!client.is_connecting());

        let commands = fx.drain();
        assert!(matches!(commands[0], Command::CancelTimer { .. }));
        let Command::SendText { text, .. } = &commands[1] else {
            panic!("expected subscribe, got {commands:?}");
        };
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["product_ids"][0], "BTC-USD");
        assert_eq!(value["channels"][0], "ticker");
    }

    #[test]
    fn reopen_closes_previous_socket() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let first = opened(&mut fx);
        client.on_opened(first, &btc(), &mut fx);
        fx.drain();

        client.connect(&btc(), &mut fx);
        let commands = fx.drain();
        assert_eq!(
            commands[0],
            Command::CloseSocket {
                connection: first,
                code: 1000,
                reason: "Superseded by new connection".to_string(),
            }
        );
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, Command::OpenSocket { connection, .. } if *connection != first))
        );
    }

    #[test]
    fn watchdog_abandons_pending_connect() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let commands = fx.drain();
        let watchdog = commands
            .iter()
            .find_map(|c| match c {
                Command::ScheduleTimer {
                    timer,
                    kind: TimerKind::Watchdog,
                    ..
                } => Some(*timer),
                _ => None,
            })
            .unwrap();

        let signals = client.on_timer(watchdog, &btc(), &mut fx).unwrap();
        assert_eq!(
            signals,
            vec![
                StreamSignal::Error(CONNECT_TIMEOUT_MESSAGE.to_string()),
                StreamSignal::ResumePolling,
            ]
        );
        assert!(!client.is_connecting());
        assert_eq!(client.attempt_count(), 0, "watchdog retry must not consume budget");

        let commands = fx.drain();
        assert!(matches!(commands[0], Command::CloseSocket { .. }));
        assert!(matches!(
            commands[1],
            Command::ScheduleTimer {
                kind: TimerKind::WatchdogRetry,
                delay,
                ..
            } if delay == Duration::from_secs(3)
        ));
    }

    #[test]
    fn error_surfaces_without_scheduling() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let connection = opened(&mut fx);

        let signals = client.on_error(connection, "reset by peer", &mut fx);
        assert_eq!(
            signals,
            vec![StreamSignal::Error(CONNECTION_ERROR_MESSAGE.to_string())]
        );
        assert!(!client.is_connecting());
        assert!(!client.is_connected());
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(
            fx.drain()
                .iter()
                .all(|c| !matches!(c, Command::ScheduleTimer { .. }))
        );
        assert!(!client.has_pending_reconnect());
    }

    #[test]
    fn normal_close_resumes_polling_without_retry() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let connection = opened(&mut fx);
        client.on_opened(connection, &btc(), &mut fx);

        let signals = client.on_closed(connection, 1000, "bye", &mut fx);
        assert_eq!(signals, vec![StreamSignal::ResumePolling]);
        assert_eq!(client.attempt_count(), 0);
        assert!(!client.has_pending_reconnect());
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[test]
    fn stale_close_is_ignored() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let first = opened(&mut fx);
        client.on_opened(first, &btc(), &mut fx);
        client.connect(&btc(), &mut fx);
        fx.drain();

        let signals = client.on_closed(first, 1006, "", &mut fx);
        assert!(signals.is_empty());
        assert_eq!(client.attempt_count(), 0);
        assert!(client.is_connecting());
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn other_instrument_ticker_is_ignored() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let connection = opened(&mut fx);
        client.on_opened(connection, &btc(), &mut fx);

        let text = r#"{"type":"ticker","product_id":"ETH-USD","price":"3000.00"}"#;
        assert!(client.on_message(connection, text, &btc()).is_empty());
    }

    #[test]
    fn feed_error_is_surfaced() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let connection = opened(&mut fx);

        let text = r#"{"type":"error","message":"Failed to subscribe","reason":"ZZZ is not a valid product"}"#;
        assert_eq!(
            client.on_message(connection, text, &btc()),
            vec![StreamSignal::Error(
                "WebSocket error: Failed to subscribe".to_string()
            )]
        );
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut fx = Effects::new();
        let mut client = client();
        client.connect(&btc(), &mut fx);
        let connection = opened(&mut fx);

        client.shutdown("Ticker stopped", &mut fx);
        let commands = fx.drain();
        assert!(matches!(commands[0], Command::CancelTimer { .. }));
        assert_eq!(
            commands[1],
            Command::CloseSocket {
                connection,
                code: 1000,
                reason: "Ticker stopped".to_string(),
            }
        );
        assert!(!client.is_connecting());
        assert!(client.connection().is_none());
    }
}
