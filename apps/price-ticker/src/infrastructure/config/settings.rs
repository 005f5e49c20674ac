//! Ticker Configuration Settings
//!
//! Configuration types for the price ticker, loaded from environment
//! variables. Every setting has a default; only malformed instrument,
//! alert, or reconnect budget values are rejected.

use std::time::Duration;

use crate::application::services::{ReconnectConfig, StreamingConfig, TickerManagerConfig};
use crate::domain::alerts::{AlertCondition, AlertParseError, parse_conditions};
use crate::domain::quote::{Instrument, InstrumentError};
use crate::infrastructure::coinbase::RestFetcherConfig;

/// Default instrument.
pub const DEFAULT_INSTRUMENT: &str = "BTC-USD";

/// Exchange endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// WebSocket feed URL.
    pub ws_url: String,
    /// REST API base URL.
    pub rest_url: String,
    /// `User-Agent` for REST requests.
    pub user_agent: String,
    /// REST request timeout.
    pub http_timeout: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws-feed.exchange.coinbase.com".to_string(),
            rest_url: "https://api.exchange.coinbase.com".to_string(),
            user_agent: concat!("price-ticker/", env!("CARGO_PKG_VERSION")).to_string(),
            http_timeout: Duration::from_secs(10),
        }
    }
}

/// Polling and streaming timing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSettings {
    /// REST polling interval.
    pub poll_interval: Duration,
    /// Delay between start and the first streaming attempt.
    pub settle_delay: Duration,
    /// Connect watchdog timeout.
    pub watchdog_timeout: Duration,
    /// Delay before retrying after a watchdog timeout.
    pub watchdog_retry_delay: Duration,
    /// Base reconnect delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnect delay.
    pub reconnect_delay_max: Duration,
    /// Maximum reconnect jitter.
    pub reconnect_jitter_max: Duration,
    /// Attempts before falling back to polling.
    pub max_reconnect_attempts: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            watchdog_timeout: Duration::from_secs(15),
            watchdog_retry_delay: Duration::from_secs(3),
            reconnect_delay_initial: reconnect.base_delay,
            reconnect_delay_max: reconnect.max_delay,
            reconnect_jitter_max: reconnect.max_jitter,
            max_reconnect_attempts: reconnect.max_attempts,
        }
    }
}

/// What the host environment can do, supplied explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct PlatformCapabilities {
    /// User notifications are available.
    pub can_notify: bool,
    /// Durable storage is available.
    pub can_persist: bool,
    /// Haptic feedback is available.
    pub can_vibrate: bool,
}

/// Price ticker configuration.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Instrument to track at startup.
    pub instrument: Instrument,
    /// Exchange endpoints.
    pub feed: FeedSettings,
    /// Timings.
    pub timing: TimingSettings,
    /// Platform capabilities.
    pub capabilities: PlatformCapabilities,
    /// Price alerts to arm at startup.
    pub alerts: Vec<AlertCondition>,
}

impl TickerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the instrument, alerts, or reconnect budget are
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if the instrument, alerts, or reconnect budget are
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let instrument_raw =
            lookup("TICKER_INSTRUMENT").unwrap_or_else(|| DEFAULT_INSTRUMENT.to_string());
        let instrument = Instrument::new(&instrument_raw)?;

        let feed_defaults = FeedSettings::default();
        let feed = FeedSettings {
            ws_url: non_empty(&lookup, "TICKER_WS_URL").unwrap_or(feed_defaults.ws_url),
            rest_url: non_empty(&lookup, "TICKER_REST_URL").unwrap_or(feed_defaults.rest_url),
            user_agent: non_empty(&lookup, "TICKER_USER_AGENT")
                .unwrap_or(feed_defaults.user_agent),
            http_timeout: parse_env_duration_secs(
                &lookup,
                "TICKER_HTTP_TIMEOUT_SECS",
                feed_defaults.http_timeout,
            ),
        };

        let defaults = TimingSettings::default();
        let timing = TimingSettings {
            poll_interval: parse_env_duration_millis(
                &lookup,
                "TICKER_POLL_INTERVAL_MS",
                defaults.poll_interval,
            ),
            settle_delay: parse_env_duration_millis(
                &lookup,
                "TICKER_SETTLE_DELAY_MS",
                defaults.settle_delay,
            ),
            watchdog_timeout: parse_env_duration_millis(
                &lookup,
                "TICKER_WATCHDOG_TIMEOUT_MS",
                defaults.watchdog_timeout,
            ),
            watchdog_retry_delay: parse_env_duration_millis(
                &lookup,
                "TICKER_WATCHDOG_RETRY_MS",
                defaults.watchdog_retry_delay,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                &lookup,
                "TICKER_RECONNECT_BASE_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_millis(
                &lookup,
                "TICKER_RECONNECT_MAX_MS",
                defaults.reconnect_delay_max,
            ),
            reconnect_jitter_max: parse_env_duration_millis(
                &lookup,
                "TICKER_RECONNECT_JITTER_MS",
                defaults.reconnect_jitter_max,
            ),
            max_reconnect_attempts: parse_env_u32(
                &lookup,
                "TICKER_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        if timing.max_reconnect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TICKER_MAX_RECONNECT_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let capabilities = PlatformCapabilities {
            can_notify: parse_env_bool(&lookup, "TICKER_CAN_NOTIFY"),
            can_persist: parse_env_bool(&lookup, "TICKER_CAN_PERSIST"),
            can_vibrate: parse_env_bool(&lookup, "TICKER_CAN_VIBRATE"),
        };

        let alerts = match lookup("TICKER_ALERTS") {
            Some(raw) => parse_conditions(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            instrument,
            feed,
            timing,
            capabilities,
            alerts,
        })
    }

    /// Build the state machine configuration.
    #[must_use]
    pub fn manager_config(&self) -> TickerManagerConfig {
        TickerManagerConfig {
            streaming: StreamingConfig {
                url: self.feed.ws_url.clone(),
                watchdog_timeout: self.timing.watchdog_timeout,
                watchdog_retry_delay: self.timing.watchdog_retry_delay,
                reconnect: ReconnectConfig::new(
                    self.timing.reconnect_delay_initial,
                    self.timing.reconnect_delay_max,
                    self.timing.reconnect_jitter_max,
                    self.timing.max_reconnect_attempts,
                ),
            },
            poll_interval: self.timing.poll_interval,
            settle_delay: self.timing.settle_delay,
        }
    }

    /// Build the REST adapter configuration.
    #[must_use]
    pub fn rest_config(&self) -> RestFetcherConfig {
        RestFetcherConfig {
            base_url: self.feed.rest_url.clone(),
            user_agent: self.feed.user_agent.clone(),
            timeout: self.feed.http_timeout,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Instrument identifier is invalid.
    #[error("invalid TICKER_INSTRUMENT: {0}")]
    Instrument(#[from] InstrumentError),

    /// Alert list could not be parsed.
    #[error("invalid TICKER_ALERTS: {0}")]
    Alerts(#[from] AlertParseError),

    /// Environment variable has an unacceptable value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env_u32<F>(lookup: &F, key: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parse_env_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
