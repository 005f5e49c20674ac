//! Reconnection Policy
//!
//! Decides what happens after an abnormal WebSocket close: schedule one
//! more attempt with exponential backoff and jitter, or give up on
//! streaming and hand the ticker back to REST polling.
//!
//! The attempt counter is only reset by genuine data flow (a matching
//! ticker) or by a manual reconnect, never by a socket merely reopening.

use std::borrow::Cow;
use std::time::Duration;

use rand::Rng;

/// WebSocket close code for an intentional, normal close.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Broad classification of a close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// 1000: intentional close.
    Normal,
    /// 1001, 1005, 1006: peer went away or the transport dropped.
    Abnormal,
    /// 1002, 1003, 1007, 1009, 1015: protocol or payload problems.
    Protocol,
    /// 1008: server policy.
    Policy,
    /// 1013, 1014: server overloaded or upstream unavailable.
    Overload,
    /// 1011, 1012: server-side failure or restart.
    Server,
    /// Anything else.
    Other,
}

impl CloseClass {
    /// Classify a close code.
    #[must_use]
    pub const fn of(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 | 1005 | 1006 => Self::Abnormal,
            1002 | 1003 | 1007 | 1009 | 1015 => Self::Protocol,
            1008 => Self::Policy,
            1013 | 1014 => Self::Overload,
            1011 | 1012 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Get the class name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Abnormal => "abnormal",
            Self::Protocol => "protocol",
            Self::Policy => "policy",
            Self::Overload => "overload",
            Self::Server => "server",
            Self::Other => "other",
        }
    }
}

/// Human-readable reason for a close code.
#[must_use]
pub fn describe_close(code: u16) -> Cow<'static, str> {
    let reason = match code {
        1000 => "Normal closure",
        1001 => "Going away",
        1002 => "Protocol error",
        1003 => "Unsupported data",
        1005 => "No status received",
        1006 => "Abnormal closure",
        1007 => "Invalid frame payload data",
        1008 => "Policy violation",
        1009 => "Message too big",
        1011 => "Internal server error",
        1012 => "Service restart",
        1013 => "Try again later",
        1014 => "Bad gateway",
        1015 => "TLS handshake failure",
        other => return Cow::Owned(format!("Connection error ({other})")),
    };
    Cow::Borrowed(reason)
}

/// Classified close event remembered by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRecord {
    /// Raw close code.
    pub code: u16,
    /// Classification of the code.
    pub class: CloseClass,
    /// Human-readable reason.
    pub reason: String,
}

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay, doubled per attempt.
    pub base_delay: Duration,
    /// Ceiling for the computed delay, jitter included.
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter: Duration,
    /// Attempt count at which streaming is abandoned for polling.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(2),
            max_attempts: 2,
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(
        base_delay: Duration,
        max_delay: Duration,
        max_jitter: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            max_jitter,
            max_attempts,
        }
    }

    /// Compute the delay for an attempt given an explicit jitter.
    ///
    /// `min(base * 2^attempt + jitter, max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_mul(factor)
            .saturating_add(jitter)
            .min(self.max_delay)
    }
}

/// Outcome of handing an abnormal close to the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule exactly one reconnect after `delay`.
    Retry {
        /// Delay before the next connect attempt.
        delay: Duration,
        /// Attempt number this retry represents.
        attempt: u32,
        /// User-visible status message.
        message: String,
    },
    /// Stop automatic reconnects and resume polling.
    FallBackToPolling {
        /// Attempt number that exhausted the budget.
        attempt: u32,
        /// User-visible status message.
        message: String,
    },
}

impl ReconnectDecision {
    /// Get the user-visible message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Retry { message, .. } | Self::FallBackToPolling { message, .. } => message,
        }
    }
}

/// Reconnection policy implementing bounded exponential backoff with jitter.
///
/// # Example
///
/// ```rust
/// use price_ticker::application::services::reconnect::{
///     ReconnectConfig, ReconnectDecision, ReconnectPolicy,
/// };
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// // First abnormal close schedules a retry
/// let first = policy.on_close(1006);
/// assert!(matches!(first, ReconnectDecision::Retry { attempt: 1, .. }));
///
/// // Second exhausts the budget
/// let second = policy.on_close(1006);
/// assert!(matches!(second, ReconnectDecision::FallBackToPolling { .. }));
///
/// // Data arrived again
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
    last_close: Option<CloseRecord>,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
            last_close: None,
        }
    }

    /// Record an abnormal close and decide what to do next.
    ///
    /// Always increments the attempt counter.
    pub fn on_close(&mut self, code: u16) -> ReconnectDecision {
        let jitter = self.random_jitter();
        self.on_close_with_jitter(code, jitter)
    }

    /// Same as [`Self::on_close`] with an explicit jitter value.
    pub fn on_close_with_jitter(&mut self, code: u16, jitter: Duration) -> ReconnectDecision {
        let reason = describe_close(code).into_owned();
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_close = Some(CloseRecord {
            code,
            class: CloseClass::of(code),
            reason: reason.clone(),
        });

        let attempt = self.attempt_count;
        if self.is_exhausted() {
            return ReconnectDecision::FallBackToPolling {
                attempt,
                message: format!("{reason} - using REST API fallback"),
            };
        }

        ReconnectDecision::Retry {
            delay: self.config.delay_for(attempt, jitter),
            attempt,
            message: format!(
                "{reason}. Reconnecting... ({attempt}/{})",
                self.config.max_attempts
            ),
        }
    }

    /// Reset after genuine data flow or a manual reconnect.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.last_close = None;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Get the most recent close classification.
    #[must_use]
    pub const fn last_close(&self) -> Option<&CloseRecord> {
        self.last_close.as_ref()
    }

    /// Check if the attempt budget is used up.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.config.max_attempts
    }

    /// Get the policy configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    fn random_jitter(&self) -> Duration {
        let max_millis = u64::try_from(self.config.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_millis == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(0..max_millis))
    }
}
