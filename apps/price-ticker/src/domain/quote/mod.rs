//! Quote Types
//!
//! Core domain types for ticker data: the instrument identifier and the
//! normalized price-plus-statistics snapshot. These types are
//! source-agnostic: REST polling and the WebSocket feed both produce the
//! same `Quote`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Instrument
// =============================================================================

/// Traded pair identifier (e.g. `BTC-USD`).
///
/// Scopes both the REST requests and the WebSocket subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument(String);

impl Instrument {
    /// Create a validated instrument, upper-casing the identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or contains whitespace.
    pub fn new(id: impl AsRef<str>) -> Result<Self, InstrumentError> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InstrumentError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(InstrumentError::Whitespace(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Instrument {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Instrument {
    type Error = InstrumentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.0
    }
}

/// Instrument validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentError {
    /// Identifier was empty.
    #[error("instrument identifier cannot be empty")]
    Empty,
    /// Identifier contained whitespace.
    #[error("instrument identifier contains whitespace: {0:?}")]
    Whitespace(String),
}

// =============================================================================
// Quote
// =============================================================================

/// Aggressor side of the last trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buyer was the taker.
    Buy,
    /// Seller was the taker.
    Sell,
}

/// Normalized price and 24h statistics for one instrument.
///
/// A quote is an immutable snapshot: each update replaces the previous
/// quote wholesale. Statistics the source did not provide are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Instrument this quote belongs to.
    pub instrument: Instrument,
    /// Last traded price.
    pub price: Decimal,
    /// Time of the last trade, if known.
    pub time: Option<DateTime<Utc>>,
    /// Feed sequence number (0 for REST quotes).
    pub sequence: u64,
    /// Identifier of the last trade.
    pub trade_id: u64,
    /// Aggressor side of the last trade.
    pub side: Option<Side>,
    /// Size of the last trade.
    pub last_size: Decimal,
    /// Best bid price.
    pub best_bid: Decimal,
    /// Best bid size.
    pub best_bid_size: Decimal,
    /// Best ask price.
    pub best_ask: Decimal,
    /// Best ask size.
    pub best_ask_size: Decimal,
    /// Rolling 24h volume.
    pub volume_24h: Decimal,
    /// Rolling 24h low.
    pub low_24h: Decimal,
    /// Rolling 24h high.
    pub high_24h: Decimal,
    /// Rolling 30 day volume.
    pub volume_30d: Decimal,
    /// Price 24h ago.
    pub open_24h: Decimal,
}

impl Quote {
    /// Create a quote with only a price; every statistic is zero.
    #[must_use]
    pub const fn new(instrument: Instrument, price: Decimal) -> Self {
        Self {
            instrument,
            price,
            time: None,
            sequence: 0,
            trade_id: 0,
            side: None,
            last_size: Decimal::ZERO,
            best_bid: Decimal::ZERO,
            best_bid_size: Decimal::ZERO,
            best_ask: Decimal::ZERO,
            best_ask_size: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            low_24h: Decimal::ZERO,
            high_24h: Decimal::ZERO,
            volume_30d: Decimal::ZERO,
            open_24h: Decimal::ZERO,
        }
    }

    /// Absolute change against the 24h open.
    ///
    /// Returns `None` when the open is unknown (zero).
    #[must_use]
    pub fn change_24h(&self) -> Option<Decimal> {
        if self.open_24h.is_zero() {
            None
        } else {
            Some(self.price - self.open_24h)
        }
    }

    /// Percentage change against the 24h open.
    #[must_use]
    pub fn change_24h_percent(&self) -> Option<Decimal> {
        self.change_24h()
            .and_then(|change| change.checked_div(self.open_24h))
            .map(|ratio| ratio * Decimal::ONE_HUNDRED)
    }
}

/// Parse a decimal string field, returning zero for missing or malformed
/// values.
///
/// Used for statistics, where a missing field must not reject the quote.
#[must_use]
pub fn decimal_or_zero(value: Option<&str>) -> Decimal {
    value
        .and_then(|raw| Decimal::from_str(raw.trim()).ok())
        .unwrap_or(Decimal::ZERO)
}

/// Parse a mandatory price field.
///
/// Returns `None` when the field is missing, unparseable, or negative.
#[must_use]
pub fn parse_price(value: Option<&str>) -> Option<Decimal> {
    value
        .and_then(|raw| Decimal::from_str(raw.trim()).ok())
        .filter(|price| !price.is_sign_negative())
}
