//! Price Alert Types
//!
//! Threshold alerts evaluated against each new visible price.
//!
//! # Design
//!
//! The alert book tracks:
//! - Which thresholds are configured for the active instrument
//! - Whether each alert has already fired (alerts are one-shot)
//!
//! An alert fires on the first price at or beyond its threshold and stays
//! triggered until it is re-armed.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use rust_decimal::Decimal;

// =============================================================================
// Types
// =============================================================================

/// Identifier of an alert within a book.
pub type AlertId = u64;

/// Threshold condition for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCondition {
    /// Fires when the price rises to or above the threshold.
    Above(Decimal),
    /// Fires when the price falls to or below the threshold.
    Below(Decimal),
}

impl AlertCondition {
    /// Check whether a price satisfies the condition.
    #[must_use]
    pub fn is_met(&self, price: Decimal) -> bool {
        match self {
            Self::Above(threshold) => price >= *threshold,
            Self::Below(threshold) => price <= *threshold,
        }
    }

    /// Get the threshold price.
    #[must_use]
    pub const fn threshold(&self) -> Decimal {
        match self {
            Self::Above(threshold) | Self::Below(threshold) => *threshold,
        }
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above(threshold) => write!(f, "above {threshold}"),
            Self::Below(threshold) => write!(f, "below {threshold}"),
        }
    }
}

impl FromStr for AlertCondition {
    type Err = AlertParseError;

    /// Parse `above:<price>` or `below:<price>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (direction, raw_price) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AlertParseError::Format(s.to_string()))?;

        let threshold = Decimal::from_str(raw_price.trim())
            .map_err(|_| AlertParseError::Price(raw_price.to_string()))?;

        match direction.trim().to_lowercase().as_str() {
            "above" => Ok(Self::Above(threshold)),
            "below" => Ok(Self::Below(threshold)),
            other => Err(AlertParseError::Direction(other.to_string())),
        }
    }
}

/// Error parsing an alert specification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertParseError {
    /// Specification was not `direction:price`.
    #[error("expected 'above:<price>' or 'below:<price>', got {0:?}")]
    Format(String),
    /// Direction was neither `above` nor `below`.
    #[error("unknown alert direction: {0:?}")]
    Direction(String),
    /// Price was not a decimal.
    #[error("invalid alert price: {0:?}")]
    Price(String),
}

/// Parse a comma-separated list of alert specifications.
///
/// # Errors
///
/// Returns the first specification that fails to parse.
pub fn parse_conditions(spec: &str) -> Result<Vec<AlertCondition>, AlertParseError> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(AlertCondition::from_str)
        .collect()
}

/// A configured alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceAlert {
    /// Alert identifier.
    pub id: AlertId,
    /// Threshold condition.
    pub condition: AlertCondition,
    /// Whether the alert has already fired.
    pub triggered: bool,
}

/// An alert that fired on a price update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredAlert {
    /// Alert identifier.
    pub id: AlertId,
    /// Condition that was met.
    pub condition: AlertCondition,
    /// Price that met the condition.
    pub price: Decimal,
}

// =============================================================================
// Alert Book
// =============================================================================

#[derive(Debug, Default)]
struct AlertBookInner {
    alerts: Vec<PriceAlert>,
    next_id: AlertId,
}

/// Thread-safe collection of price alerts.
#[derive(Debug, Default)]
pub struct AlertBook {
    inner: RwLock<AlertBookInner>,
}

impl AlertBook {
    /// Create an empty alert book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a book pre-populated with conditions.
    #[must_use]
    pub fn with_conditions(conditions: impl IntoIterator<Item = AlertCondition>) -> Self {
        let book = Self::new();
        for condition in conditions {
            book.add(condition);
        }
        book
    }

    /// Add an alert, returning its identifier.
    pub fn add(&self, condition: AlertCondition) -> AlertId {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.alerts.push(PriceAlert {
            id,
            condition,
            triggered: false,
        });
        id
    }

    /// Re-arm every triggered alert, returning how many were re-armed.
    pub fn rearm_all(&self) -> usize {
        let mut inner = self.inner.write();
        let mut rearmed = 0;
        for alert in inner.alerts.iter_mut().filter(|alert| alert.triggered) {
            alert.triggered = false;
            rearmed += 1;
        }
        rearmed
    }

    /// Evaluate a new price, returning alerts that fired on it.
    pub fn evaluate(&self, price: Decimal) -> Vec<TriggeredAlert> {
        let mut inner = self.inner.write();
        let mut fired = Vec::new();

        for alert in inner.alerts.iter_mut().filter(|alert| !alert.triggered) {
            if alert.condition.is_met(price) {
                alert.triggered = true;
                fired.push(TriggeredAlert {
                    id: alert.id,
                    condition: alert.condition,
                    price,
                });
            }
        }

        fired
    }

    /// Snapshot of all alerts.
    #[must_use]
    pub fn alerts(&self) -> Vec<PriceAlert> {
        self.inner.read().alerts.clone()
    }

    /// Number of configured alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().alerts.len()
    }

    /// Check if the book has no alerts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    #[test]
    fn parse_alert_specs() {
        let parsed = parse_conditions("above:60000, below:40000.5").unwrap();
        assert_eq!(
            parsed,
            vec![
                AlertCondition::Above(dec(60_000)),
                AlertCondition::Below(Decimal::new(400_005, 1)),
            ]
        );
        assert!(parse_conditions("").unwrap().is_empty());
    }

    #[test]
    fn parse_alert_errors() {
        assert!(matches!(
            "sideways:1".parse::<AlertCondition>(),
            Err(AlertParseError::Direction(_))
        ));
        assert!(matches!(
            "above:lots".parse::<AlertCondition>(),
            Err(AlertParseError::Price(_))
        ));
        assert!(matches!(
            "60000".parse::<AlertCondition>(),
            Err(AlertParseError::Format(_))
        ));
    }

    #[test]
    fn alerts_fire_once() {
        let book = AlertBook::with_conditions([
            AlertCondition::Above(dec(100)),
            AlertCondition::Below(dec(50)),
        ]);

        assert!(book.evaluate(dec(75)).is_empty());

        let fired = book.evaluate(dec(100));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].condition, AlertCondition::Above(dec(100)));

        // Already triggered
        assert!(book.evaluate(dec(120)).is_empty());

        let fired = book.evaluate(dec(40));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].price, dec(40));
    }

    #[test]
    fn rearm_allows_refire() {
        let book = AlertBook::with_conditions([AlertCondition::Above(dec(10))]);
        assert_eq!(book.evaluate(dec(11)).len(), 1);
        assert_eq!(book.rearm_all(), 1);
        assert_eq!(book.rearm_all(), 0);
        assert_eq!(book.evaluate(dec(12)).len(), 1);
    }

    #[test]
    fn added_alerts_get_distinct_ids() {
        let book = AlertBook::new();
        assert!(book.is_empty());
        let first = book.add(AlertCondition::Below(dec(1)));
        let second = book.add(AlertCondition::Above(dec(2)));
        assert_ne!(first, second);
        assert_eq!(book.len(), 2);
        assert!(book.alerts().iter().all(|alert| !alert.triggered));
    }

    #[test]
    fn condition_display() {
        assert_eq!(AlertCondition::Above(dec(5)).to_string(), "above 5");
        assert_eq!(AlertCondition::Below(dec(5)).threshold(), dec(5));
    }
}
