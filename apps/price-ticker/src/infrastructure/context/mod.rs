//! Application Context
//!
//! Owns the process-wide pieces created at startup: configuration,
//! platform capabilities, the telemetry guard, and the price alert book.
//! Created once in `main`, passed by reference, and disposed explicitly.

use std::sync::Arc;

use crate::application::services::TickerSnapshot;
use crate::domain::alerts::{AlertBook, TriggeredAlert};
use crate::domain::quote::Instrument;
use crate::infrastructure::config::{PlatformCapabilities, TickerConfig};
use crate::infrastructure::telemetry::TelemetryGuard;

/// Application context.
#[derive(Debug)]
pub struct AppContext {
    config: TickerConfig,
    alerts: Arc<AlertBook>,
    telemetry: TelemetryGuard,
}

impl AppContext {
    /// Build the context, arming the configured alerts.
    #[must_use]
    pub fn new(config: TickerConfig, telemetry: TelemetryGuard) -> Self {
        let alerts = Arc::new(AlertBook::with_conditions(config.alerts.iter().copied()));
        Self {
            config,
            alerts,
            telemetry,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &TickerConfig {
        &self.config
    }

    /// Get the platform capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> PlatformCapabilities {
        self.config.capabilities
    }

    /// Get the alert book.
    #[must_use]
    pub fn alerts(&self) -> Arc<AlertBook> {
        Arc::clone(&self.alerts)
    }

    /// Instrument the alerts were configured for.
    #[must_use]
    pub const fn alert_instrument(&self) -> &Instrument {
        &self.config.instrument
    }

    /// Evaluate alerts against a new snapshot and report those that fired.
    ///
    /// Alerts only apply to the configured instrument.
    pub fn on_snapshot(&self, snapshot: &TickerSnapshot) -> Vec<TriggeredAlert> {
        let Some(price) = snapshot.price else {
            return Vec::new();
        };
        if snapshot.instrument.as_ref() != Some(self.alert_instrument()) {
            return Vec::new();
        }

        let fired = self.alerts.evaluate(price);
        for alert in &fired {
            if self.capabilities().can_notify {
                tracing::warn!(
                    alert_id = alert.id,
                    condition = %alert.condition,
                    price = %alert.price,
                    notify = true,
                    "Price alert triggered"
                );
            } else {
                tracing::info!(
                    alert_id = alert.id,
                    condition = %alert.condition,
                    price = %alert.price,
                    "Price alert triggered"
                );
            }
        }
        fired
    }

    /// Re-arm alerts that already fired so they can trigger again.
    pub fn rearm_alerts(&self) -> usize {
        let rearmed = self.alerts.rearm_all();
        tracing::info!(rearmed, total = self.alerts.len(), "Price alerts re-armed");
        rearmed
    }

    /// Release everything the context owns, flushing telemetry last.
    pub fn dispose(self) {
        tracing::info!(
            alerts = self.alerts.len(),
            exporting = self.telemetry.is_exporting(),
            "Disposing application context"
        );
        drop(self.alerts);
        drop(self.telemetry);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::alerts::AlertCondition;

    fn context(alerts: &str) -> AppContext {
        let config = TickerConfig::from_lookup(|key| {
            (key == "TICKER_ALERTS").then(|| alerts.to_string())
        })
        .unwrap();
        AppContext::new(config, TelemetryGuard::disabled())
    }

    fn snapshot(instrument: &str, price: i64) -> TickerSnapshot {
        TickerSnapshot {
            instrument: Some(Instrument::new(instrument).unwrap()),
            price: Some(Decimal::from(price)),
            ..TickerSnapshot::default()
        }
    }

    #[test]
    fn alerts_fire_once() {
        let ctx = context("above:100,below:50");
        assert_eq!(ctx.alerts().len(), 2);

        assert!(ctx.on_snapshot(&snapshot("BTC-USD", 75)).is_empty());

        let fired = ctx.on_snapshot(&snapshot("BTC-USD", 120));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].condition, AlertCondition::Above(Decimal::from(100)));

        assert!(ctx.on_snapshot(&snapshot("BTC-USD", 130)).is_empty());
    }

    #[test]
    fn rearmed_alerts_fire_again() {
        let ctx = context("below:50");
        assert_eq!(ctx.on_snapshot(&snapshot("BTC-USD", 40)).len(), 1);
        assert!(ctx.on_snapshot(&snapshot("BTC-USD", 30)).is_empty());

        assert_eq!(ctx.rearm_alerts(), 1);
        assert_eq!(ctx.on_snapshot(&snapshot("BTC-USD", 30)).len(), 1);
    }

    #[test]
    fn other_instruments_do_not_trigger() {
        let ctx = context("above:100");
        assert!(ctx.on_snapshot(&snapshot("ETH-USD", 500)).is_empty());
        assert!(ctx.on_snapshot(&TickerSnapshot::default()).is_empty());
    }

    #[test]
    fn capabilities_default_off() {
        let ctx = context("");
        assert_eq!(ctx.capabilities(), PlatformCapabilities::default());
        ctx.dispose();
    }
}
