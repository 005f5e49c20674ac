//! Polling Schedule
//!
//! REST polling cadence: one fetch immediately on activation, then one per
//! interval until deactivated. There is no backoff, not even on rate
//! limiting; the cadence stays fixed.
//!
//! Each activation opens a new session. Fetches issued by an earlier
//! session, and successful fetches older than the last applied one, are
//! stale and must not overwrite the visible quote.

use std::time::Duration;

use super::commands::{Effects, TimerKind};
use crate::domain::connection::{FetchId, TimerId};
use crate::domain::quote::Instrument;

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// State of the REST polling loop.
#[derive(Debug)]
pub struct PollingSchedule {
    interval: Duration,
    active: bool,
    timer: Option<TimerId>,
    session_start: Option<FetchId>,
    last_applied: Option<FetchId>,
}

impl Default for PollingSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollingSchedule {
    /// Create an inactive schedule.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: false,
            timer: None,
            session_start: None,
            last_applied: None,
        }
    }

    /// Check whether polling is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Start polling: fetch now and arm the first tick.
    ///
    /// Returns `false` if polling was already active.
    pub fn activate(&mut self, instrument: &Instrument, fx: &mut Effects) -> bool {
        if self.active {
            return false;
        }

        self.active = true;
        let fetch = fx.fetch(instrument);
        self.session_start = Some(fetch);
        self.timer = Some(fx.schedule(TimerKind::Poll, self.interval));

        tracing::info!(
            instrument = %instrument,
            interval_ms = self.interval.as_millis(),
            "REST polling activated"
        );
        true
    }

    /// Stop polling and invalidate every outstanding fetch.
    ///
    /// Returns `false` if polling was already inactive.
    pub fn deactivate(&mut self, fx: &mut Effects) -> bool {
        if !self.active {
            return false;
        }

        self.active = false;
        fx.cancel(self.timer.take());
        self.session_start = None;

        tracing::info!("REST polling deactivated");
        true
    }

    /// Handle a timer firing.
    ///
    /// Returns `false` if the timer is not the current poll tick.
    pub fn on_timer(&mut self, timer: TimerId, instrument: &Instrument, fx: &mut Effects) -> bool {
        if !self.active || self.timer != Some(timer) {
            return false;
        }

        fx.fetch(instrument);
        self.timer = Some(fx.schedule(TimerKind::Poll, self.interval));
        true
    }

    /// Check whether a fetch belongs to the running session.
    #[must_use]
    pub fn is_current(&self, fetch: FetchId) -> bool {
        self.active && self.session_start.is_some_and(|start| fetch >= start)
    }

    /// Check whether a fetch is newer than the last one applied.
    #[must_use]
    pub fn is_latest(&self, fetch: FetchId) -> bool {
        self.last_applied.is_none_or(|last| fetch > last)
    }

    /// Record a successful fetch, returning whether its quote may be shown.
    ///
    /// Rejects fetches from an earlier session and fetches older than the
    /// last one applied.
    pub fn accept(&mut self, fetch: FetchId) -> bool {
        if !self.is_current(fetch) {
            return false;
        }
        if !self.is_latest(fetch) {
            return false;
        }
        self.last_applied = Some(fetch);
        true
    }

    /// Forget applied-fetch ordering (new instrument).
    pub const fn reset_ordering(&mut self) {
        self.last_applied = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::commands::Command;

    fn btc() -> Instrument {
        Instrument::new("BTC-USD").unwrap()
    }

    fn fetch_ids(commands: &[Command]) -> Vec<FetchId> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Fetch { fetch, .. } => Some(*fetch),
                _ => None,
            })
            .collect()
    }

    fn poll_timer(commands: &[Command]) -> Option<TimerId> {
        commands.iter().find_map(|c| match c {
            Command::ScheduleTimer {
                timer,
                kind: TimerKind::Poll,
                ..
            } => Some(*timer),
            _ => None,
        })
    }

    #[test]
    fn activation_fetches_immediately_and_arms_tick() {
        let mut fx = Effects::new();
        let mut polling = PollingSchedule::default();

        assert!(polling.activate(&btc(), &mut fx));
        let commands = fx.drain();

        assert_eq!(fetch_ids(&commands).len(), 1);
        assert!(matches!(
            commands[1],
            Command::ScheduleTimer {
                kind: TimerKind::Poll,
                delay,
                ..
            } if delay == Duration::from_secs(5)
        ));
        assert!(polling.is_active());

        // Idempotent
        assert!(!polling.activate(&btc(), &mut fx));
        assert!(fx.drain().is_empty());
    }

    #[test]
    fn tick_fetches_and_rearms() {
        let mut fx = Effects::new();
        let mut polling = PollingSchedule::default();
        polling.activate(&btc(), &mut fx);
        let timer = poll_timer(&fx.drain()).unwrap();

        assert!(polling.on_timer(timer, &btc(), &mut fx));
        let commands = fx.drain();
        assert_eq!(fetch_ids(&commands).len(), 1);
        let next = poll_timer(&commands).unwrap();
        assert_ne!(next, timer);

        // Old timer is stale now
        assert!(!polling.on_timer(timer, &btc(), &mut fx));
    }

    #[test]
    fn deactivation_cancels_tick_and_invalidates_fetches() {
        let mut fx = Effects::new();
        let mut polling = PollingSchedule::default();
        polling.activate(&btc(), &mut fx);
        let commands = fx.drain();
        let fetch = fetch_ids(&commands)[0];
        let timer = poll_timer(&commands).unwrap();

        assert!(polling.deactivate(&mut fx));
        assert_eq!(fx.drain(), vec![Command::CancelTimer { timer }]);
        assert!(!polling.is_current(fetch));
        assert!(!polling.accept(fetch));
        assert!(!polling.deactivate(&mut fx));
    }

    #[test]
    fn previous_session_fetches_are_stale() {
        let mut fx = Effects::new();
        let mut polling = PollingSchedule::default();
        polling.activate(&btc(), &mut fx);
        let old = fetch_ids(&fx.drain())[0];
        polling.deactivate(&mut fx);
        polling.activate(&btc(), &mut fx);
        let new = fetch_ids(&fx.drain())[0];

        assert!(!polling.accept(old));
        assert!(polling.accept(new));
    }

    #[test]
    fn older_fetch_never_overwrites_newer() {
        let mut fx = Effects::new();
        let mut polling = PollingSchedule::default();
        polling.activate(&btc(), &mut fx);
        let first = fetch_ids(&fx.drain())[0];
        let timer = polling.timer.unwrap();
        polling.on_timer(timer, &btc(), &mut fx);
        let second = fetch_ids(&fx.drain())[0];

        assert!(polling.accept(second));
        assert!(!polling.accept(first));
    }

    #[test]
    fn outcome_older_than_applied_fetch_is_not_latest() {
        let mut fx = Effects::new();
        let mut polling = PollingSchedule::default();
        polling.activate(&btc(), &mut fx);
        let first = fetch_ids(&fx.drain())[0];
        assert!(polling.is_latest(first));

        let timer = polling.timer.unwrap();
        polling.on_timer(timer, &btc(), &mut fx);
        let second = fetch_ids(&fx.drain())[0];
        polling.accept(second);

        assert!(polling.is_current(first));
        assert!(!polling.is_latest(first));
        assert!(!polling.is_latest(second));
    }
}
