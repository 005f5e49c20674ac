//! Application Services
//!
//! Pure state machines that decide what the ticker does. None of them
//! perform I/O; they emit [`commands::Command`]s for the runtime.
//!
//! - `TickerManager`: Orchestrates polling and streaming, owns the read model
//! - `StreamingClient`: WebSocket lifecycle, watchdog, and subscription
//! - `ReconnectPolicy`: Bounded exponential backoff after abnormal closes
//! - `PollingSchedule`: Fixed-cadence REST polling with stale-fetch filtering

pub mod commands;
pub mod polling;
pub mod reconnect;
pub mod streaming;
pub mod ticker;

pub use commands::{Command, Effects, Event, TimerKind};
pub use polling::{DEFAULT_POLL_INTERVAL, PollingSchedule};
pub use reconnect::{
    CloseClass, CloseRecord, ReconnectConfig, ReconnectDecision, ReconnectPolicy, describe_close,
};
pub use streaming::{StreamSignal, StreamingClient, StreamingConfig};
pub use ticker::{
    FETCH_FAILED_MESSAGE, TickerManager, TickerManagerConfig, TickerSnapshot, rate_limited_message,
};
