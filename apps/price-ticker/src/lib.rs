#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::similar_names
    )
)]

//! Price Ticker - Live Quote Connection Manager
//!
//! Keeps a continuously updated price for one crypto instrument by layering
//! a WebSocket ticker subscription over REST polling. Polling fills the gap
//! until the stream delivers; the stream takes over once it does; polling
//! comes back when the stream gives up after its bounded reconnects.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `quote`: Instruments and normalized quotes
//!   - `connection`: Connection state, source mode, and sequential ids
//!   - `alerts`: Threshold price alerts
//!
//! - **Application**: State machines and port definitions
//!   - `ports`: REST quote fetching and feed wire format
//!   - `services`: Ticker manager, streaming client, reconnect policy, polling
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `coinbase`: REST fetcher, feed codec, socket transport
//!   - `runtime`: Single-task async driver for the state machine
//!   - `config`: Environment configuration
//!   - `context`: Application context
//!   - `telemetry`: Logging and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//! REST API ──── fetch ────┐
//!                         ├──▶ TickerManager ──▶ TickerSnapshot (watch)
//! WS feed ──── socket ────┘         │
//!      ▲                            │
//!      └───── timers / commands ────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core ticker types with no external dependencies.
pub mod domain;

/// Application layer - State machines and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::alerts::{AlertBook, AlertCondition, TriggeredAlert};
pub use domain::connection::{ConnectionState, SourceMode};
pub use domain::quote::{Instrument, InstrumentError, Quote, Side};

// Ports
pub use application::ports::{FetchError, QuoteFetcher};

// State machine
pub use application::services::{TickerManager, TickerManagerConfig, TickerSnapshot};

// Infrastructure
pub use infrastructure::coinbase::{CoinbaseCodec, RestQuoteFetcher};
pub use infrastructure::config::{ConfigError, PlatformCapabilities, TickerConfig};
pub use infrastructure::context::AppContext;
pub use infrastructure::runtime::{RuntimeError, TickerHandle, TickerRuntime};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
