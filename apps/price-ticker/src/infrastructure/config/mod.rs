//! Configuration Module
//!
//! Configuration loading for the price ticker.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_INSTRUMENT, FeedSettings, PlatformCapabilities, TickerConfig,
    TimingSettings,
};
