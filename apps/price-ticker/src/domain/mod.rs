//! Domain Layer - Core ticker types and business rules.
//!
//! This layer contains the core domain types for the price ticker with no
//! I/O. All types here are pure Rust with serialization support.

/// Instrument and quote types.
pub mod quote;

/// Connection state, source mode, and sequential identifiers.
pub mod connection;

/// Threshold price alerts.
pub mod alerts;
