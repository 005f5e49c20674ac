//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the ticker state machines and the port interfaces
//! that define how they reach the price API.

/// Port interfaces for external systems (REST quotes, feed wire format).
pub mod ports;

/// Ticker state machines.
pub mod services;
