//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, and the async runtime that drives the
//! ticker state machine.

/// Coinbase Exchange adapters (REST quotes, WebSocket feed).
pub mod coinbase;

/// Async driver for the ticker state machine.
pub mod runtime;

/// Configuration loading.
pub mod config;

/// Application context owned by the binary.
pub mod context;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
