//! Connection Types
//!
//! Identifiers and state enums shared by the ticker state machine and the
//! runtime that drives it.

use std::fmt;

use serde::Serialize;

/// Lifecycle of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection has been attempted yet.
    #[default]
    Idle,
    /// Socket created, waiting for the open event.
    Connecting,
    /// Socket open and subscribed.
    Open,
    /// Socket closed (normally or not).
    Closed,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Which producer currently owns the visible quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// REST polling is authoritative.
    #[default]
    Polling,
    /// The WebSocket ticker is authoritative.
    Streaming,
}

impl SourceMode {
    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Streaming => "streaming",
        }
    }
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

sequential_id!(
    /// Identifies one socket instance. Events from any other instance are stale.
    ConnectionId,
    "conn"
);

sequential_id!(
    /// Identifies one scheduled timer. Firings of cancelled timers are stale.
    TimerId,
    "timer"
);

sequential_id!(
    /// Identifies one REST fetch, ordered by issue time.
    FetchId,
    "fetch"
);

/// Allocator for monotonically increasing identifiers.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create an allocator starting at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate the next raw identifier.
    pub const fn next_raw(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    /// Allocate a connection identifier.
    pub const fn connection(&mut self) -> ConnectionId {
        ConnectionId::new(self.next_raw())
    }

    /// Allocate a timer identifier.
    pub const fn timer(&mut self) -> TimerId {
        TimerId::new(self.next_raw())
    }

    /// Allocate a fetch identifier.
    pub const fn fetch(&mut self) -> FetchId {
        FetchId::new(self.next_raw())
    }
}
