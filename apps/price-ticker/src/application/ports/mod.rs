//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `QuoteFetcher`: one-shot REST quote retrieval used by polling
//! - `FeedCodec`: wire format of the streaming ticker feed

use async_trait::async_trait;

use crate::domain::quote::{Instrument, Quote};

/// Fetches a single quote-plus-stats snapshot for an instrument.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Fetch the current quote.
    ///
    /// # Errors
    ///
    /// Returns a `FetchError` when the primary quote request fails or its
    /// payload carries no usable price. Failures of the secondary stats
    /// request are not errors.
    async fn fetch(&self, instrument: &Instrument) -> Result<Quote, FetchError>;
}

/// Failure of a polling fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Upstream answered HTTP 429.
    #[error("rate limited by upstream")]
    RateLimited,

    /// Upstream answered a non-success status.
    #[error("upstream returned status {status}")]
    Upstream {
        /// HTTP status code.
        status: u16,
    },

    /// Response carried no parseable price.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Request never produced a response.
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Check if this is a rate limit error.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

/// Decoded streaming feed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Ticker update, already normalized.
    Ticker(Quote),
    /// Subscription confirmation listing the subscribed products.
    Subscriptions {
        /// Product identifiers the feed confirmed.
        products: Vec<String>,
    },
    /// Error reported by the feed.
    Error {
        /// Feed-provided message text.
        message: String,
    },
    /// Any other message type.
    Other,
}

/// Wire format of the streaming feed.
pub trait FeedCodec: Send + Sync + std::fmt::Debug {
    /// Build the subscribe request sent right after the socket opens.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be serialized.
    fn subscribe_request(&self, instrument: &Instrument) -> Result<String, CodecError>;

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed frames or tickers without a usable
    /// price.
    fn decode(&self, text: &str) -> Result<FeedEvent, CodecError>;
}

/// Feed codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ticker carried no parseable price.
    #[error("invalid price in {product}: {raw:?}")]
    InvalidPrice {
        /// Product the ticker was for.
        product: String,
        /// Raw price field, if present.
        raw: Option<String>,
    },

    /// Product identifier was not a valid instrument.
    #[error("invalid product id: {0}")]
    InvalidProduct(String),

    /// Frame was valid JSON but not a message object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}
