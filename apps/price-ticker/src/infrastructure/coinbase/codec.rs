//! Feed Codec
//!
//! JSON codec for the Coinbase Exchange WebSocket feed. Ticker messages are
//! normalized into domain [`Quote`]s here: the price is mandatory, every
//! statistic falls back to zero.

use chrono::{DateTime, Utc};

use crate::application::ports::{CodecError, FeedCodec, FeedEvent};
use crate::domain::quote::{Instrument, Quote, Side, decimal_or_zero, parse_price};
use crate::infrastructure::coinbase::messages::{FeedMessage, SubscribeRequest, TickerMessage};

/// JSON codec for the Exchange ticker feed.
#[derive(Debug, Default, Clone)]
pub struct CoinbaseCodec;

impl CoinbaseCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn normalize(ticker: TickerMessage) -> Result<Quote, CodecError> {
        let instrument = Instrument::new(&ticker.product_id)
            .map_err(|_| CodecError::InvalidProduct(ticker.product_id.clone()))?;

        let price =
            parse_price(ticker.price.as_deref()).ok_or_else(|| CodecError::InvalidPrice {
                product: ticker.product_id.clone(),
                raw: ticker.price.clone(),
            })?;

        Ok(Quote {
            instrument,
            price,
            time: parse_time(ticker.time.as_deref()),
            sequence: ticker.sequence.unwrap_or_default(),
            trade_id: ticker.trade_id.unwrap_or_default(),
            side: parse_side(ticker.side.as_deref()),
            last_size: decimal_or_zero(ticker.last_size.as_deref()),
            best_bid: decimal_or_zero(ticker.best_bid.as_deref()),
            best_bid_size: decimal_or_zero(ticker.best_bid_size.as_deref()),
            best_ask: decimal_or_zero(ticker.best_ask.as_deref()),
            best_ask_size: decimal_or_zero(ticker.best_ask_size.as_deref()),
            volume_24h: decimal_or_zero(ticker.volume_24h.as_deref()),
            low_24h: decimal_or_zero(ticker.low_24h.as_deref()),
            high_24h: decimal_or_zero(ticker.high_24h.as_deref()),
            volume_30d: decimal_or_zero(ticker.volume_30d.as_deref()),
            open_24h: decimal_or_zero(ticker.open_24h.as_deref()),
        })
    }
}

impl FeedCodec for CoinbaseCodec {
    fn subscribe_request(&self, instrument: &Instrument) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&SubscribeRequest::ticker(
            instrument.as_str(),
        ))?)
    }

    fn decode(&self, text: &str) -> Result<FeedEvent, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                text.chars().take(50).collect::<String>()
            )));
        }

        Ok(match serde_json::from_value(value)? {
            FeedMessage::Ticker(ticker) => FeedEvent::Ticker(Self::normalize(ticker)?),
            FeedMessage::Subscriptions(subs) => FeedEvent::Subscriptions {
                products: subs.products(),
            },
            FeedMessage::Error(error) => FeedEvent::Error {
                message: error.message,
            },
            FeedMessage::Unknown => FeedEvent::Other,
        })
    }
}

/// Parse an RFC 3339 timestamp, ignoring malformed values.
pub(crate) fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc))
}

fn parse_side(value: Option<&str>) -> Option<Side> {
    match value {
        Some("buy") => Some(Side::Buy),
        Some("sell") => Some(Side::Sell),
        _ => None,
    }
}
