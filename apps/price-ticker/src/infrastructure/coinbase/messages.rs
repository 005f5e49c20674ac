//! Coinbase Exchange Message Types
//!
//! Wire format types for the Exchange WebSocket feed and REST endpoints.
//! Numeric values arrive as decimal strings and are kept as strings here;
//! conversion to `Decimal` happens in the codec and REST adapter so that a
//! single malformed statistic cannot reject a whole message.
//!
//! # References
//!
//! - [WebSocket Feed](https://docs.cdp.coinbase.com/exchange/docs/websocket-overview)
//! - [Ticker Channel](https://docs.cdp.coinbase.com/exchange/docs/websocket-channels#ticker-channel)
//! - [Product Ticker](https://docs.cdp.coinbase.com/exchange/reference/exchangerestapi_getproductticker)

use serde::{Deserialize, Serialize};

// =============================================================================
// WebSocket Feed
// =============================================================================

/// Feed message, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Ticker update.
    Ticker(TickerMessage),
    /// Subscription confirmation.
    Subscriptions(SubscriptionsMessage),
    /// Error report.
    Error(ErrorMessage),
    /// Heartbeats, status updates, and anything else.
    #[serde(other)]
    Unknown,
}

/// Ticker channel message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TickerMessage {
    /// Product identifier, e.g. `BTC-USD`.
    pub product_id: String,
    /// Last traded price.
    #[serde(default)]
    pub price: Option<String>,
    /// Feed sequence number.
    #[serde(default)]
    pub sequence: Option<u64>,
    /// Price 24h ago.
    #[serde(default)]
    pub open_24h: Option<String>,
    /// Rolling 24h volume.
    #[serde(default)]
    pub volume_24h: Option<String>,
    /// Rolling 24h low.
    #[serde(default)]
    pub low_24h: Option<String>,
    /// Rolling 24h high.
    #[serde(default)]
    pub high_24h: Option<String>,
    /// Rolling 30 day volume.
    #[serde(default)]
    pub volume_30d: Option<String>,
    /// Best bid price.
    #[serde(default)]
    pub best_bid: Option<String>,
    /// Best bid size.
    #[serde(default)]
    pub best_bid_size: Option<String>,
    /// Best ask price.
    #[serde(default)]
    pub best_ask: Option<String>,
    /// Best ask size.
    #[serde(default)]
    pub best_ask_size: Option<String>,
    /// Aggressor side (`buy` or `sell`).
    #[serde(default)]
    pub side: Option<String>,
    /// Trade time (RFC 3339).
    #[serde(default)]
    pub time: Option<String>,
    /// Last trade identifier.
    #[serde(default)]
    pub trade_id: Option<u64>,
    /// Last trade size.
    #[serde(default)]
    pub last_size: Option<String>,
}

/// Subscription confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubscriptionsMessage {
    /// Channels now subscribed.
    #[serde(default)]
    pub channels: Vec<ChannelSubscription>,
}

impl SubscriptionsMessage {
    /// Every product across every confirmed channel, deduplicated.
    #[must_use]
    pub fn products(&self) -> Vec<String> {
        let mut products: Vec<String> = self
            .channels
            .iter()
            .flat_map(|channel| channel.product_ids.iter().cloned())
            .collect();
        products.sort();
        products.dedup();
        products
    }
}

/// One channel in a subscription confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelSubscription {
    /// Channel name.
    pub name: String,
    /// Products subscribed on this channel.
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// Error message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorMessage {
    /// Short error text.
    pub message: String,
    /// Longer explanation, if any.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Subscribe request sent after the socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    /// Always `subscribe`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Products to subscribe to.
    pub product_ids: Vec<String>,
    /// Channels to subscribe to.
    pub channels: Vec<&'static str>,
}

impl SubscribeRequest {
    /// Ticker channel subscription for a single product.
    #[must_use]
    pub fn ticker(product_id: impl Into<String>) -> Self {
        Self {
            kind: "subscribe",
            product_ids: vec![product_id.into()],
            channels: vec!["ticker"],
        }
    }
}

// =============================================================================
// REST API
// =============================================================================

/// Response of `GET /products/{id}/ticker`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductTickerResponse {
    /// Last trade identifier.
    #[serde(default)]
    pub trade_id: Option<u64>,
    /// Last traded price.
    #[serde(default)]
    pub price: Option<String>,
    /// Last trade size.
    #[serde(default)]
    pub size: Option<String>,
    /// Best bid price.
    #[serde(default)]
    pub bid: Option<String>,
    /// Best ask price.
    #[serde(default)]
    pub ask: Option<String>,
    /// 24h volume.
    #[serde(default)]
    pub volume: Option<String>,
    /// Trade time (RFC 3339).
    #[serde(default)]
    pub time: Option<String>,
}

/// Response of `GET /products/{id}/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductStatsResponse {
    /// Price 24h ago.
    #[serde(default)]
    pub open: Option<String>,
    /// 24h high.
    #[serde(default)]
    pub high: Option<String>,
    /// 24h low.
    #[serde(default)]
    pub low: Option<String>,
    /// 24h volume.
    #[serde(default)]
    pub volume: Option<String>,
    /// Last price.
    #[serde(default)]
    pub last: Option<String>,
    /// 30 day volume.
    #[serde(default)]
    pub volume_30day: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_shape() {
        let json = serde_json::to_value(SubscribeRequest::ticker("BTC-USD")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "subscribe",
                "product_ids": ["BTC-USD"],
                "channels": ["ticker"],
            })
        );
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let msg: FeedMessage =
            serde_json::from_str(r#"{"type":"heartbeat","sequence":1,"product_id":"BTC-USD"}"#)
                .unwrap();
        assert_eq!(msg, FeedMessage::Unknown);
    }

    #[test]
    fn ticker_with_missing_stats_decodes() {
        let msg: FeedMessage =
            serde_json::from_str(r#"{"type":"ticker","product_id":"BTC-USD","price":"1.5"}"#)
                .unwrap();
        let FeedMessage::Ticker(ticker) = msg else {
            panic!("expected ticker");
        };
        assert_eq!(ticker.price.as_deref(), Some("1.5"));
        assert!(ticker.volume_24h.is_none());
    }

    #[test]
    fn subscription_products_are_flattened() {
        let msg: FeedMessage = serde_json::from_str(
            r#"{"type":"subscriptions","channels":[
                {"name":"ticker","product_ids":["BTC-USD","ETH-USD"]},
                {"name":"heartbeat","product_ids":["BTC-USD"]}
            ]}"#,
        )
        .unwrap();
        let FeedMessage::Subscriptions(subs) = msg else {
            panic!("expected subscriptions");
        };
        assert_eq!(subs.products(), vec!["BTC-USD", "ETH-USD"]);
    }

    #[test]
    fn stats_tolerate_extra_fields() {
        let stats: ProductStatsResponse = serde_json::from_str(
            r#"{"open":"49000","high":"52000","low":"48000","volume":"1000","last":"51000","volume_30day":"30000","rfq_volume_24hour":"0"}"#,
        )
        .unwrap();
        assert_eq!(stats.volume_30day.as_deref(), Some("30000"));
    }
}
