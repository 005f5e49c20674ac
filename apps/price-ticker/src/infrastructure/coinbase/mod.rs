//! Coinbase Exchange Adapters
//!
//! Concrete adapters for the Exchange public market data API:
//!
//! - **REST**: product ticker and stats, used by polling
//! - **WebSocket**: ticker channel feed (JSON codec) and socket transport

pub mod codec;
pub mod messages;
pub mod rest;
pub mod socket;

pub use codec::CoinbaseCodec;
pub use messages::{FeedMessage, SubscribeRequest, TickerMessage};
pub use rest::{RestFetcherConfig, RestQuoteFetcher};
pub use socket::{Outbound, SocketHandle};
