pub mod adapter;
pub mod client;

pub use adapter::{CoinGeckoFeedAdapter, parse_ohlc};
pub use client::{CoinGeckoHistorySource, coin_id};
