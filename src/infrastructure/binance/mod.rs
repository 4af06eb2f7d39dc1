pub mod archive;
pub mod market_data;

pub use archive::ArchiveFeedAdapter;
pub use market_data::{BinanceHistorySource, BinanceHistorySourceBuilder};
