// Market data domain
pub mod price;
pub mod provider;
pub mod timeframe;

pub use price::{PriceRow, PriceTable, RawFrame};
pub use provider::{DataProvider, Region};
pub use timeframe::Timeframe;
