pub mod binance;
pub mod coingecko;
pub mod core;
pub mod factory;
pub mod persistence;

pub use factory::ServiceFactory;
