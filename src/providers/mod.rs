pub mod alpha_vantage;
pub mod binance;
pub mod circuit_breaker;
pub mod dedup;
pub mod http_client_factory;

pub use alpha_vantage::AlphaVantageProvider;
pub use binance::BinanceProvider;
