pub mod binance;
pub mod retry;
pub mod signing;
pub mod types;

pub use binance::BinanceClient;
pub use retry::{retry_with_backoff, RetryConfig};
