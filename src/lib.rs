// Core modules
pub mod api;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod execution;
pub mod market;
pub mod models;
pub mod server;

// Re-export commonly used types
pub use api::BinanceClient;
pub use config::AppConfig;
pub use discovery::ListingMonitor;
pub use engine::TradingEngine;
pub use error::{ErrorKind, ExchangeError};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, ExchangeError>;
