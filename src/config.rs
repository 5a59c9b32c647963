// Application configuration: file + environment, with defaults for every key
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExchangeError;
use crate::models::{PositionSide, WorkingType};

const ENV_PREFIX: &str = "LISTING_TRADER";

/// Which order API family the account uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    /// USDⓈ-M futures account (`/fapi`)
    #[default]
    #[serde(alias = "fapi")]
    Dedicated,
    /// Portfolio margin / unified account (`/papi`)
    #[serde(alias = "papi")]
    Unified,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub binance: BinanceSettings,
    pub trading: TradingSettings,
    pub monitor: MonitorSettings,
    pub retry: RetrySettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceSettings {
    pub api_key: String,
    pub secret_key: String,
    pub account_mode: AccountMode,
    /// Order endpoint host; empty means the account mode's default
    pub base_url: String,
    /// Catalogue and ticker host, never account-mode specific
    pub market_data_url: String,
    pub recv_window_ms: u64,
    pub request_timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            account_mode: AccountMode::Dedicated,
            base_url: String::new(),
            market_data_url: crate::api::binance::FUTURES_BASE_URL.to_string(),
            recv_window_ms: 10_000,
            request_timeout_secs: 30,
            requests_per_minute: 1200,
        }
    }
}

impl BinanceSettings {
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingSettings {
    /// Quote-currency amount used when a trigger does not name one
    pub default_notional: String,
    pub position_side: PositionSide,
    /// Place bracket orders for every newly discovered symbol
    pub auto_trade: bool,
    pub stop_loss: BracketLegSettings,
    pub take_profit: BracketLegSettings,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            default_notional: "10".to_string(),
            position_side: PositionSide::Both,
            auto_trade: false,
            stop_loss: BracketLegSettings {
                enabled: true,
                percent: Decimal::from(2),
                working_type: WorkingType::MarkPrice,
            },
            take_profit: BracketLegSettings {
                enabled: true,
                percent: Decimal::from(5),
                working_type: WorkingType::MarkPrice,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketLegSettings {
    pub enabled: bool,
    /// Distance from the entry price in percent (2.0 = 2%)
    pub percent: Decimal,
    pub working_type: WorkingType,
}

impl Default for BracketLegSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            percent: Decimal::ZERO,
            working_type: WorkingType::MarkPrice,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_secs: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 8081 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// trace, debug, info, warn or error (any EnvFilter directive works)
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load `path` (if it exists) and overlay `LISTING_TRADER__*` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        }

        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject settings no request could ever succeed with.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        let notional = Decimal::from_str(self.trading.default_notional.trim()).map_err(|_| {
            ExchangeError::validation(format!(
                "trading.default_notional is not a number: {:?}",
                self.trading.default_notional
            ))
        })?;
        if notional <= Decimal::ZERO {
            return Err(ExchangeError::validation(
                "trading.default_notional must be positive",
            ));
        }
        if self.trading.stop_loss.percent < Decimal::ZERO
            || self.trading.take_profit.percent < Decimal::ZERO
        {
            return Err(ExchangeError::validation(
                "stop-loss and take-profit percentages must not be negative",
            ));
        }
        if self.trading.take_profit.enabled && self.trading.take_profit.percent >= Decimal::ONE_HUNDRED {
            return Err(ExchangeError::validation(
                "trading.take_profit.percent must be below 100",
            ));
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(ExchangeError::validation(
                "monitor.poll_interval_secs must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ExchangeError::validation(
                "retry.max_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn trading_enabled(&self) -> bool {
        self.binance.has_credentials()
    }
}
