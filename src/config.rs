//! Layered runtime settings
//!
//! Built-in defaults, then an optional TOML file, then `SCANBOT_*`
//! environment variables (`__` between section and key, commas in lists):
//!
//! ```text
//! SCANBOT_SCANNER__SYMBOLS=BTCUSDT,SOLUSDT
//! SCANBOT_SCANNER__POLL_INTERVAL_SECS=30
//! SCANBOT_TELEGRAM__TOKEN=123:abc
//! ```

use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::api::binance::BINANCE_API_BASE;
use crate::api::telegram::TELEGRAM_API_BASE;
use crate::error::ScanError;
use crate::models::Timeframe;
use crate::scanner::ScanPair;
use crate::strategy::SignalConfig;
use crate::subscribers::RecipientId;
use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "scanbot";
pub const ENV_PREFIX: &str = "SCANBOT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub candle_limit: usize,
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            timeframes: vec![
                Timeframe::M1,
                Timeframe::M5,
                Timeframe::M15,
                Timeframe::M30,
                Timeframe::H1,
                Timeframe::H4,
            ],
            candle_limit: 100,
            poll_interval_secs: 10,
            fetch_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BinanceSettings {
    pub base_url: String,
    /// Request weight budget per minute
    pub requests_per_minute: u32,
    pub max_retries: u32,
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            base_url: BINANCE_API_BASE.to_string(),
            requests_per_minute: 1200,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub token: String,
    pub base_url: String,
    pub admin_ids: Vec<String>,
    pub admin_name: String,
    pub poll_timeout_secs: u64,
    pub max_concurrent_sends: usize,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: TELEGRAM_API_BASE.to_string(),
            admin_ids: Vec::new(),
            admin_name: "Admin".to_string(),
            poll_timeout_secs: 30,
            max_concurrent_sends: 8,
        }
    }
}

impl TelegramSettings {
    pub fn admins(&self) -> Vec<RecipientId> {
        self.admin_ids.iter().map(|id| RecipientId::new(id.as_str())).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scanner: ScannerSettings,
    pub strategy: SignalConfig,
    pub binance: BinanceSettings,
    pub telegram: TelegramSettings,
}

impl Settings {
    /// Load settings from `path` (or `scanbot.toml` if present) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scanner.symbols")
            .with_list_parse_key("scanner.timeframes")
            .with_list_parse_key("telegram.admin_ids");

        let mut settings: Settings = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.apply_legacy_env(|key| std::env::var(key).ok());
        settings.normalize();
        Ok(settings)
    }

    /// Fill an empty token or admin list from `TELEGRAM_TOKEN` / `ADMIN_CHAT_ID`
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.telegram.token.trim().is_empty() {
            if let Some(token) = lookup("TELEGRAM_TOKEN") {
                self.telegram.token = token.trim().to_string();
            }
        }

        if self.telegram.admin_ids.is_empty() {
            if let Some(admin) = lookup("ADMIN_CHAT_ID").filter(|id| !id.trim().is_empty()) {
                self.telegram.admin_ids.push(admin.trim().to_string());
            }
        }
    }

    /// Symbols are exchange tickers, so compare them upper-case
    fn normalize(&mut self) {
        for symbol in &mut self.scanner.symbols {
            *symbol = symbol.trim().to_uppercase();
        }
        self.scanner.symbols.retain(|s| !s.is_empty());

        self.strategy.stop_offsets = self
            .strategy
            .stop_offsets
            .drain()
            .map(|(symbol, offset)| (symbol.to_uppercase(), offset))
            .collect();
    }

    pub fn pairs(&self) -> Vec<ScanPair> {
        ScanPair::cross(&self.scanner.symbols, &self.scanner.timeframes)
    }

    /// Checks needed to scan at all
    pub fn validate_scanner(&self) -> Result<()> {
        let scanner = &self.scanner;
        if scanner.symbols.is_empty() {
            return Err(config_error("scanner.symbols is empty"));
        }
        if scanner.timeframes.is_empty() {
            return Err(config_error("scanner.timeframes is empty"));
        }
        if scanner.poll_interval_secs == 0 {
            return Err(config_error("scanner.poll_interval_secs must be positive"));
        }
        if scanner.fetch_timeout_secs == 0 {
            return Err(config_error("scanner.fetch_timeout_secs must be positive"));
        }
        if scanner.candle_limit < self.strategy.min_candles {
            return Err(config_error("scanner.candle_limit is below strategy.min_candles"));
        }

        let strategy = &self.strategy;
        if strategy.ema_period == 0 {
            return Err(config_error("strategy.ema_period must be positive"));
        }
        if strategy.default_stop_offset <= 0.0 {
            return Err(config_error("strategy.default_stop_offset must be positive"));
        }
        if let Some((symbol, _)) = strategy.stop_offsets.iter().find(|(_, offset)| **offset <= 0.0) {
            return Err(config_error(&format!("strategy.stop_offsets.{} must be positive", symbol)));
        }

        if self.binance.requests_per_minute == 0 {
            return Err(config_error("binance.requests_per_minute must be positive"));
        }

        Ok(())
    }

    /// Full startup validation, including delivery settings
    pub fn validate(&self) -> Result<()> {
        self.validate_scanner()?;

        if self.telegram.token.trim().is_empty() {
            return Err(config_error(
                "telegram.token is empty (set SCANBOT_TELEGRAM__TOKEN or TELEGRAM_TOKEN)",
            ));
        }
        if self.telegram.admin_ids.is_empty() {
            return Err(config_error(
                "telegram.admin_ids is empty (set SCANBOT_TELEGRAM__ADMIN_IDS or ADMIN_CHAT_ID)",
            ));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> ScanError {
    ScanError::Configuration(message.to_string())
}
