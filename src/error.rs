use thiserror::Error;

use crate::models::Timeframe;

/// Errors raised by the scanner and its collaborators
///
/// "No signal" is never an error: the composer returns `None` for that.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Not enough candles for {symbol} {timeframe}: got {got}, need {need}")]
    DataUnavailable {
        symbol: String,
        timeframe: Timeframe,
        got: usize,
        need: usize,
    },

    #[error("Market data provider error: {0}")]
    Provider(String),

    #[error("Timed out after {secs}s fetching {symbol} {timeframe}")]
    Timeout {
        symbol: String,
        timeframe: Timeframe,
        secs: u64,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Registry error: {0}")]
    Registry(String),
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Provider(format!("Invalid JSON: {}", err))
    }
}

impl From<::config::ConfigError> for ScanError {
    fn from(err: ::config::ConfigError) -> Self {
        ScanError::Configuration(err.to_string())
    }
}

impl ScanError {
    /// Transient errors are isolated to the current pair and the cycle moves on
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanError::Provider(_) | ScanError::Timeout { .. } | ScanError::DataUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_unavailable_message() {
        let err = ScanError::DataUnavailable {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::M5,
            got: 3,
            need: 5,
        };
        assert_eq!(
            err.to_string(),
            "Not enough candles for BTCUSDT 5m: got 3, need 5"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_configuration_is_fatal() {
        let err = ScanError::Configuration("telegram.token is empty".to_string());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("telegram.token"));
    }
}
