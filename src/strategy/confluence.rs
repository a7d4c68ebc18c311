use super::{
    signals::{compose_signal, SignalConfig},
    Strategy,
};
use crate::models::{CandleSeries, Signal};

/// Trend-following confluence strategy
///
/// Takes its bias from price against the EMA and only keeps it when:
/// - the close N candles back agrees with the direction
/// - a fair-value gap or a double top/bottom points the same way
/// - the latest candle does not close against the bias
#[derive(Debug, Clone)]
pub struct ConfluenceStrategy {
    config: SignalConfig,
    candle_limit: usize,
}

impl ConfluenceStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            candle_limit: 100,
        }
    }

    pub fn with_candle_limit(mut self, candle_limit: usize) -> Self {
        self.candle_limit = candle_limit;
        self
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Default for ConfluenceStrategy {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

impl Strategy for ConfluenceStrategy {
    fn evaluate(&self, series: &CandleSeries) -> Option<Signal> {
        if series.len() < self.config.full_history() {
            tracing::debug!(
                "{} {}: warming up ({}/{} candles), indicators may be absent",
                series.symbol(),
                series.timeframe(),
                series.len(),
                self.config.full_history()
            );
        }
        compose_signal(series, series.symbol(), &self.config)
    }

    fn name(&self) -> &str {
        "Confluence"
    }

    fn candles_to_fetch(&self) -> usize {
        self.candle_limit.max(self.config.full_history())
    }

    fn min_candles_required(&self) -> usize {
        self.config.min_candles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, Timeframe};
    use chrono::{Duration, Utc};

    #[test]
    fn test_candle_budget() {
        let strategy = ConfluenceStrategy::default();
        assert_eq!(strategy.candles_to_fetch(), 100);
        assert_eq!(strategy.min_candles_required(), 5);

        // Never fetch less than the slowest indicator needs
        let strategy = ConfluenceStrategy::default().with_candle_limit(10);
        assert_eq!(strategy.candles_to_fetch(), 50);
    }

    #[test]
    fn test_flat_market_has_no_signal() {
        let t0 = Utc::now() - Duration::minutes(60);
        let candles = (0..60)
            .map(|i| Candle {
                timestamp: t0 + Duration::minutes(i),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1000.0,
            })
            .collect();
        let series = CandleSeries::new("BTCUSDT", Timeframe::M5, candles);

        let strategy = ConfluenceStrategy::default();
        assert!(strategy.evaluate(&series).is_none());
        assert_eq!(strategy.name(), "Confluence");
    }
}
