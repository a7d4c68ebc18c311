use super::{Candle, Timeframe};
use crate::api::MarketDataProvider;
use crate::error::ScanError;
use crate::indicators::moving_average::{ema_series, rolling_max, rolling_min};
use crate::Result;

/// Ordered candles for one (symbol, timeframe), most recent last
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, sorting candles by timestamp
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        }
    }

    /// Fetch `count` candles and require at least `min_required` of them
    pub async fn load<P>(
        provider: &P,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
        min_required: usize,
    ) -> Result<Self>
    where
        P: MarketDataProvider + ?Sized,
    {
        let candles = provider.get_candles(symbol, timeframe, count).await?;

        if candles.len() < min_required {
            return Err(ScanError::DataUnavailable {
                symbol: symbol.to_string(),
                timeframe,
                got: candles.len(),
                need: min_required,
            });
        }

        Ok(Self::new(symbol, timeframe, candles))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Candle `n` positions from the end (`from_end(1)` is the latest)
    pub fn from_end(&self, n: usize) -> Option<&Candle> {
        if n == 0 || n > self.candles.len() {
            return None;
        }
        self.candles.get(self.candles.len() - n)
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.last().map(|c| c.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// The last `n` candles as their own series
    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        Self {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            candles: self.candles[start..].to_vec(),
        }
    }

    /// EMA of closes, one value per candle, seeded by the first close
    pub fn exponential_average(&self, period: usize) -> Vec<f64> {
        ema_series(&self.closes(), period)
    }

    pub fn rolling_max_high(&self, window: usize, centered: bool) -> Vec<Option<f64>> {
        rolling_max(&self.highs(), window, centered)
    }

    pub fn rolling_min_low(&self, window: usize, centered: bool) -> Vec<Option<f64>> {
        rolling_min(&self.lows(), window, centered)
    }
}
