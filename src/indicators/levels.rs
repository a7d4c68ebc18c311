use crate::models::{Bias, CandleSeries, OrderBlockKind, OrderBlockZone};

/// Support and resistance over the trailing window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportResistance {
    pub support: f64,
    pub resistance: f64,
}

/// Recent swing levels presumed to hold resting stop orders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityLevels {
    pub high: f64,
    pub low: f64,
}

/// Lowest low and highest high of the last `window` candles
///
/// Uses the whole series when it is shorter than `window`.
pub fn support_resistance(series: &CandleSeries, window: usize) -> Option<SupportResistance> {
    let recent = series.tail(window.max(1));
    if recent.is_empty() {
        return None;
    }

    let support = recent
        .candles()
        .iter()
        .map(|c| c.low)
        .fold(f64::MAX, f64::min);
    let resistance = recent
        .candles()
        .iter()
        .map(|c| c.high)
        .fold(f64::MIN, f64::max);

    Some(SupportResistance {
        support,
        resistance,
    })
}

/// Centered rolling max(high) / min(low), read `window / 2` candles before the end
///
/// That is the most recent index whose centered window is complete.
pub fn liquidity_levels(series: &CandleSeries, window: usize) -> Option<LiquidityLevels> {
    if window == 0 || series.len() < window {
        return None;
    }

    let index = series.len() - 1 - window / 2;
    let high = series.rolling_max_high(window, true)[index]?;
    let low = series.rolling_min_low(window, true)[index]?;

    Some(LiquidityLevels { high, low })
}

/// Second-to-last candle's low for BUY, its high for SELL
pub fn order_block_level(series: &CandleSeries, bias: Bias) -> Option<f64> {
    let candle = series.from_end(2)?;
    Some(match bias {
        Bias::Buy => candle.low,
        Bias::Sell => candle.high,
    })
}

/// Classify the second-to-last candle by its own body; dojis are unclassified
pub fn classify_order_block(series: &CandleSeries) -> Option<OrderBlockKind> {
    let candle = series.from_end(2)?;
    if candle.is_bullish() {
        Some(OrderBlockKind::Bullish)
    } else if candle.is_bearish() {
        Some(OrderBlockKind::Bearish)
    } else {
        None
    }
}

/// Every order-block candle in the series, used for charting
///
/// A bearish candle followed by a higher close is a bullish block; a bullish
/// candle followed by a lower close is a bearish block. The last two candles
/// are never marked.
pub fn order_block_zones(series: &CandleSeries) -> Vec<OrderBlockZone> {
    let candles = series.candles();
    if candles.len() < 3 {
        return Vec::new();
    }

    let mut zones = Vec::new();
    for i in 0..candles.len() - 2 {
        let current = &candles[i];
        let next = &candles[i + 1];

        let kind = if current.is_bearish() && next.close > current.close {
            OrderBlockKind::Bullish
        } else if current.is_bullish() && next.close < current.close {
            OrderBlockKind::Bearish
        } else {
            continue;
        };

        zones.push(OrderBlockZone {
            index: i,
            kind,
            low: current.low,
            high: current.high,
        });
    }

    zones
}
