pub mod series;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use series::CandleSeries;

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Exchange kline interval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(format!("Unsupported timeframe: {}", other)),
        }
    }
}

/// Directional trade stance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Bias {
    Buy,
    Sell,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Buy => "BUY",
            Bias::Sell => "SELL",
        }
    }

    /// +1 for BUY, -1 for SELL
    pub fn sign(&self) -> f64 {
        match self {
            Bias::Buy => 1.0,
            Bias::Sell => -1.0,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
}

impl Trend {
    pub fn agrees_with(&self, bias: Bias) -> bool {
        matches!(
            (self, bias),
            (Trend::Uptrend, Bias::Buy) | (Trend::Downtrend, Bias::Sell)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PatternKind {
    DoubleTop,
    DoubleBottom,
}

/// Three-candle reversal pattern and the bias it points to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartPattern {
    pub kind: PatternKind,
    pub direction: Bias,
}

impl ChartPattern {
    pub fn name(&self) -> &'static str {
        match self.kind {
            PatternKind::DoubleTop => "Double Top",
            PatternKind::DoubleBottom => "Double Bottom",
        }
    }
}

/// Price range skipped between two candles' wicks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GapZone {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderBlockKind {
    Bullish,
    Bearish,
}

/// Candle range marked as a supply/demand zone
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrderBlockZone {
    pub index: usize,
    pub kind: OrderBlockKind,
    pub low: f64,
    pub high: f64,
}

/// Levels derived from one series snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelSet {
    pub support: f64,
    pub resistance: f64,
    pub liquidity_high: Option<f64>,
    pub liquidity_low: Option<f64>,
    pub order_block: Option<f64>,
    pub ema: f64,
    pub fair_value_gap_up: Option<GapZone>,
    pub fair_value_gap_down: Option<GapZone>,
    pub chart_pattern: Option<ChartPattern>,
}

/// Confirmed trade setup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bias: Bias,
    pub entry_price: f64,
    pub stop_price: f64,
    /// 2R, 3R, 4R in that order
    pub targets: [f64; 3],
    pub levels: LevelSet,
    pub rationale: String,
    pub fingerprint: String,
    pub recent_volume: f64,
    pub detected_at: DateTime<Utc>,
}

impl Signal {
    /// Entry-to-stop distance
    pub fn risk(&self) -> f64 {
        (self.entry_price - self.stop_price).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_round_trip_through_str() {
        for tf in ["1m", "5m", "15m", "30m", "1h", "4h"] {
            let parsed: Timeframe = tf.parse().unwrap();
            assert_eq!(parsed.as_str(), tf);
        }
        assert!("7m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_serde_uses_exchange_names() {
        let json = serde_json::to_string(&Timeframe::H4).unwrap();
        assert_eq!(json, "\"4h\"");
        let tf: Timeframe = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(tf, Timeframe::M15);
    }

    #[test]
    fn test_trend_agreement() {
        assert!(Trend::Uptrend.agrees_with(Bias::Buy));
        assert!(Trend::Downtrend.agrees_with(Bias::Sell));
        assert!(!Trend::Uptrend.agrees_with(Bias::Sell));
        assert!(!Trend::Sideways.agrees_with(Bias::Buy));
    }

    #[test]
    fn test_candle_direction() {
        let candle = Candle {
            timestamp: Utc::now(),
            open: 100.0,
            high: 103.0,
            low: 99.0,
            close: 102.0,
            volume: 10.0,
        };
        assert!(candle.is_bullish());
        assert!(!candle.is_bearish());
    }
}
