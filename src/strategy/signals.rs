use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

use crate::indicators::{
    calculate_ema, candle_confirms, detect_chart_pattern_for, detect_trend, fair_value_gaps,
    liquidity_levels, order_block_level, support_resistance,
};
use crate::models::{Bias, CandleSeries, LevelSet, Signal};
use crate::tracking::fingerprint;

/// Risk multiples for TP1, TP2, TP3
pub const TARGET_MULTIPLES: [f64; 3] = [2.0, 3.0, 4.0];

/// Configuration for signal generation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub ema_period: usize,
    pub trend_lookback: usize,
    pub sr_window: usize,
    pub liquidity_window: usize,
    /// Stop distance in price points when the symbol has no override
    pub default_stop_offset: f64,
    pub stop_offsets: HashMap<String, f64>,
    /// Fewer candles than this is DataUnavailable at load time
    pub min_candles: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        let stop_offsets = HashMap::from([
            ("BTCUSDT".to_string(), 10.0),
            ("ETHUSDT".to_string(), 7.0),
        ]);

        Self {
            ema_period: 50,
            trend_lookback: 20,
            sr_window: 20,
            liquidity_window: 5,
            default_stop_offset: 20.0,
            stop_offsets,
            min_candles: 5,
        }
    }
}

impl SignalConfig {
    pub fn stop_offset(&self, symbol: &str) -> f64 {
        self.stop_offsets
            .get(symbol)
            .copied()
            .unwrap_or(self.default_stop_offset)
    }

    /// Candles needed for every confirmation source to be available
    ///
    /// # Example
    /// ```
    /// use scanbot::strategy::signals::SignalConfig;
    ///
    /// let config = SignalConfig::default();
    /// assert_eq!(config.full_history(), 50);
    /// ```
    pub fn full_history(&self) -> usize {
        self.ema_period
            .max(self.trend_lookback + 1)
            .max(self.sr_window)
            .max(self.liquidity_window)
            .max(3)
    }
}

/// Entry +/- 2R, 3R, 4R in the bias direction, nearest first
pub fn risk_targets(entry: f64, stop: f64, bias: Bias) -> [f64; 3] {
    let risk = (entry - stop).abs();
    TARGET_MULTIPLES.map(|multiple| entry + bias.sign() * multiple * risk)
}

/// Compose a confirmed signal from one series snapshot
///
/// Returns `None` when there is no bias, when any confirmation fails, or when
/// a required indicator is absent for lack of history.
pub fn compose_signal(series: &CandleSeries, symbol: &str, config: &SignalConfig) -> Option<Signal> {
    let latest = series.last()?;
    let close = latest.close;
    let closes = series.closes();

    let Some(ema) = calculate_ema(&closes, config.ema_period) else {
        tracing::debug!(
            "{} {}: EMA{} unavailable ({} candles)",
            symbol,
            series.timeframe(),
            config.ema_period,
            series.len()
        );
        return None;
    };

    let bias = if close > ema {
        Bias::Buy
    } else if close < ema {
        Bias::Sell
    } else {
        return None;
    };

    // Confirmation gate
    let trend = detect_trend(&closes, config.trend_lookback);
    let trend_agrees = trend.is_some_and(|t| t.agrees_with(bias));
    let favorable_side = match bias {
        Bias::Buy => close > ema,
        Bias::Sell => close < ema,
    };

    let gaps = fair_value_gaps(series);
    let gap_agrees = match bias {
        Bias::Buy => gaps.up.is_some(),
        Bias::Sell => gaps.down.is_some(),
    };

    let pattern = detect_chart_pattern_for(series, bias);
    let pattern_agrees = pattern.is_some();
    let candle_agrees = candle_confirms(latest, bias);

    if !(trend_agrees && favorable_side && (gap_agrees || pattern_agrees) && candle_agrees) {
        tracing::debug!(
            "{} {}: {} rejected: trend={:?} FVG={} pattern={} candle={}",
            symbol,
            series.timeframe(),
            bias,
            trend,
            gap_agrees,
            pattern_agrees,
            candle_agrees
        );
        return None;
    }

    let sr = support_resistance(series, config.sr_window)?;
    let liquidity = liquidity_levels(series, config.liquidity_window);

    let levels = LevelSet {
        support: sr.support,
        resistance: sr.resistance,
        liquidity_high: liquidity.map(|l| l.high),
        liquidity_low: liquidity.map(|l| l.low),
        order_block: order_block_level(series, bias),
        ema,
        fair_value_gap_up: gaps.up,
        fair_value_gap_down: gaps.down,
        chart_pattern: pattern,
    };

    let entry = close;
    let stop = entry - bias.sign() * config.stop_offset(symbol);
    let targets = risk_targets(entry, stop, bias);

    let mut confirmations = vec!["trend".to_string(), format!("EMA{}", config.ema_period)];
    if gap_agrees {
        confirmations.push("fair-value gap".to_string());
    }
    if pattern_agrees {
        confirmations.push("pattern".to_string());
    }
    confirmations.push("candlestick".to_string());

    let mut rationale = confirmations.join(" + ");
    if let Some(p) = pattern {
        rationale.push_str(&format!(" ({})", p.name()));
    }

    tracing::info!(
        "{} {}: {} confirmed @ {:.2} (SL {:.2}, TP1 {:.2}) - {}",
        symbol,
        series.timeframe(),
        bias,
        entry,
        stop,
        targets[0],
        rationale
    );

    Some(Signal {
        symbol: symbol.to_string(),
        timeframe: series.timeframe(),
        bias,
        entry_price: entry,
        stop_price: stop,
        targets,
        levels,
        rationale,
        fingerprint: fingerprint(symbol, bias, series.timeframe(), entry),
        recent_volume: latest.volume,
        detected_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, PatternKind, Timeframe};
    use chrono::Duration;

    const EPS: f64 = 1e-9;

    /// Linear closes with every candle bullish and overlapping wicks
    fn trending(count: usize, start: f64, step: f64) -> Vec<Candle> {
        let t0 = Utc::now() - Duration::minutes(count as i64);
        (0..count)
            .map(|i| {
                let close = start + step * i as f64;
                let open = close - step.signum() * 0.5;
                Candle {
                    timestamp: t0 + Duration::minutes(i as i64),
                    open,
                    high: open.max(close) + 0.3,
                    low: open.min(close) - 0.3,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn with_up_gap(mut candles: Vec<Candle>, at: usize) -> Vec<Candle> {
        candles[at + 1].low = candles[at].high + 0.1;
        candles
    }

    fn with_down_gap(mut candles: Vec<Candle>, at: usize) -> Vec<Candle> {
        candles[at + 1].high = candles[at].low - 0.1;
        candles
    }

    /// Replace the tail with explicit (open, high, low, close) candles
    fn with_tail(mut candles: Vec<Candle>, tail: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let mut timestamp = candles.last().map(|c| c.timestamp).unwrap_or_else(Utc::now);
        for &(open, high, low, close) in tail {
            timestamp += Duration::minutes(1);
            candles.push(Candle {
                timestamp,
                open,
                high,
                low,
                close,
                volume: 1000.0,
            });
        }
        candles
    }

    #[test]
    fn test_risk_targets_buy() {
        let targets = risk_targets(100.0, 90.0, Bias::Buy);
        assert_eq!(targets, [120.0, 130.0, 140.0]);
    }

    #[test]
    fn test_risk_targets_sell() {
        let targets = risk_targets(100.0, 107.0, Bias::Sell);
        assert_eq!(targets, [86.0, 79.0, 72.0]);
    }

    #[test]
    fn test_buy_signal_with_fair_value_gap() {
        let candles = with_up_gap(trending(60, 100.0, 1.0), 10);
        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, candles);
        let config = SignalConfig::default();

        let signal = compose_signal(&series, "BTCUSDT", &config).expect("signal");
        assert_eq!(signal.bias, Bias::Buy);
        assert_eq!(signal.entry_price, 159.0);
        assert_eq!(signal.stop_price, 149.0); // BTCUSDT offset = 10
        assert_eq!(signal.targets, [179.0, 189.0, 199.0]);
        assert!(signal.levels.fair_value_gap_up.is_some());
        assert!(signal.rationale.contains("fair-value gap"));
        assert!(signal.rationale.starts_with("trend + EMA50"));
        assert!(signal.rationale.ends_with("candlestick"));
    }

    #[test]
    fn test_sell_signal_targets_decrease() {
        let candles = with_down_gap(trending(60, 200.0, -1.0), 20);
        let series = CandleSeries::new("ETHUSDT", Timeframe::M5, candles);
        let config = SignalConfig::default();

        let signal = compose_signal(&series, "ETHUSDT", &config).expect("signal");
        assert_eq!(signal.bias, Bias::Sell);
        assert_eq!(signal.stop_price, signal.entry_price + 7.0);

        let risk = signal.risk();
        for (target, multiple) in signal.targets.iter().zip(TARGET_MULTIPLES) {
            assert!((target - (signal.entry_price - multiple * risk)).abs() < EPS);
        }
        assert!(signal.targets[0] > signal.targets[1]);
        assert!(signal.targets[1] > signal.targets[2]);
    }

    #[test]
    fn test_buy_confirmed_by_double_bottom() {
        // Overlapping wicks throughout, so only the pattern can confirm
        let candles = with_tail(
            trending(57, 100.0, 1.0),
            &[
                (156.0, 157.3, 155.8, 157.0),
                (157.0, 157.5, 155.0, 156.5),
                (156.5, 158.2, 155.9, 158.0),
            ],
        );
        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, candles);

        let signal = compose_signal(&series, "BTCUSDT", &SignalConfig::default()).expect("signal");
        assert_eq!(signal.bias, Bias::Buy);
        assert_eq!(signal.entry_price, 158.0);
        assert_eq!(signal.stop_price, 148.0);
        assert!(signal.levels.fair_value_gap_up.is_none());
        assert_eq!(
            signal.levels.chart_pattern.map(|p| p.kind),
            Some(PatternKind::DoubleBottom)
        );
        assert_eq!(
            signal.rationale,
            "trend + EMA50 + pattern + candlestick (Double Bottom)"
        );
    }

    #[test]
    fn test_sell_confirmed_by_double_top() {
        let candles = with_tail(
            trending(57, 200.0, -1.0),
            &[
                (144.0, 144.2, 142.7, 143.0),
                (143.0, 145.0, 142.5, 143.5),
                (143.5, 144.1, 141.8, 142.0),
            ],
        );
        let series = CandleSeries::new("ETHUSDT", Timeframe::M5, candles);

        let signal = compose_signal(&series, "ETHUSDT", &SignalConfig::default()).expect("signal");
        assert_eq!(signal.bias, Bias::Sell);
        assert_eq!(signal.entry_price, 142.0);
        assert_eq!(signal.stop_price, 149.0);
        assert!(signal.levels.fair_value_gap_down.is_none());
        assert_eq!(
            signal.rationale,
            "trend + EMA50 + pattern + candlestick (Double Top)"
        );
    }

    #[test]
    fn test_outside_bar_still_confirms_buy() {
        // Middle candle makes both a local high and a local low
        let candles = with_tail(
            trending(57, 100.0, 1.0),
            &[
                (156.0, 157.3, 155.8, 157.0),
                (157.0, 158.5, 155.0, 156.5),
                (156.5, 158.2, 155.9, 158.0),
            ],
        );
        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, candles);

        let signal = compose_signal(&series, "BTCUSDT", &SignalConfig::default()).expect("signal");
        assert_eq!(signal.bias, Bias::Buy);
        assert!(signal.rationale.ends_with("(Double Bottom)"));
    }

    #[test]
    fn test_no_signal_without_gap_or_pattern() {
        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, trending(60, 100.0, 1.0));
        assert!(compose_signal(&series, "BTCUSDT", &SignalConfig::default()).is_none());
    }

    #[test]
    fn test_bearish_candle_rejects_buy() {
        let mut candles = with_up_gap(trending(60, 100.0, 1.0), 10);
        let last = candles.last_mut().unwrap();
        last.open = last.close + 0.5;
        last.high = last.open + 0.3;

        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, candles);
        assert!(compose_signal(&series, "BTCUSDT", &SignalConfig::default()).is_none());
    }

    #[test]
    fn test_trend_disagreement_rejects() {
        // Price above a long EMA but below the close 20 candles ago
        let mut candles = with_up_gap(trending(60, 100.0, 1.0), 10);
        let t_last = candles.last().unwrap().timestamp;
        for i in 1..=20 {
            let close = 150.0 - i as f64 * 0.1;
            candles.push(Candle {
                timestamp: t_last + Duration::minutes(i),
                open: close,
                high: close + 0.2,
                low: close - 0.2,
                close,
                volume: 1000.0,
            });
        }

        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, candles);
        assert!(compose_signal(&series, "BTCUSDT", &SignalConfig::default()).is_none());
    }

    #[test]
    fn test_degenerate_series_returns_none() {
        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, trending(2, 100.0, 1.0));
        assert!(compose_signal(&series, "BTCUSDT", &SignalConfig::default()).is_none());

        let empty = CandleSeries::new("BTCUSDT", Timeframe::M1, Vec::new());
        assert!(compose_signal(&empty, "BTCUSDT", &SignalConfig::default()).is_none());
    }

    #[test]
    fn test_fingerprint_is_stable_across_calls() {
        let candles = with_up_gap(trending(60, 100.0, 1.0), 10);
        let series = CandleSeries::new("BTCUSDT", Timeframe::M1, candles);
        let config = SignalConfig::default();

        let first = compose_signal(&series, "BTCUSDT", &config).unwrap();
        let second = compose_signal(&series, "BTCUSDT", &config).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn test_stop_offset_fallback() {
        let config = SignalConfig::default();
        assert_eq!(config.stop_offset("BTCUSDT"), 10.0);
        assert_eq!(config.stop_offset("ETHUSDT"), 7.0);
        assert_eq!(config.stop_offset("SOLUSDT"), 20.0);
    }
}
