use crate::models::Trend;

/// Compare the latest close with the close `lookback` candles back
///
/// Sideways only on exact equality. Absent when the series is too short.
pub fn detect_trend(closes: &[f64], lookback: usize) -> Option<Trend> {
    if lookback == 0 || closes.len() <= lookback {
        return None;
    }

    let latest = closes[closes.len() - 1];
    let reference = closes[closes.len() - 1 - lookback];

    let trend = if latest > reference {
        Trend::Uptrend
    } else if latest < reference {
        Trend::Downtrend
    } else {
        Trend::Sideways
    };

    Some(trend)
}
