/// Exponential moving average series, one value per price
///
/// Seeded by the first price and smoothed with `k = 2 / (period + 1)`,
/// so early values carry warm-up bias.
pub fn ema_series(prices: &[f64], period: usize) -> Vec<f64> {
    let Some(&seed) = prices.first() else {
        return Vec::new();
    };

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = seed;

    prices
        .iter()
        .map(|price| {
            ema = price * multiplier + ema * (1.0 - multiplier);
            ema
        })
        .collect()
}

/// Latest EMA value, absent until `period` prices are available
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    ema_series(prices, period).last().copied()
}

/// Rolling maximum over `window` values
///
/// Trailing windows end at each index; centered windows span
/// `window / 2` values either side. Incomplete windows yield `None`.
pub fn rolling_max(values: &[f64], window: usize, centered: bool) -> Vec<Option<f64>> {
    rolling(values, window, centered, |slice| {
        slice.iter().copied().fold(f64::MIN, f64::max)
    })
}

/// Rolling minimum, same windowing rules as [`rolling_max`]
pub fn rolling_min(values: &[f64], window: usize, centered: bool) -> Vec<Option<f64>> {
    rolling(values, window, centered, |slice| {
        slice.iter().copied().fold(f64::MAX, f64::min)
    })
}

fn rolling<F>(values: &[f64], window: usize, centered: bool, reduce: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    if window == 0 {
        return vec![None; values.len()];
    }

    let before = if centered { window / 2 } else { window - 1 };

    (0..values.len())
        .map(|i| {
            let start = i.checked_sub(before)?;
            let end = start + window;
            if end > values.len() {
                return None;
            }
            Some(reduce(&values[start..end]))
        })
        .collect()
}
