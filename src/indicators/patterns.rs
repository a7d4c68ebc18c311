use crate::models::{Bias, Candle, CandleSeries, ChartPattern, PatternKind};

const DOUBLE_TOP: ChartPattern = ChartPattern {
    kind: PatternKind::DoubleTop,
    direction: Bias::Sell,
};

const DOUBLE_BOTTOM: ChartPattern = ChartPattern {
    kind: PatternKind::DoubleBottom,
    direction: Bias::Buy,
};

/// Local double top / double bottom from the last three candles
///
/// Double top: `high[-1] < high[-2] > high[-3]` (SELL). Double bottom:
/// `low[-1] > low[-2] < low[-3]` (BUY). An outside bar in the middle can
/// satisfy both; this unbiased lookup then reports the top. Use
/// [`detect_chart_pattern_for`] when the trade direction is known.
pub fn detect_chart_pattern(series: &CandleSeries) -> Option<ChartPattern> {
    detect_chart_pattern_for(series, Bias::Sell)
        .or_else(|| detect_chart_pattern_for(series, Bias::Buy))
}

/// The pattern that confirms `bias`, if the last three candles form it
pub fn detect_chart_pattern_for(series: &CandleSeries, bias: Bias) -> Option<ChartPattern> {
    let (c1, c2, c3) = (series.from_end(1)?, series.from_end(2)?, series.from_end(3)?);

    match bias {
        Bias::Sell if c1.high < c2.high && c2.high > c3.high => Some(DOUBLE_TOP),
        Bias::Buy if c1.low > c2.low && c2.low < c3.low => Some(DOUBLE_BOTTOM),
        _ => None,
    }
}

/// Candlestick filter: a bearish candle rejects BUY, a bullish one rejects SELL
pub fn candle_confirms(candle: &Candle, bias: Bias) -> bool {
    match bias {
        Bias::Buy => !candle.is_bearish(),
        Bias::Sell => !candle.is_bullish(),
    }
}
