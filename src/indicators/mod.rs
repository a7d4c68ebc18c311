// Technical indicators module
// Pure functions over a CandleSeries: averages, trend, levels, gaps, patterns

pub mod imbalance;
pub mod levels;
pub mod moving_average;
pub mod patterns;
pub mod trend;

pub use imbalance::{fair_value_gaps, FairValueGaps};
pub use levels::{
    classify_order_block, liquidity_levels, order_block_level, order_block_zones,
    support_resistance, LiquidityLevels, SupportResistance,
};
pub use moving_average::{calculate_ema, ema_series, rolling_max, rolling_min};
pub use patterns::{candle_confirms, detect_chart_pattern, detect_chart_pattern_for};
pub use trend::detect_trend;
