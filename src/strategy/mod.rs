// Trading strategy module
pub mod confluence;
pub mod signals;

use crate::models::{CandleSeries, Signal};

pub use confluence::ConfluenceStrategy;
pub use signals::{compose_signal, risk_targets, SignalConfig};

/// Base trait for signal strategies
pub trait Strategy: Send + Sync {
    /// Evaluate one series snapshot; `None` means no tradable setup
    fn evaluate(&self, series: &CandleSeries) -> Option<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Candles to request from the exchange each cycle
    fn candles_to_fetch(&self) -> usize;

    /// Below this many candles the pair is reported as DataUnavailable
    fn min_candles_required(&self) -> usize;
}
