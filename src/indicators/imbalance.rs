use crate::models::{CandleSeries, GapZone};

/// Most recent fair-value gap in each direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FairValueGaps {
    pub up: Option<GapZone>,
    pub down: Option<GapZone>,
}

/// Scan consecutive candle triples for wick gaps
///
/// Up-gap: candle `i + 1` low above candle `i` high. Down-gap: candle `i + 1`
/// high below candle `i` low. A later gap replaces an earlier one of the same
/// direction.
pub fn fair_value_gaps(series: &CandleSeries) -> FairValueGaps {
    let candles = series.candles();
    let mut gaps = FairValueGaps::default();

    if candles.len() < 3 {
        return gaps;
    }

    for i in 0..candles.len() - 2 {
        let first = &candles[i];
        let second = &candles[i + 1];

        if second.low > first.high {
            gaps.up = Some(GapZone {
                lower: first.high,
                upper: second.low,
            });
        }

        if second.high < first.low {
            gaps.down = Some(GapZone {
                lower: second.high,
                upper: first.low,
            });
        }
    }

    gaps
}
