// Chart rendering for new-signal notifications

pub mod svg;

use crate::models::{CandleSeries, LevelSet};
use crate::Result;

pub use svg::SvgChartRenderer;

/// Rendered chart ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
}

pub trait ChartRenderer: Send + Sync {
    fn render(&self, series: &CandleSeries, levels: &LevelSet, title: &str) -> Result<ChartImage>;
}
