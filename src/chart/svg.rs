use std::fmt::{self, Write};

use super::{ChartImage, ChartRenderer};
use crate::error::ScanError;
use crate::indicators::order_block_zones;
use crate::models::{CandleSeries, GapZone, LevelSet, OrderBlockKind};
use crate::Result;

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const PANEL_GAP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 20.0;

const BULLISH: &str = "#26a69a";
const BEARISH: &str = "#ef5350";

/// Price chart with levels and zones, drawn as a standalone SVG document
#[derive(Debug, Clone)]
pub struct SvgChartRenderer {
    width: f64,
    height: f64,
    candles: usize,
    ema_period: usize,
    liquidity_window: usize,
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 600.0,
            candles: 50,
            ema_period: 50,
            liquidity_window: 10,
        }
    }
}

impl SvgChartRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ema_period(mut self, period: usize) -> Self {
        self.ema_period = period;
        self
    }

    fn draw(&self, series: &CandleSeries, levels: &LevelSet, title: &str) -> std::result::Result<String, fmt::Error> {
        // EMA over the full history so the visible part carries no warm-up
        let ema_full = series.exponential_average(self.ema_period);
        let view = series.tail(self.candles);
        let ema = &ema_full[ema_full.len() - view.len()..];
        let candles = view.candles();

        let frame = Frame::new(self, &view, levels, ema);
        let mut out = String::new();

        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        )?;
        writeln!(out, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
        writeln!(
            out,
            r##"<text x="{}" y="24" font-family="sans-serif" font-size="16" fill="#222">{}</text>"##,
            MARGIN_LEFT,
            escape(title)
        )?;

        // High/low band
        let upper = candles
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:.2},{:.2}", frame.x(i), frame.y(c.high)));
        let lower = candles
            .iter()
            .enumerate()
            .rev()
            .map(|(i, c)| format!("{:.2},{:.2}", frame.x(i), frame.y(c.low)));
        let band: Vec<String> = upper.chain(lower).collect();
        writeln!(
            out,
            r##"<polygon class="range" points="{}" fill="#90a4ae" fill-opacity="0.2"/>"##,
            band.join(" ")
        )?;

        for zone in order_block_zones(&view) {
            let color = match zone.kind {
                OrderBlockKind::Bullish => BULLISH,
                OrderBlockKind::Bearish => BEARISH,
            };
            frame.zone(&mut out, "order-block", frame.x(zone.index), zone.low, zone.high, color)?;
        }

        let gaps = [
            (levels.fair_value_gap_up, BULLISH),
            (levels.fair_value_gap_down, BEARISH),
        ];
        for (gap, color) in gaps {
            if let Some(GapZone { lower, upper }) = gap {
                frame.zone(&mut out, "fvg", frame.left, lower, upper, color)?;
            }
        }

        // Liquidity band over the most recent candles
        let recent = view.tail(self.liquidity_window);
        let liq_high = recent.highs().into_iter().fold(f64::MIN, f64::max);
        let liq_low = recent.lows().into_iter().fold(f64::MAX, f64::min);
        if !recent.is_empty() {
            let start = frame.x(view.len() - recent.len());
            frame.zone(&mut out, "liquidity", start, liq_low, liq_high, "#7e57c2")?;
        }

        frame.level_line(&mut out, "support", levels.support, BULLISH)?;
        frame.level_line(&mut out, "resistance", levels.resistance, BEARISH)?;

        frame.polyline(&mut out, "close", candles.iter().map(|c| c.close), "#1e88e5", 2.0)?;
        frame.polyline(&mut out, "ema", ema.iter().copied(), "#fb8c00", 1.5)?;

        // Volume panel on its own scale
        let max_volume = candles.iter().map(|c| c.volume).fold(0.0, f64::max);
        let bar_width = (frame.step() * 0.7).max(1.0);
        for (i, candle) in candles.iter().enumerate() {
            let ratio = if max_volume > 0.0 { candle.volume / max_volume } else { 0.0 };
            let h = ratio * frame.volume_height;
            let color = if candle.is_bearish() { BEARISH } else { BULLISH };
            writeln!(
                out,
                r#"<rect class="volume" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="0.6"/>"#,
                frame.x(i) - bar_width / 2.0,
                frame.volume_bottom - h,
                bar_width,
                h,
                color
            )?;
        }

        for price in [frame.max, frame.min] {
            writeln!(
                out,
                r##"<text x="4" y="{:.2}" font-family="sans-serif" font-size="11" fill="#555">{:.2}</text>"##,
                frame.y(price) + 4.0,
                price
            )?;
        }

        writeln!(out, "</svg>")?;
        Ok(out)
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, series: &CandleSeries, levels: &LevelSet, title: &str) -> Result<ChartImage> {
        if series.is_empty() {
            return Err(ScanError::Render(format!(
                "no candles for {} {}",
                series.symbol(),
                series.timeframe()
            )));
        }

        let svg = self
            .draw(series, levels, title)
            .map_err(|e| ScanError::Render(e.to_string()))?;

        Ok(ChartImage {
            bytes: svg.into_bytes(),
            file_name: format!("{}_{}.svg", series.symbol(), series.timeframe()),
            mime: "image/svg+xml".to_string(),
        })
    }
}

/// Pixel mapping for the price and volume panels
struct Frame {
    left: f64,
    right: f64,
    price_top: f64,
    price_height: f64,
    volume_bottom: f64,
    volume_height: f64,
    min: f64,
    max: f64,
    count: usize,
}

impl Frame {
    fn new(renderer: &SvgChartRenderer, view: &CandleSeries, levels: &LevelSet, ema: &[f64]) -> Self {
        let mut min = levels.support.min(levels.ema);
        let mut max = levels.resistance.max(levels.ema);
        for candle in view.candles() {
            min = min.min(candle.low);
            max = max.max(candle.high);
        }
        for value in ema {
            min = min.min(*value);
            max = max.max(*value);
        }
        if (max - min).abs() < f64::EPSILON {
            min -= 1.0;
            max += 1.0;
        }

        let usable = renderer.height - MARGIN_TOP - PANEL_GAP - MARGIN_BOTTOM;
        let price_height = usable * 0.75;
        let volume_height = usable - price_height;

        Self {
            left: MARGIN_LEFT,
            right: renderer.width - MARGIN_RIGHT,
            price_top: MARGIN_TOP,
            price_height,
            volume_bottom: renderer.height - MARGIN_BOTTOM,
            volume_height,
            min,
            max,
            count: view.len(),
        }
    }

    fn step(&self) -> f64 {
        (self.right - self.left) / self.count.saturating_sub(1).max(1) as f64
    }

    fn x(&self, index: usize) -> f64 {
        self.left + index as f64 * self.step()
    }

    fn y(&self, price: f64) -> f64 {
        self.price_top + (self.max - price) / (self.max - self.min) * self.price_height
    }

    fn polyline<I>(&self, out: &mut String, class: &str, values: I, color: &str, width: f64) -> fmt::Result
    where
        I: Iterator<Item = f64>,
    {
        let points: Vec<String> = values
            .enumerate()
            .map(|(i, v)| format!("{:.2},{:.2}", self.x(i), self.y(v)))
            .collect();
        writeln!(
            out,
            r#"<polyline class="{}" points="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
            class,
            points.join(" "),
            color,
            width
        )
    }

    fn level_line(&self, out: &mut String, class: &str, price: f64, color: &str) -> fmt::Result {
        let y = self.y(price);
        writeln!(
            out,
            r#"<line class="{}" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-dasharray="6 4"/>"#,
            class, self.left, y, self.right, y, color
        )
    }

    /// Shaded price range from `start_x` to the right edge
    fn zone(&self, out: &mut String, class: &str, start_x: f64, low: f64, high: f64, color: &str) -> fmt::Result {
        let top = self.y(high.max(low));
        let bottom = self.y(high.min(low));
        writeln!(
            out,
            r#"<rect class="{}" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="0.15"/>"#,
            class,
            start_x,
            top,
            (self.right - start_x).max(0.0),
            (bottom - top).max(1.0),
            color
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
