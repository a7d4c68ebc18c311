use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Bias, Signal, Timeframe};

#[derive(Debug, Clone, PartialEq)]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleKind {
    /// Index into the trade's targets (0 is TP1)
    TargetHit { index: usize },
    StopHit,
}

/// One-time transition emitted when a tracked trade resolves
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub fingerprint: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bias: Bias,
    pub kind: LifecycleKind,
    pub price: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TrackedTrade {
    pub fingerprint: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bias: Bias,
    pub entry_price: f64,
    pub stop_price: f64,
    pub targets: [f64; 3],
    pub target_hit: [bool; 3],
    pub stop_hit: bool,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
}

impl TrackedTrade {
    pub fn from_signal(signal: &Signal) -> Self {
        Self {
            fingerprint: signal.fingerprint.clone(),
            symbol: signal.symbol.clone(),
            timeframe: signal.timeframe,
            bias: signal.bias,
            entry_price: signal.entry_price,
            stop_price: signal.stop_price,
            targets: signal.targets,
            target_hit: [false; 3],
            stop_hit: false,
            status: TradeStatus::Open,
            opened_at: signal.detected_at,
        }
    }

    fn reaches_target(&self, price: f64) -> bool {
        match self.bias {
            Bias::Buy => price >= self.targets[0],
            Bias::Sell => price <= self.targets[0],
        }
    }

    fn breaches_stop(&self, price: f64) -> bool {
        match self.bias {
            Bias::Buy => price <= self.stop_price,
            Bias::Sell => price >= self.stop_price,
        }
    }
}

/// Open trades keyed by fingerprint
///
/// A trade closes on the first of: price reaching TP1, price breaching the
/// stop. TP2/TP3 are informational. Target is checked before stop, so a batch
/// that touches both resolves as a target hit. Closed trades are evicted.
#[derive(Debug, Default)]
pub struct TradeTracker {
    trades: HashMap<String, TrackedTrade>,
}

impl TradeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a signal; returns false if its fingerprint is already open
    pub fn open_trade(&mut self, signal: &Signal) -> bool {
        if self.trades.contains_key(&signal.fingerprint) {
            return false;
        }

        self.trades
            .insert(signal.fingerprint.clone(), TrackedTrade::from_signal(signal));
        true
    }

    pub fn get(&self, fingerprint: &str) -> Option<&TrackedTrade> {
        self.trades.get(fingerprint)
    }

    pub fn is_open(&self, fingerprint: &str) -> bool {
        self.trades.contains_key(fingerprint)
    }

    pub fn open_count(&self) -> usize {
        self.trades.len()
    }

    /// Fingerprints of open trades on one (symbol, timeframe)
    pub fn open_for(&self, symbol: &str, timeframe: Timeframe) -> Vec<String> {
        let mut fingerprints: Vec<String> = self
            .trades
            .values()
            .filter(|t| t.symbol == symbol && t.timeframe == timeframe)
            .map(|t| t.fingerprint.clone())
            .collect();
        fingerprints.sort();
        fingerprints
    }

    /// Evaluate one price observation
    pub fn evaluate(&mut self, fingerprint: &str, price: f64) -> Option<LifecycleEvent> {
        self.evaluate_batch(fingerprint, &[price])
    }

    /// Evaluate several observations at once
    ///
    /// Any observation reaching TP1 wins over any observation breaching the
    /// stop, regardless of order.
    pub fn evaluate_batch(&mut self, fingerprint: &str, prices: &[f64]) -> Option<LifecycleEvent> {
        let trade = self.trades.get_mut(fingerprint)?;
        if trade.status == TradeStatus::Closed {
            return None;
        }

        let (kind, price) = if let Some(&price) = prices.iter().find(|&&p| trade.reaches_target(p)) {
            trade.target_hit[0] = true;
            (LifecycleKind::TargetHit { index: 0 }, price)
        } else if let Some(&price) = prices.iter().find(|&&p| trade.breaches_stop(p)) {
            trade.stop_hit = true;
            (LifecycleKind::StopHit, price)
        } else {
            return None;
        };

        trade.status = TradeStatus::Closed;
        let event = LifecycleEvent {
            fingerprint: trade.fingerprint.clone(),
            symbol: trade.symbol.clone(),
            timeframe: trade.timeframe,
            bias: trade.bias,
            kind,
            price,
            at: Utc::now(),
        };

        self.trades.remove(fingerprint);
        tracing::info!(
            "{} {}: {} trade {} closed by {:?} @ {:.2}",
            event.symbol,
            event.timeframe,
            event.bias,
            event.fingerprint,
            event.kind,
            event.price
        );

        Some(event)
    }

    /// Evaluate every open trade of a pair against its latest close
    pub fn evaluate_pair(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        price: f64,
    ) -> Vec<LifecycleEvent> {
        self.open_for(symbol, timeframe)
            .iter()
            .filter_map(|fp| self.evaluate(fp, price))
            .collect()
    }
}
