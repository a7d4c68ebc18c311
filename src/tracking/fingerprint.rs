use rust_decimal::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{Bias, Signal, Timeframe};

/// Decimal places of the entry price that take part in a signal's identity
pub const FINGERPRINT_PRECISION: u32 = 2;

/// Deterministic identity of a setup
///
/// Entry price is part of the identity, so a drift that changes the rounded
/// entry yields a new fingerprint.
///
/// # Example
/// ```
/// use scanbot::models::{Bias, Timeframe};
/// use scanbot::tracking::fingerprint;
///
/// let fp = fingerprint("BTCUSDT", Bias::Buy, Timeframe::M5, 50000.004);
/// assert_eq!(fp, "BTCUSDT_5m_BUY_50000");
/// ```
pub fn fingerprint(symbol: &str, bias: Bias, timeframe: Timeframe, entry: f64) -> String {
    format!("{}_{}_{}_{}", symbol, timeframe, bias, rounded_entry(entry))
}

fn rounded_entry(entry: f64) -> String {
    match Decimal::from_f64(entry) {
        Some(value) => value
            .round_dp_with_strategy(FINGERPRINT_PRECISION, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string(),
        // NaN and infinities have no decimal form
        None => format!("{:.2}", entry),
    }
}

/// How a detected signal relates to what was already notified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalStatus {
    /// First setup seen for this (symbol, timeframe)
    New,
    /// Same fingerprint as one already notified
    Repeat,
    /// New fingerprint replacing the last one notified for this (symbol, timeframe)
    Supersedes { previous: String },
}

impl SignalStatus {
    pub fn should_notify(&self) -> bool {
        !matches!(self, SignalStatus::Repeat)
    }
}

/// Fingerprints remembered per (symbol, timeframe) before the oldest is forgotten
pub const FINGERPRINT_HISTORY: usize = 64;

/// Fingerprints already notified, bounded per (symbol, timeframe)
///
/// `record` keeps the most recent fingerprints of each pair and forgets the
/// oldest beyond the history limit. The latest fingerprint of a pair is never
/// forgotten, so an unchanged setup stays a `Repeat`.
#[derive(Debug)]
pub struct SignalRegistry {
    notified: HashSet<String>,
    history: HashMap<(String, Timeframe), VecDeque<String>>,
    history_limit: usize,
}

impl Default for SignalRegistry {
    fn default() -> Self {
        Self::with_history_limit(FINGERPRINT_HISTORY)
    }
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            notified: HashSet::new(),
            history: HashMap::new(),
            history_limit: limit.max(1),
        }
    }

    pub fn is_new_signal(&self, fingerprint: &str) -> bool {
        !self.notified.contains(fingerprint)
    }

    /// Idempotent
    pub fn mark_notified(&mut self, fingerprint: &str) {
        self.notified.insert(fingerprint.to_string());
    }

    pub fn classify(&self, signal: &Signal) -> SignalStatus {
        if !self.is_new_signal(&signal.fingerprint) {
            return SignalStatus::Repeat;
        }

        match self.latest_for(&signal.symbol, signal.timeframe) {
            Some(previous) => SignalStatus::Supersedes {
                previous: previous.to_string(),
            },
            None => SignalStatus::New,
        }
    }

    /// Mark the signal notified and make it the latest for its pair
    pub fn record(&mut self, signal: &Signal) {
        self.mark_notified(&signal.fingerprint);

        let history = self
            .history
            .entry((signal.symbol.clone(), signal.timeframe))
            .or_default();
        history.retain(|fp| fp != &signal.fingerprint);
        history.push_back(signal.fingerprint.clone());

        while history.len() > self.history_limit {
            if let Some(oldest) = history.pop_front() {
                tracing::debug!("Forgetting fingerprint {}", oldest);
                self.notified.remove(&oldest);
            }
        }
    }

    pub fn latest_for(&self, symbol: &str, timeframe: Timeframe) -> Option<&str> {
        self.history
            .get(&(symbol.to_string(), timeframe))
            .and_then(VecDeque::back)
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}
