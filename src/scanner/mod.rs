// Scan orchestration: one cycle over every (symbol, timeframe) pair

use std::sync::Arc;
use std::time::Duration;

use crate::api::MarketDataProvider;
use crate::error::ScanError;
use crate::models::{CandleSeries, Timeframe};
use crate::notify::NotificationIntent;
use crate::strategy::{ConfluenceStrategy, Strategy};
use crate::tracking::{SignalRegistry, TradeTracker};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPair {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl ScanPair {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }

    /// Every symbol crossed with every timeframe, symbol-major
    pub fn cross(symbols: &[String], timeframes: &[Timeframe]) -> Vec<ScanPair> {
        symbols
            .iter()
            .flat_map(|symbol| timeframes.iter().map(move |tf| ScanPair::new(symbol.clone(), *tf)))
            .collect()
    }
}

/// Failure isolated to one pair
#[derive(Debug)]
pub struct PairFailure {
    pub pair: ScanPair,
    pub error: ScanError,
}

/// Outcome of one full cycle
#[derive(Debug, Default)]
pub struct ScanReport {
    pub intents: Vec<NotificationIntent>,
    pub failures: Vec<PairFailure>,
    pub pairs_scanned: usize,
}

/// Owns the dedup registry and the open trades, so a single task drives it
pub struct ScanOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    strategy: Box<dyn Strategy>,
    ema_period: usize,
    pairs: Vec<ScanPair>,
    fetch_timeout: Duration,
    signals: SignalRegistry,
    trades: TradeTracker,
}

impl ScanOrchestrator {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        strategy: ConfluenceStrategy,
        pairs: Vec<ScanPair>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            ema_period: strategy.config().ema_period,
            strategy: Box::new(strategy),
            pairs,
            fetch_timeout,
            signals: SignalRegistry::new(),
            trades: TradeTracker::new(),
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn pairs(&self) -> &[ScanPair] {
        &self.pairs
    }

    pub fn signals(&self) -> &SignalRegistry {
        &self.signals
    }

    pub fn trades(&self) -> &TradeTracker {
        &self.trades
    }

    /// Scan every pair in order; a failing pair never stops the others
    pub async fn run_cycle(&mut self) -> ScanReport {
        let mut report = ScanReport::default();
        let pairs = self.pairs.clone();

        for pair in pairs {
            report.pairs_scanned += 1;
            match self.scan_pair(&pair).await {
                Ok(intents) => report.intents.extend(intents),
                Err(error) => {
                    if error.is_transient() {
                        tracing::warn!("{} {}: skipped this cycle: {}", pair.symbol, pair.timeframe, error);
                    } else {
                        tracing::error!("{} {}: {}", pair.symbol, pair.timeframe, error);
                    }
                    report.failures.push(PairFailure { pair, error });
                }
            }
        }

        tracing::info!(
            "Cycle complete: {} pairs, {} notifications, {} failures, {} open trades",
            report.pairs_scanned,
            report.intents.len(),
            report.failures.len(),
            self.trades.open_count()
        );

        report
    }

    /// Load, detect, dedup, then resolve open trades at the latest close
    pub async fn scan_pair(&mut self, pair: &ScanPair) -> Result<Vec<NotificationIntent>> {
        let series = self.load(pair).await?;
        let mut intents = Vec::new();

        if let Some(signal) = self.strategy.evaluate(&series) {
            let status = self.signals.classify(&signal);
            if status.should_notify() {
                self.signals.record(&signal);
                self.trades.open_trade(&signal);
                intents.push(NotificationIntent::new_signal(
                    &signal,
                    &status,
                    &series,
                    self.ema_period,
                ));
            } else {
                tracing::debug!("{}: already notified", signal.fingerprint);
            }
        }

        if let Some(close) = series.latest_close() {
            let events = self.trades.evaluate_pair(&pair.symbol, pair.timeframe, close);
            intents.extend(events.iter().map(NotificationIntent::lifecycle));
        }

        Ok(intents)
    }

    async fn load(&self, pair: &ScanPair) -> Result<CandleSeries> {
        let load = CandleSeries::load(
            self.provider.as_ref(),
            &pair.symbol,
            pair.timeframe,
            self.strategy.candles_to_fetch(),
            self.strategy.min_candles_required(),
        );

        match tokio::time::timeout(self.fetch_timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout {
                symbol: pair.symbol.clone(),
                timeframe: pair.timeframe,
                secs: self.fetch_timeout.as_secs(),
            }),
        }
    }
}
