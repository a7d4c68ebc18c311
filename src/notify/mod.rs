// Outbound notifications: message text, chart requests and fan-out

pub mod dispatcher;
pub mod messages;

use crate::models::{CandleSeries, LevelSet, Signal};
use crate::tracking::{LifecycleEvent, LifecycleKind, SignalStatus};

pub use dispatcher::{LogSink, Notifier};
pub use messages::{lifecycle_message, signal_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewSignal,
    TargetHit,
    StopHit,
}

/// Chart to render once and attach to every delivery of an intent
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub series: CandleSeries,
    pub levels: LevelSet,
    pub title: String,
}

/// A message the scanner wants broadcast to every subscriber
#[derive(Debug, Clone)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    pub text: String,
    pub chart: Option<ChartRequest>,
}

impl NotificationIntent {
    pub fn new_signal(
        signal: &Signal,
        status: &SignalStatus,
        series: &CandleSeries,
        ema_period: usize,
    ) -> Self {
        Self {
            kind: NotificationKind::NewSignal,
            text: signal_message(signal, status, ema_period),
            chart: Some(ChartRequest {
                series: series.clone(),
                levels: signal.levels.clone(),
                title: format!("{} — {} ({})", signal.symbol, signal.timeframe, signal.bias),
            }),
        }
    }

    pub fn lifecycle(event: &LifecycleEvent) -> Self {
        let kind = match event.kind {
            LifecycleKind::TargetHit { .. } => NotificationKind::TargetHit,
            LifecycleKind::StopHit => NotificationKind::StopHit,
        };

        Self {
            kind,
            text: lifecycle_message(event),
            chart: None,
        }
    }
}
