use crate::models::Signal;
use crate::tracking::{LifecycleEvent, LifecycleKind, SignalStatus};

fn price_or_na(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Multi-line broadcast text for a confirmed signal
pub fn signal_message(signal: &Signal, status: &SignalStatus, ema_period: usize) -> String {
    let levels = &signal.levels;
    let lines = [
        format!("{} — {}", signal.symbol, signal.timeframe),
        format!("📌 Bias: {}", signal.bias),
        format!(
            "🔎 Support: {:.2} | Resistance: {:.2}",
            levels.support, levels.resistance
        ),
        format!(
            "💧 Liquidity: high {} | low {}",
            price_or_na(levels.liquidity_high),
            price_or_na(levels.liquidity_low)
        ),
        format!("🧱 Order block: {}", price_or_na(levels.order_block)),
        format!("🎯 Entry: {:.2}", signal.entry_price),
        format!("🛑 SL: {:.2}", signal.stop_price),
        format!(
            "🏁 TP1: {:.2} | TP2: {:.2} | TP3: {:.2}",
            signal.targets[0], signal.targets[1], signal.targets[2]
        ),
        format!("🔁 EMA{}: {:.2}", ema_period, levels.ema),
        format!("📊 Recent Volume: {:.2}", signal.recent_volume),
        format!("🧠 Confluence: {}", signal.rationale),
        "Note: Follow discipline.".to_string(),
    ];

    let body = lines.join("\n");
    match status {
        SignalStatus::Supersedes { .. } => format!("🔄 Updated setup\n{}", body),
        _ => body,
    }
}

pub fn lifecycle_message(event: &LifecycleEvent) -> String {
    let outcome = match event.kind {
        LifecycleKind::TargetHit { index } => format!("✅ TP{} hit", index + 1),
        LifecycleKind::StopHit => "❌ Stop Loss hit".to_string(),
    };
    format!(
        "{} — {} {} at {:.2}",
        event.symbol, event.timeframe, outcome, event.price
    )
}
