// Signal identity, deduplication and trade lifecycle tracking
pub mod fingerprint;
pub mod tracker;

pub use fingerprint::{fingerprint, SignalRegistry, SignalStatus};
pub use tracker::{LifecycleEvent, LifecycleKind, TrackedTrade, TradeStatus, TradeTracker};
