// Core modules
pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod scanner;
pub mod strategy;
pub mod subscribers;
pub mod tracking;

// Re-export commonly used types
pub use api::{MarketDataProvider, NotificationSink};
pub use error::ScanError;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, ScanError>;
