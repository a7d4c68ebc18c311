pub mod binance;
pub mod telegram;

use async_trait::async_trait;

use crate::chart::ChartImage;
use crate::models::{Candle, Timeframe};
use crate::subscribers::RecipientId;
use crate::Result;

pub use binance::BinanceClient;
pub use telegram::{TelegramClient, Update};

/// Source of OHLCV candles
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>>;
}

/// Delivery channel for notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<()>;

    async fn send_image(
        &self,
        recipient: &RecipientId,
        image: &ChartImage,
        caption: &str,
    ) -> Result<()>;
}
