use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::NotificationIntent;
use crate::api::NotificationSink;
use crate::chart::{ChartImage, ChartRenderer};
use crate::subscribers::{RecipientId, SubscriberRegistry};
use crate::Result;

/// Broadcasts intents to every subscriber
///
/// Each intent's chart is rendered once. Deliveries run as independent tasks
/// capped by a semaphore, and a failed delivery is logged without affecting
/// the other recipients or the scan loop.
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    renderer: Arc<dyn ChartRenderer>,
    registry: SubscriberRegistry,
    permits: Arc<Semaphore>,
}

impl Notifier {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        renderer: Arc<dyn ChartRenderer>,
        registry: SubscriberRegistry,
        max_concurrent_sends: usize,
    ) -> Self {
        Self {
            sink,
            renderer,
            registry,
            permits: Arc::new(Semaphore::new(max_concurrent_sends.max(1))),
        }
    }

    /// Spawn one delivery task per (intent, recipient)
    ///
    /// Dropping the returned handles detaches the tasks.
    pub fn dispatch(&self, intents: Vec<NotificationIntent>) -> Vec<JoinHandle<()>> {
        if intents.is_empty() {
            return Vec::new();
        }

        let recipients = match self.registry.list_recipients() {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!("Cannot read subscribers, dropping {} notifications: {}", intents.len(), e);
                return Vec::new();
            }
        };

        if recipients.is_empty() {
            tracing::warn!("No subscribers, dropping {} notifications", intents.len());
            return Vec::new();
        }

        let mut handles = Vec::with_capacity(intents.len() * recipients.len());

        for intent in intents {
            let image = intent.chart.as_ref().and_then(|request| {
                match self.renderer.render(&request.series, &request.levels, &request.title) {
                    Ok(image) => Some(Arc::new(image)),
                    Err(e) => {
                        tracing::warn!("{}: sending text only ({})", request.title, e);
                        None
                    }
                }
            });
            let text: Arc<str> = Arc::from(intent.text);

            tracing::debug!("Dispatching {:?} to {} subscribers", intent.kind, recipients.len());

            for recipient in &recipients {
                handles.push(tokio::spawn(deliver(
                    self.sink.clone(),
                    self.permits.clone(),
                    recipient.clone(),
                    text.clone(),
                    image.clone(),
                )));
            }
        }

        handles
    }

    /// Send a plain message to one chat, used for command replies
    pub async fn send_direct(&self, recipient: &RecipientId, text: &str) -> Result<()> {
        self.sink.send_text(recipient, text).await
    }
}

async fn deliver(
    sink: Arc<dyn NotificationSink>,
    permits: Arc<Semaphore>,
    recipient: RecipientId,
    text: Arc<str>,
    image: Option<Arc<ChartImage>>,
) {
    let Ok(_permit) = permits.acquire_owned().await else {
        return;
    };

    let result = match image {
        Some(image) => sink.send_image(&recipient, &image, &text).await,
        None => sink.send_text(&recipient, &text).await,
    };

    if let Err(e) = result {
        tracing::warn!("Failed to notify {}: {}", recipient, e);
    }
}

/// Sink that only logs, for dry runs
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<()> {
        tracing::info!("[dry-run] to {}:\n{}", recipient, text);
        Ok(())
    }

    async fn send_image(&self, recipient: &RecipientId, image: &ChartImage, caption: &str) -> Result<()> {
        tracing::info!(
            "[dry-run] to {}: {} ({} bytes)\n{}",
            recipient,
            image.file_name,
            image.bytes.len(),
            caption
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::models::{CandleSeries, LevelSet, Timeframe};
    use crate::notify::{ChartRequest, NotificationKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String, bool)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<()> {
            if self.fail_for.as_deref() == Some(recipient.as_str()) {
                return Err(ScanError::Delivery {
                    recipient: recipient.to_string(),
                    reason: "blocked".to_string(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), text.to_string(), false));
            Ok(())
        }

        async fn send_image(&self, recipient: &RecipientId, _image: &ChartImage, caption: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.to_string(), caption.to_string(), true));
            Ok(())
        }
    }

    struct CountingRenderer {
        calls: Mutex<usize>,
        fail: bool,
    }

    impl ChartRenderer for CountingRenderer {
        fn render(&self, _series: &CandleSeries, _levels: &LevelSet, title: &str) -> Result<ChartImage> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(ScanError::Render("boom".to_string()));
            }
            Ok(ChartImage {
                bytes: Vec::new(),
                file_name: format!("{}.svg", title),
                mime: "image/svg+xml".to_string(),
            })
        }
    }

    fn registry(ids: &[&str]) -> SubscriberRegistry {
        SubscriberRegistry::with_recipients(ids.iter().map(|id| (RecipientId::from(*id), "T".to_string())))
    }

    fn text_intent(text: &str) -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::StopHit,
            text: text.to_string(),
            chart: None,
        }
    }

    fn chart_intent() -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::NewSignal,
            text: "signal".to_string(),
            chart: Some(ChartRequest {
                series: CandleSeries::new("BTCUSDT", Timeframe::M5, Vec::new()),
                levels: LevelSet {
                    support: 1.0,
                    resistance: 2.0,
                    liquidity_high: None,
                    liquidity_low: None,
                    order_block: None,
                    ema: 1.5,
                    fair_value_gap_up: None,
                    fair_value_gap_down: None,
                    chart_pattern: None,
                },
                title: "BTCUSDT".to_string(),
            }),
        }
    }

    async fn join(handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_every_subscriber() {
        let sink = Arc::new(RecordingSink::default());
        let renderer = Arc::new(CountingRenderer { calls: Mutex::new(0), fail: false });
        let notifier = Notifier::new(sink.clone(), renderer.clone(), registry(&["1", "2", "3"]), 2);

        join(notifier.dispatch(vec![chart_intent(), text_intent("closed")])).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 6);
        assert_eq!(sent.iter().filter(|(_, _, image)| *image).count(), 3);
        // Rendered once, not once per recipient
        assert_eq!(*renderer.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_block_others() {
        let sink = Arc::new(RecordingSink {
            fail_for: Some("2".to_string()),
            ..Default::default()
        });
        let renderer = Arc::new(CountingRenderer { calls: Mutex::new(0), fail: false });
        let notifier = Notifier::new(sink.clone(), renderer, registry(&["1", "2", "3"]), 1);

        join(notifier.dispatch(vec![text_intent("hello")])).await;

        let mut recipients: Vec<String> = sink.sent.lock().unwrap().iter().map(|s| s.0.clone()).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_render_failure_falls_back_to_text() {
        let sink = Arc::new(RecordingSink::default());
        let renderer = Arc::new(CountingRenderer { calls: Mutex::new(0), fail: true });
        let notifier = Notifier::new(sink.clone(), renderer, registry(&["1"]), 4);

        join(notifier.dispatch(vec![chart_intent()])).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].2);
        assert_eq!(sent[0].1, "signal");
    }

    #[tokio::test]
    async fn test_no_subscribers_spawns_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let renderer = Arc::new(CountingRenderer { calls: Mutex::new(0), fail: false });
        let notifier = Notifier::new(sink, renderer.clone(), SubscriberRegistry::new(), 4);

        assert!(notifier.dispatch(vec![chart_intent()]).is_empty());
        assert_eq!(*renderer.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        let sink = LogSink;
        let image = ChartImage {
            bytes: b"<svg/>".to_vec(),
            file_name: "BTCUSDT_5m.svg".to_string(),
            mime: "image/svg+xml".to_string(),
        };
        tokio_test::assert_ok!(tokio_test::block_on(sink.send_text(&"1".into(), "hi")));
        tokio_test::assert_ok!(tokio_test::block_on(sink.send_image(&"1".into(), &image, "chart")));
    }
}
