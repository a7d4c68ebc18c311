use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::Duration;

use super::NotificationSink;
use crate::chart::ChartImage;
use crate::error::ScanError;
use crate::subscribers::RecipientId;
use crate::Result;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Telegram Bot API envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Minimal Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(TELEGRAM_API_BASE, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ScanError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> std::result::Result<T, String> {
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| format!("HTTP {}: {}", status, e))?;

        if !body.ok {
            return Err(body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status)));
        }

        body.result
            .ok_or_else(|| "Response missing result".to_string())
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let outcome = match self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => Self::read_response::<serde_json::Value>(response).await,
            Err(e) => Err(e.to_string()),
        };

        outcome.map(|_| ()).map_err(|reason| ScanError::Delivery {
            recipient: chat_id.to_string(),
            reason,
        })
    }

    /// Upload a file with a caption
    pub async fn send_document(
        &self,
        chat_id: &str,
        image: &ChartImage,
        caption: &str,
    ) -> Result<()> {
        let delivery_error = |reason: String| ScanError::Delivery {
            recipient: chat_id.to_string(),
            reason,
        };

        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)
            .map_err(|e| delivery_error(e.to_string()))?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;

        Self::read_response::<serde_json::Value>(response)
            .await
            .map(|_| ())
            .map_err(delivery_error)
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut query = vec![("timeout", timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(Duration::from_secs(timeout_secs + REQUEST_TIMEOUT_SECS))
            .send()
            .await?;

        Self::read_response(response)
            .await
            .map_err(|reason| ScanError::Provider(format!("getUpdates failed: {}", reason)))
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send_text(&self, recipient: &RecipientId, text: &str) -> Result<()> {
        self.send_message(recipient.as_str(), text).await
    }

    async fn send_image(
        &self,
        recipient: &RecipientId,
        image: &ChartImage,
        caption: &str,
    ) -> Result<()> {
        self.send_document(recipient.as_str(), image, caption).await
    }
}
