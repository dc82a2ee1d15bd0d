use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::{IMAGE_SEND_TIMEOUT_SECS, TEXT_SEND_TIMEOUT_SECS};
use crate::error::NotifyError;
use crate::notify::NotificationSink;
use crate::types::ChartImage;

/// Telegram Bot API sink. Raster charts go through `sendPhoto`; anything else
/// (SVG) is uploaded with `sendDocument`, which accepts the same caption.
pub struct TelegramSink {
    client: reqwest::Client,
    api_url: String,
    token: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    description: Option<String>,
}

impl TelegramSink {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn check(resp: reqwest::Response) -> Result<(), NotifyError> {
        let status = resp.status();
        let body = resp.text().await?;
        match serde_json::from_str::<ApiReply>(&body) {
            Ok(reply) if reply.ok && status.is_success() => Ok(()),
            Ok(reply) => Err(NotifyError::Rejected(
                reply.description.unwrap_or_else(|| status.to_string()),
            )),
            Err(_) => Err(NotifyError::Rejected(format!("{status}: {body}"))),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(Duration::from_secs(TEXT_SEND_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!("Telegram text delivered ({} chars)", text.len());
        Ok(())
    }

    async fn send_image(&self, image: &ChartImage, caption: &str) -> Result<(), NotifyError> {
        let (method, field) = upload_method(image);
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.media_type)?;
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "Markdown")
            .part(field, part);

        let resp = self
            .client
            .post(self.method_url(method))
            .timeout(Duration::from_secs(IMAGE_SEND_TIMEOUT_SECS))
            .multipart(form)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(file = %image.file_name, "Telegram {method} delivered");
        Ok(())
    }
}

/// Raster charts go inline as photos; anything else is attached as a file.
fn upload_method(image: &ChartImage) -> (&'static str, &'static str) {
    if image.is_raster() {
        ("sendPhoto", "photo")
    } else {
        ("sendDocument", "document")
    }
}
