pub mod message;
pub mod telegram;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::types::ChartImage;

pub use telegram::TelegramSink;

/// Outbound channel. Callers log failures and move on; nothing is retried.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError>;
    async fn send_image(&self, image: &ChartImage, caption: &str) -> Result<(), NotifyError>;
}
