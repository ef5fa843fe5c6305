//! Outbound messaging capability.

use async_trait::async_trait;
use tracing::info;

/// Something that can deliver a text message to a phone address.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `body` to `to`. Returns the provider's message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String, String>;
}

/// Logs messages instead of sending them.
pub struct DryRunMessenger;

/// Id reported for messages that were never sent.
pub const DRY_RUN_MESSAGE_ID: &str = "SMDUMMY123";

#[async_trait]
impl Messenger for DryRunMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, String> {
        let preview: String = body.chars().take(120).collect();
        let ellipsis = if body.chars().count() > 120 { "..." } else { "" };
        info!("[DRY RUN] Would send to {to}: {preview}{ellipsis}");
        Ok(DRY_RUN_MESSAGE_ID.to_string())
    }
}
