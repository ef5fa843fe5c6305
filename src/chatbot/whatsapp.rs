//! WhatsApp client over the Twilio Messages API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::chatbot::messenger::Messenger;

const TWILIO_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// Transport prefix Twilio puts on WhatsApp addresses.
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

pub struct WhatsAppClient {
    account_sid: String,
    auth_token: String,
    from: String,
    base_url: String,
    http: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(account_sid: String, auth_token: String, from: String) -> Self {
        Self::with_base_url(account_sid, auth_token, from, TWILIO_API_URL.to_string())
    }

    pub fn with_base_url(account_sid: String, auth_token: String, from: String, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            account_sid,
            auth_token,
            from: whatsapp_address(&from),
            base_url,
            http,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }
}

#[async_trait]
impl Messenger for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, String> {
        let to = whatsapp_address(to);
        let params = [("From", self.from.as_str()), ("To", to.as_str()), ("Body", body)];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("✗ Failed to send to {to}: {e}");
                warn!("{}", msg);
                msg
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            let msg = format!("✗ Failed to send to {to}: {status}: {detail}");
            warn!("{}", msg);
            return Err(msg);
        }

        let sent: MessageResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse send response: {e}"))?;

        info!("✓ Message sent to {to} (sid: {})", sent.sid);
        Ok(sent.sid)
    }
}

/// Add the `whatsapp:` prefix unless already present.
pub fn whatsapp_address(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with(WHATSAPP_PREFIX) {
        phone.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{phone}")
    }
}

/// Remove the `whatsapp:` prefix from an inbound sender address.
pub fn strip_transport_prefix(address: &str) -> &str {
    address
        .trim()
        .strip_prefix(WHATSAPP_PREFIX)
        .unwrap_or(address.trim())
        .trim()
}
