//! WhatsApp Business Cloud API transport

use super::{ChatTransport, InboundMessage, TransportError};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Webhook payload, reduced to the fields the gateway reads

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
struct WebhookChange {
    value: WebhookValue,
}

#[derive(Debug, Deserialize)]
struct WebhookValue {
    #[serde(default)]
    messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    from: String,
    id: String,
    #[serde(default)]
    timestamp: String,
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    body: String,
}

/// Header carrying the HMAC-SHA256 of the raw webhook body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Check a `sha256=<hex>` signature of `body` keyed by the app secret
pub fn verify_signature(app_secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(hex_sig) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    // Constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

/// Extract text messages from a raw webhook notification.
///
/// Status updates and non-text messages are skipped.
pub fn parse_webhook(body: &[u8]) -> Result<Vec<InboundMessage>, serde_json::Error> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;

    let messages = payload
        .entry
        .into_iter()
        .flat_map(|entry| entry.changes)
        .flat_map(|change| change.value.messages)
        .filter_map(|message| {
            let Some(text) = message.text else {
                tracing::debug!(id = %message.id, kind = %message.kind, "Skipping non-text message");
                return None;
            };
            Some(InboundMessage {
                timestamp: message.timestamp.parse().unwrap_or(0),
                id: message.id,
                from: message.from,
                body: text.body,
            })
        })
        .collect();

    Ok(messages)
}

/// Sends through `<api_base>/<phone_number_id>/messages`
pub struct WhatsAppCloudTransport {
    client: Client,
    messages_url: String,
    access_token: String,
}

impl WhatsAppCloudTransport {
    pub fn new(config: &WhatsAppConfig) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            messages_url: format!("{}/{}/messages", config.api_base, config.phone_number_id),
            access_token: config.access_token.clone(),
        })
    }

    async fn post(&self, body: &Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for WhatsAppCloudTransport {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn show_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        self.post(&json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message.id,
            "typing_indicator": { "type": "text" }
        }))
        .await
    }

    async fn clear_typing(&self, message: &InboundMessage) -> Result<(), TransportError> {
        // The platform drops the indicator on the next outbound message
        tracing::debug!(to = %message.from, "Typing indicator cleared by reply");
        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), TransportError> {
        self.post(&json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text }
        }))
        .await?;
        tracing::info!(to, "WhatsApp message sent");
        Ok(())
    }
}
