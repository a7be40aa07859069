use crate::domain::model::ReplyMessage;
use crate::domain::ports::Messenger;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

type HmacSha256 = Hmac<Sha256>;

/// Checks `X-Line-Signature`: base64 of HMAC-SHA256 over the raw body,
/// keyed by the channel secret.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    pub source: Option<EventSource>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub user_id: String,
    pub reply_token: String,
    pub text: String,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn text_messages(&self) -> impl Iterator<Item = TextMessageEvent> + '_ {
        self.events.iter().filter_map(WebhookEvent::as_text_message)
    }
}

impl WebhookEvent {
    pub fn as_text_message(&self) -> Option<TextMessageEvent> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref().filter(|m| m.kind == "text")?;
        Some(TextMessageEvent {
            user_id: self.source.as_ref()?.user_id.clone()?,
            reply_token: self.reply_token.clone()?,
            text: message.text.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OutgoingMessage<'a> {
    Text {
        text: &'a str,
    },
    Image {
        #[serde(rename = "originalContentUrl")]
        original_content_url: &'a str,
        #[serde(rename = "previewImageUrl")]
        preview_image_url: &'a str,
    },
}

impl<'a> From<&'a ReplyMessage> for OutgoingMessage<'a> {
    fn from(message: &'a ReplyMessage) -> Self {
        match message {
            ReplyMessage::Text(text) => OutgoingMessage::Text { text },
            ReplyMessage::Image {
                original_url,
                preview_url,
            } => OutgoingMessage::Image {
                original_content_url: original_url,
                preview_image_url: preview_url,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<OutgoingMessage<'a>>,
}

/// Messaging API client for reply messages.
#[derive(Debug, Clone)]
pub struct LineClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl LineClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl Messenger for LineClient {
    async fn reply(&self, reply_token: &str, messages: &[ReplyMessage]) -> Result<()> {
        let body = ReplyRequest {
            reply_token,
            messages: messages.iter().map(OutgoingMessage::from).collect(),
        };

        let url = format!("{}/v2/bot/message/reply", self.base_url);
        tracing::debug!("Sending {} reply message(s)", messages.len());
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("line", status, body));
        }
        Ok(())
    }
}
