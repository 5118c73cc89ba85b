//! LINE channel: webhook event payloads and the Messaging API reply call.

use crate::channels::inbound::InboundMessage;
use crate::channels::ChannelHandle;
use async_trait::async_trait;
use serde::Deserialize;

const LINE_API_BASE: &str = "https://api.line.me";
const CHANNEL_ID: &str = "line";

/// LINE rejects text messages longer than this, counted in UTF-16 code units.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Webhook POST body.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event. Only text message events are answered; the rest are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl EventSource {
    /// Group or room id when the message came from one, else the user id.
    fn conversation_id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or(self.room_id.as_deref())
            .or(self.user_id.as_deref())
    }
}

impl WebhookEvent {
    /// Text message events with a reply token become inbound messages.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        if self.typ != "message" {
            return None;
        }
        let message = self.message?;
        if message.typ != "text" {
            return None;
        }
        let conversation_id = self
            .source
            .as_ref()
            .and_then(EventSource::conversation_id)
            .unwrap_or("")
            .to_string();
        Some(InboundMessage {
            channel_id: CHANNEL_ID.to_string(),
            conversation_id,
            reply_token: self.reply_token?,
            text: message.text.unwrap_or_default(),
        })
    }
}

/// Cut `text` to at most `max` UTF-16 code units without splitting a character.
pub(crate) fn truncate_utf16(text: &str, max: usize) -> &str {
    let mut units = 0;
    for (i, c) in text.char_indices() {
        units += c.len_utf16();
        if units > max {
            return &text[..i];
        }
    }
    text
}

/// LINE Messaging API connector: sends replies with the channel access token.
pub struct LineChannel {
    id: String,
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(token: impl Into<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        Self {
            id: CHANNEL_ID.to_string(),
            token: token.into(),
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// Reply to an event via POST /v2/bot/message/reply.
    pub async fn reply_message(&self, reply_token: &str, text: &str) -> Result<(), String> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let text = truncate_utf16(text, MAX_TEXT_CHARS);
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }]
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("reply failed: {} {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelHandle for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn reply_message(&self, reply_token: &str, text: &str) -> Result<(), String> {
        LineChannel::reply_message(self, reply_token, text).await
    }
}
