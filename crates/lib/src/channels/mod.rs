//! Communication channels (LINE).
//!
//! Webhook payload types, signature verification, and the reply connector the gateway
//! uses to answer inbound messages.

mod inbound;
mod line;
pub mod signature;

pub use inbound::InboundMessage;
pub use line::{
    EventMessage, EventSource, LineChannel, WebhookBody, WebhookEvent, MAX_TEXT_CHARS,
};
pub use signature::{SignatureError, SIGNATURE_HEADER};

use async_trait::async_trait;

/// Handle to a reply-capable channel.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;
    /// Answer an inbound event identified by its reply token.
    async fn reply_message(&self, reply_token: &str, text: &str) -> Result<(), String>;
}
