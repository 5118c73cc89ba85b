//! Inbound message from a channel: delivered to the gateway for a reply decision.

/// A user's text message plus what is needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel_id: String,
    /// Source of the message (LINE user, group or room id). Used for logging only.
    pub conversation_id: String,
    /// Single-use token issued by the platform for this event; required to reply.
    pub reply_token: String,
    pub text: String,
}
