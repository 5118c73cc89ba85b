//! Reply decision: canned answers for thanks / closing / greeting, otherwise Gemini.
//!
//! Input is expected to be lowercased by the caller. Matching is substring containment,
//! checked in the order thanks, closing, greeting; the first hit wins and no generation
//! call is made.

use crate::llm::TextGenerator;
use std::fmt;

pub const THANKS_KEYWORDS: &[&str] = &["謝謝", "感謝"];
pub const CLOSING_KEYWORDS: &[&str] = &["結束對話", "沒有了"];
pub const GREETING_KEYWORDS: &[&str] = &["你好", "嗨"];

pub const THANKS_REPLY: &str = "不客氣，很高兴为您服务！";
pub const CLOSING_REPLY: &str =
    "好的，謝謝您使用筆記本電腦小助手！如果您还有任何关于笔记本电脑的问题，随时都可以问我！";
pub const GREETING_REPLY: &str = "你好！請問您想了解什麼筆記本電腦資訊呢？";
pub const APOLOGY_REPLY: &str = "抱歉，我無法處理您的請求。";
pub const GUIDANCE_REPLY: &str = "請問您想問什麼呢？請提供更多資訊，例如：\n\n\
用途：日常使用、工作、遊戲、學習等等\n\
特定產品：例如 ASUS ROG Strix G15、ASUS ZenBook 13 UX325 等等\n\
問題：例如 \"ASUS 的電競品牌是什麼？\"、\"ASUS ZenBook 13 的價格是多少？\" 等等\n\n\
提供更多資訊，我可以更準確地為您解答。";

/// Text sent back to the user. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyText(String);

impl ReplyText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CannedReply> for ReplyText {
    fn from(canned: CannedReply) -> Self {
        ReplyText(canned.text().to_string())
    }
}

/// Fixed replies that need no generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedReply {
    Thanks,
    Closing,
    Greeting,
    Apology,
    Guidance,
}

impl CannedReply {
    pub fn text(self) -> &'static str {
        match self {
            CannedReply::Thanks => THANKS_REPLY,
            CannedReply::Closing => CLOSING_REPLY,
            CannedReply::Greeting => GREETING_REPLY,
            CannedReply::Apology => APOLOGY_REPLY,
            CannedReply::Guidance => GUIDANCE_REPLY,
        }
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

/// Keyword rule for `message`, if one applies. Empty input maps to the guidance reply.
pub fn match_keywords(message: &str) -> Option<CannedReply> {
    if contains_any(message, THANKS_KEYWORDS) {
        Some(CannedReply::Thanks)
    } else if contains_any(message, CLOSING_KEYWORDS) {
        Some(CannedReply::Closing)
    } else if contains_any(message, GREETING_KEYWORDS) {
        Some(CannedReply::Greeting)
    } else if message.is_empty() {
        Some(CannedReply::Guidance)
    } else {
        None
    }
}

/// Decide the reply for an already-lowercased message. Never fails: generation errors
/// are logged and answered with the apology text.
pub async fn decide_reply(message: &str, generator: &dyn TextGenerator) -> ReplyText {
    if let Some(canned) = match_keywords(message) {
        log::debug!("reply: keyword rule {:?}", canned);
        return canned.into();
    }

    match generator.generate(message).await {
        Ok(text) if !text.is_empty() => ReplyText(text),
        Ok(_) => {
            log::warn!("reply: generation returned empty text");
            CannedReply::Apology.into()
        }
        Err(e) => {
            log::warn!("reply: generation failed: {}", e);
            CannedReply::Apology.into()
        }
    }
}
