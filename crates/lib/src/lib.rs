//! linegem core library: reply rules, Gemini client, LINE channel, and the webhook gateway
//! used by the `linegem` binary.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod llm;
pub mod reply;
