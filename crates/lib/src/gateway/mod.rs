//! Gateway: HTTP server for the LINE webhook.
//!
//! Single port. Webhook requests are verified and queued; a processor task decides each
//! reply and sends it back through the channel.

mod server;

pub use server::{router, run_gateway, spawn_inbound_processor, GatewayState};
