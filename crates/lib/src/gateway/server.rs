//! Gateway HTTP server: health check and the LINE webhook.

use crate::channels::{
    signature, ChannelHandle, InboundMessage, LineChannel, WebhookBody, SIGNATURE_HEADER,
};
use crate::config::{Config, Credentials};
use crate::llm::{GeminiClient, TextGenerator};
use crate::reply;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Inbound events waiting for a reply decision.
const INBOUND_QUEUE: usize = 64;

/// Shared state for the gateway, built once at startup.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub credentials: Arc<Credentials>,
    /// Sender for inbound messages parsed from webhook POSTs. The router holds the only
    /// long-lived clone, so the queue closes once the server has drained.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    pub channel: Arc<dyn ChannelHandle>,
}

/// Routes: `GET /` health, `POST /callback` and `POST /webhook` for LINE.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(line_webhook))
        .route("/webhook", post(line_webhook))
        .with_state(state)
}

/// Answer one inbound message: lowercase, decide, reply through the channel.
async fn process_inbound_message(
    channel: Arc<dyn ChannelHandle>,
    generator: Arc<dyn TextGenerator>,
    msg: InboundMessage,
) {
    let normalized = msg.text.to_lowercase();
    let reply = reply::decide_reply(&normalized, generator.as_ref()).await;
    if let Err(e) = channel.reply_message(&msg.reply_token, reply.as_str()).await {
        log::warn!(
            "inbound: reply to {} via {} failed: {}",
            msg.conversation_id,
            msg.channel_id,
            e
        );
    } else {
        log::debug!("inbound: replied to {} via {}", msg.conversation_id, msg.channel_id);
    }
}

/// Drain the inbound queue, handling each message in its own task.
/// The returned handle resolves once every sender is gone and all replies in flight are done.
pub fn spawn_inbound_processor(
    channel: Arc<dyn ChannelHandle>,
    generator: Arc<dyn TextGenerator>,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut replies = JoinSet::new();
        loop {
            tokio::select! {
                msg = inbound_rx.recv() => match msg {
                    Some(msg) => {
                        replies.spawn(process_inbound_message(
                            channel.clone(),
                            generator.clone(),
                            msg,
                        ));
                    }
                    None => break,
                },
                Some(done) = replies.join_next(), if !replies.is_empty() => {
                    if let Err(e) = done {
                        log::warn!("inbound: reply task failed: {}", e);
                    }
                }
            }
        }
        log::debug!(
            "inbound: queue closed, waiting for {} replies in flight",
            replies.len()
        );
        while let Some(done) = replies.join_next().await {
            if let Err(e) = done {
                log::warn!("inbound: reply task failed: {}", e);
            }
        }
        log::debug!("inbound: processor stopped");
    })
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Fails before binding when any credential is missing. Blocks until shutdown (e.g. Ctrl+C),
/// then waits for replies still being generated.
pub async fn run_gateway(config: Config) -> Result<()> {
    config.validate()?;
    let credentials = Credentials::from_config(&config)?;
    let generator = GeminiClient::new(&config.gemini, credentials.gemini_api_key.clone())
        .context("building gemini client")?;
    log::info!("generation model: {}", generator.model());
    let channel: Arc<dyn ChannelHandle> = Arc::new(LineChannel::new(
        credentials.channel_access_token.clone(),
        config.channels.line.api_base.clone(),
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE);
    let processor = spawn_inbound_processor(channel.clone(), Arc::new(generator), inbound_rx);
    let state = GatewayState {
        config: Arc::new(config.clone()),
        credentials: Arc::new(credentials),
        inbound_tx,
        channel,
    };

    let app = router(state);
    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    // serve has dropped the router, and with it the last inbound sender
    if let Err(e) = processor.await {
        log::warn!("inbound processor ended abnormally: {}", e);
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /callback, /webhook: verifies X-Line-Signature, queues one InboundMessage per text event.
/// 503 means the gateway is shutting down; it is checked before anything is queued, so a batch
/// is only split if the queue closes part way through it.
async fn line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(&state.credentials.channel_secret, &body, provided) {
        log::warn!("line webhook: rejected request: {}", e);
        return StatusCode::BAD_REQUEST;
    }
    log::debug!("line webhook: body {}", String::from_utf8_lossy(&body));

    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            log::warn!("line webhook: malformed body: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };
    if state.inbound_tx.is_closed() {
        log::warn!("line webhook: inbound queue closed, rejecting {} events", payload.events.len());
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    for event in payload.events {
        let typ = event.typ.clone();
        let Some(inbound) = event.into_inbound() else {
            log::debug!("line webhook: ignoring {} event", typ);
            continue;
        };
        if state.inbound_tx.send(inbound).await.is_err() {
            return StatusCode::SERVICE_UNAVAILABLE;
        }
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "channel": state.channel.id(),
        "port": state.config.gateway.port,
    }))
}
