//! Integration test: start the gateway on a free port with LINE and Gemini pointed at a
//! mock server, then drive it over HTTP like the LINE platform would.
//! The server task is left running when the test ends.

use lib::channels::signature;
use lib::config::Config;
use lib::gateway;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

const SECRET: &str = "integration-secret";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn test_config(port: u16, mock_url: &str) -> Config {
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.channels.line.channel_access_token = Some("line-token".to_string());
    config.channels.line.channel_secret = Some(SECRET.to_string());
    config.channels.line.api_base = Some(mock_url.to_string());
    config.gemini.api_key = Some("gemini-key".to_string());
    config.gemini.base_url = Some(mock_url.to_string());
    config
}

async fn wait_for_health(client: &reqwest::Client, port: u16) {
    let url = format!("http://127.0.0.1:{}/", port);
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}

async fn post_signed(client: &reqwest::Client, port: u16, body: &str) -> reqwest::StatusCode {
    let sig = signature::sign(SECRET, body.as_bytes()).expect("sign body");
    client
        .post(format!("http://127.0.0.1:{}/callback", port))
        .header("content-type", "application/json")
        .header("X-Line-Signature", sig)
        .body(body.to_string())
        .send()
        .await
        .expect("post webhook")
        .status()
}

async fn wait_until_matched(mock: &mockito::Mock) {
    for _ in 0..100 {
        if mock.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("mock was not called within 5s");
}

fn text_event(reply_token: &str, text: &str) -> String {
    json!({
        "destination": "U0",
        "events": [{
            "type": "message",
            "replyToken": reply_token,
            "source": { "type": "user", "userId": "U1" },
            "message": { "type": "text", "id": "1", "text": text }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn webhook_generates_and_replies() {
    let mut server = mockito::Server::new_async().await;
    let gemini = server
        .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
        .match_header("x-goog-api-key", "gemini-key")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "parts": [{ "text": "which gaming laptop?" }] }]
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "candidates": [{ "content": { "role": "model", "parts": [{ "text": "ASUS ROG Strix G15" }] } }]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let line = server
        .mock("POST", "/v2/bot/message/reply")
        .match_header("authorization", "Bearer line-token")
        .match_body(Matcher::Json(json!({
            "replyToken": "rt-gen",
            "messages": [{ "type": "text", "text": "ASUS ROG Strix G15" }]
        })))
        .with_body("{}")
        .create_async()
        .await;

    let port = free_port();
    let config = test_config(port, &server.url());
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let client = reqwest::Client::new();
    wait_for_health(&client, port).await;

    let status = post_signed(&client, port, &text_event("rt-gen", "Which GAMING laptop?")).await;
    assert_eq!(status, reqwest::StatusCode::OK);

    wait_until_matched(&line).await;
    gemini.assert_async().await;
}

#[tokio::test]
async fn webhook_keyword_reply_skips_generation() {
    let mut server = mockito::Server::new_async().await;
    let gemini = server
        .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
        .expect(0)
        .create_async()
        .await;
    let line = server
        .mock("POST", "/v2/bot/message/reply")
        .match_body(Matcher::PartialJson(json!({
            "replyToken": "rt-bye",
            "messages": [{ "text": lib::reply::CLOSING_REPLY }]
        })))
        .with_body("{}")
        .create_async()
        .await;

    let port = free_port();
    let config = test_config(port, &server.url());
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let client = reqwest::Client::new();
    wait_for_health(&client, port).await;

    let status = post_signed(&client, port, &text_event("rt-bye", "結束對話")).await;
    assert_eq!(status, reqwest::StatusCode::OK);

    wait_until_matched(&line).await;
    gemini.assert_async().await;
}

#[tokio::test]
async fn webhook_rejects_unsigned_requests() {
    let server = mockito::Server::new_async().await;
    let port = free_port();
    let config = test_config(port, &server.url());
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let client = reqwest::Client::new();
    wait_for_health(&client, port).await;

    let status = client
        .post(format!("http://127.0.0.1:{}/webhook", port))
        .body(text_event("rt", "嗨"))
        .send()
        .await
        .expect("post webhook")
        .status();
    assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gateway_refuses_to_start_without_credentials() {
    let mut config = Config::default();
    config.gateway.bind = "127.0.0.1".to_string();
    config.gateway.port = free_port();
    let err = gateway::run_gateway(config).await.expect_err("missing credentials");
    let msg = err.to_string();
    assert!(msg.contains("CHANNEL_ACCESS_TOKEN"));
    assert!(msg.contains("CHANNEL_SECRET"));
    assert!(msg.contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn gateway_refuses_zero_generation_timeout() {
    let mut config = test_config(free_port(), "http://127.0.0.1:9");
    config.gemini.timeout_secs = 0;
    let err = gateway::run_gateway(config).await.expect_err("zero timeout");
    assert!(err.to_string().contains("timeoutSecs"));
}
