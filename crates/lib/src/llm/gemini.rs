//! Gemini API client (https://generativelanguage.googleapis.com by default).
//! Non-streaming `generateContent` with a fixed generation config.

use crate::config::GeminiConfig;
use crate::llm::{LlmError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, or why there is none.
    pub fn text(&self) -> Result<String, LlmError> {
        let Some(candidate) = self.candidates.first() else {
            let reason = self
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::Blocked(reason));
        };
        let text: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(match candidate.finish_reason.as_deref() {
                Some(reason) if reason != "STOP" => LlmError::Blocked(reason.to_string()),
                _ => LlmError::EmptyResponse,
            });
        }
        Ok(text)
    }
}

/// Client for the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    generation_config: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url,
            model: config.model.trim().to_string(),
            api_key: api_key.into(),
            generation_config: GenerationConfig::default(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for a single-prompt call.
    pub fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            generation_config: self.generation_config.clone(),
        }
    }

    /// POST /v1beta/models/{model}:generateContent
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        Ok(res.json().await?)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(prompt);
        let response = self.generate_content(&request).await?;
        response.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> GeminiClient {
        let config = GeminiConfig {
            base_url: Some(format!("{}/", server.url())),
            ..GeminiConfig::default()
        };
        GeminiClient::new(&config, "test-key").unwrap()
    }

    #[test]
    fn request_carries_fixed_generation_config() {
        let client = GeminiClient::new(&GeminiConfig::default(), "k").unwrap();
        let body = serde_json::to_value(client.build_request("推薦一台筆電")).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "推薦一台筆電" }] }],
                "generationConfig": {
                    "temperature": 1.0,
                    "topP": 0.95f32,
                    "topK": 64,
                    "maxOutputTokens": 8192,
                    "responseMimeType": "text/plain"
                }
            })
        );
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "ROG " }, { "text": "Strix" }] }, "finishReason": "STOP" },
                { "content": { "role": "model", "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.text().unwrap(), "ROG Strix");
    }

    #[test]
    fn response_without_candidates_is_blocked() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(matches!(response.text(), Err(LlmError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn empty_candidate_text_is_an_error() {
        let stopped: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "" }] }, "finishReason": "STOP" }]
        }))
        .unwrap();
        assert!(matches!(stopped.text(), Err(LlmError::EmptyResponse)));

        let cut: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert!(matches!(cut.text(), Err(LlmError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn whitespace_candidate_text_is_returned_as_is() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": " \n" }] }, "finishReason": "STOP" }]
        }))
        .unwrap();
        assert_eq!(response.text().unwrap(), " \n");
    }

    #[tokio::test]
    async fn generate_posts_prompt_and_returns_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "contents": [{ "parts": [{ "text": "哪台筆電適合遊戲？" }] }],
                "generationConfig": { "topK": 64, "maxOutputTokens": 8192 }
            })))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "candidates": [{ "content": { "role": "model", "parts": [{ "text": "ASUS ROG 系列。" }] } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let text = client.generate("哪台筆電適合遊戲？").await.unwrap();
        assert_eq!(text, "ASUS ROG 系列。");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_maps_http_error_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(429)
            .with_body(r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        match err {
            LlmError::Api(msg) => assert!(msg.contains("429") && msg.contains("RESOURCE_EXHAUSTED")),
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn generate_rejects_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_body("not json")
            .create_async()
            .await;

        let err = client_for(&server).generate("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Request(_)));
    }
}
