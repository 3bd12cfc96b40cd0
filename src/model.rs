//! # Model Client Module
//!
//! Thin client for an OpenAI-compatible chat-completion endpoint, behind the
//! [`ChatModel`] trait so the extraction and generation pipelines can be
//! exercised against scripted models in tests.
//!
//! Model output is untrusted: it may arrive wrapped in markdown code fences
//! even when instructed not to, so [`strip_code_fences`] runs before any
//! JSON parsing.

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;

use crate::config::{ModelConfig, RecoveryConfig};
use crate::errors::FridgeError;

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"```(?:json)?").expect("code fence pattern should be valid");
}

/// Strip markdown code-fence delimiters from raw model output
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// One chat-completion request: a system instruction plus a user turn that
/// may carry a base64-encoded image.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user_text: String,
    /// Base64 JPEG payload attached to the user turn, if any
    pub user_image_b64: Option<String>,
    pub temperature: f32,
}

/// Abstraction over the external chat-completion model
///
/// Returns the raw assistant text; callers own fence stripping and parsing.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, FridgeError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// `reqwest`-backed client for an OpenAI-compatible provider
///
/// Applies a bounded per-request timeout and a single jittered retry on
/// transport failure. The API key is read from the environment at call time,
/// never stored in source.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: ModelConfig,
    recovery: RecoveryConfig,
}

impl OpenAiChatModel {
    pub fn new(config: ModelConfig, recovery: RecoveryConfig) -> Result<Self, FridgeError> {
        dotenv::dotenv().ok();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(recovery.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            recovery,
        })
    }

    fn api_key(&self) -> Result<String, FridgeError> {
        env::var(&self.config.api_key_env).map_err(|_| {
            FridgeError::Transport(format!(
                "API key not found in environment: {}",
                self.config.api_key_env
            ))
        })
    }

    fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        let user_content = match &request.user_image_b64 {
            Some(b64) => json!([
                { "type": "text", "text": request.user_text },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/jpeg;base64,{b64}") }
                }
            ]),
            None => json!(request.user_text),
        };

        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": user_content }
            ],
            "temperature": request.temperature,
        })
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, FridgeError> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!("Sending chat completion request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.build_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(FridgeError::Transport(format!(
                "provider returned {status}: {error_body}"
            )));
        }

        let completion = response.json::<ChatCompletionResponse>().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        info!(
            "Chat completion succeeded, {} characters of content",
            content.len()
        );
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, FridgeError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(request).await {
                Ok(content) => return Ok(content),
                Err(FridgeError::Transport(msg)) if attempt < self.recovery.max_retries => {
                    attempt += 1;
                    let jitter = rand::thread_rng().gen_range(0..=self.recovery.retry_jitter_ms);
                    let delay = self.recovery.base_retry_delay_ms + jitter;
                    warn!(
                        "Model call failed (attempt {attempt}): {msg}; retrying in {delay}ms"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_json_fence() {
        let raw = "```json\n{\"items\": []}\n```";
        assert_eq!(strip_code_fences(raw), "{\"items\": []}");
    }

    #[test]
    fn test_strip_code_fences_bare_fence() {
        let raw = "```\n{\"recipes\": []}\n```";
        assert_eq!(strip_code_fences(raw), "{\"recipes\": []}");
    }

    #[test]
    fn test_strip_code_fences_no_fence() {
        let raw = "  {\"recipes\": []}  ";
        assert_eq!(strip_code_fences(raw), "{\"recipes\": []}");
    }

    #[test]
    fn test_build_body_with_image() {
        let model = OpenAiChatModel::new(ModelConfig::default(), RecoveryConfig::default())
            .expect("client should build");
        let request = ChatRequest {
            system: "sys".to_string(),
            user_text: "Scan this receipt.".to_string(),
            user_image_b64: Some("QUJD".to_string()),
            temperature: 0.2,
        };

        let body = model.build_body(&request);
        let content = &body["messages"][1]["content"];
        assert!(content.is_array());
        assert_eq!(content[0]["type"], "text");
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_build_body_text_only() {
        let model = OpenAiChatModel::new(ModelConfig::default(), RecoveryConfig::default())
            .expect("client should build");
        let request = ChatRequest {
            system: "sys".to_string(),
            user_text: "Generate 4 recipes now.".to_string(),
            user_image_b64: None,
            temperature: 0.7,
        };

        let body = model.build_body(&request);
        assert_eq!(body["messages"][1]["content"], "Generate 4 recipes now.");
        assert_eq!(body["model"], "openai/gpt-4o");
    }
}
