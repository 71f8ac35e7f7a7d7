use crate::config::RelayConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::Duration;

/// Who produced a turn in the remote conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One exchange half held by a conversation handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// Everything a backend needs to answer the next prompt of a conversation
#[derive(Debug, Clone, Copy)]
pub struct ChatContext<'a> {
    pub model: &'a str,
    pub system_instruction: &'a str,
    pub history: &'a [Turn],
}

/// The remote model's "send message" operation.
///
/// Implementations are stateless: the conversation history lives in the
/// handle and is passed in on every call.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `prompt` after `context.history` and return the reply text, which may be empty.
    async fn send_message(&self, context: ChatContext<'_>, prompt: &str) -> Result<String>;
}

/// Client for the Gemini `generateContent` API
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn send_message(&self, context: ChatContext<'_>, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No API key configured. Set GEMINI_API_KEY."))?;

        let payload = build_payload(context, prompt);
        tracing::debug!(
            model = context.model,
            turns = context.history.len(),
            prompt_len = prompt.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint(context.model))
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "{} {}",
                status.as_u16(),
                provider_error_message(&error_text)
            ));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to decode Gemini response")?;
        Ok(extract_text(&body))
    }
}

/// Build a `generateContent` body: system instruction, prior turns, then the new prompt.
pub fn build_payload(context: ChatContext<'_>, prompt: &str) -> Value {
    let mut contents: Vec<Value> = context
        .history
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role,
                "parts": [{"text": turn.text}]
            })
        })
        .collect();
    contents.push(json!({
        "role": TurnRole::User,
        "parts": [{"text": prompt}]
    }));

    let mut payload = json!({ "contents": contents });
    if !context.system_instruction.trim().is_empty() {
        payload["systemInstruction"] = json!({
            "parts": [{"text": context.system_instruction}]
        });
    }
    payload
}

/// Concatenate the text parts of the first candidate, skipping thought parts.
pub fn extract_text(response: &Value) -> String {
    let Some(parts) = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    else {
        return String::new();
    };

    parts
        .iter()
        .filter(|part| !part.get("thought").and_then(|t| t.as_bool()).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect()
}

/// Pull `error.message` out of a provider error body, or return the body as-is.
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
