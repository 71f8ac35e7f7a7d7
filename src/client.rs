//! HTTP client the chat UI uses to reach the prompt relay.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use crate::relay::{ErrorBody, RELAY_PATH, ResetAck, SESSION_HEADER, TextReply};

/// Failures seen by the UI when talking to the relay
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("relay unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error! status: {status}{}", with_detail(.detail))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },
}

fn with_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
}

/// Relay client bound to one base URL and, optionally, one session key
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    session: Option<String>,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
        }
    }

    /// Scope every request to `session` instead of the shared conversation.
    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.session = session;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a prompt and return the model's reply text.
    pub async fn send_prompt(&self, prompt: &str) -> Result<String, ClientError> {
        let reply: TextReply = self.post(json!({ "prompt": prompt })).await?;
        Ok(reply.text)
    }

    /// Ask the relay to start a fresh conversation.
    pub async fn reset(&self) -> Result<String, ClientError> {
        let ack: ResetAck = self.post(json!({ "action": "reset" })).await?;
        Ok(ack.message)
    }

    async fn post<T: DeserializeOwned>(&self, body: serde_json::Value) -> Result<T, ClientError> {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, RELAY_PATH))
            .json(&body);
        if let Some(session) = &self.session {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.json::<ErrorBody>().await.ok().map(|e| e.detail);
            return Err(ClientError::Status { status, detail });
        }

        Ok(response.json().await?)
    }
}
