//! Prompt relay: the HTTP endpoint that forwards prompts to the model.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{ChatBackend, GeminiClient};
use crate::prompts::{EMPTY_REPLY, RESET_ACK};
use crate::session::{DEFAULT_SESSION, MAX_SESSION_KEY_LEN, SessionSettings, SessionStore};

/// Route served by the relay.
pub const RELAY_PATH: &str = "/api/gemini";

/// Optional header naming the caller's session.
pub const SESSION_HEADER: &str = "x-vision-session";

/// Successful reply to a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReply {
    pub text: String,
}

/// Successful reply to a reset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetAck {
    pub message: String,
}

/// Body of every non-2xx relay response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

/// Errors the relay reports to its callers
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing, non-string or blank prompt, or a body that is not JSON.
    #[error("The 'prompt' field in the request body is required and cannot be empty.")]
    InvalidRequest,
    #[error("The session key must be at most {} characters.", MAX_SESSION_KEY_LEN)]
    SessionKeyTooLong,
    /// The model API call failed; carries the underlying message.
    #[error("{0}")]
    RemoteFailure(String),
}

impl RelayError {
    fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest | RelayError::SessionKeyTooLong => StatusCode::BAD_REQUEST,
            RelayError::RemoteFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RelayError::InvalidRequest | RelayError::SessionKeyTooLong => "Invalid Request",
            RelayError::RemoteFailure(_) => "Gemini API error",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.label().to_string(),
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// A validated relay request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayRequest {
    Reset,
    SendPrompt(String),
}

impl RelayRequest {
    /// Validate a decoded body. A reset action wins over any prompt in the same body.
    pub fn parse(body: &Value) -> Result<Self, RelayError> {
        if body.get("action").and_then(Value::as_str) == Some("reset") {
            return Ok(RelayRequest::Reset);
        }

        match body.get("prompt").and_then(Value::as_str) {
            Some(prompt) if !prompt.trim().is_empty() => Ok(RelayRequest::SendPrompt(prompt.to_string())),
            _ => Err(RelayError::InvalidRequest),
        }
    }
}

/// Shared state behind the relay route
#[derive(Clone)]
pub struct RelayState {
    backend: Arc<dyn ChatBackend>,
    sessions: Arc<SessionStore>,
}

impl RelayState {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: SessionSettings) -> Self {
        Self::with_sessions(backend, SessionStore::new(settings))
    }

    pub fn with_sessions(backend: Arc<dyn ChatBackend>, sessions: SessionStore) -> Self {
        Self {
            backend,
            sessions: Arc::new(sessions),
        }
    }
}

/// Session key from the header, then the body, then the shared default.
fn session_key(headers: &HeaderMap, body: &Value) -> Result<String, RelayError> {
    let key = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| body.get("session").and_then(Value::as_str))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .unwrap_or(DEFAULT_SESSION);

    if key.chars().count() > MAX_SESSION_KEY_LEN {
        return Err(RelayError::SessionKeyTooLong);
    }
    Ok(key.to_string())
}

async fn handle_relay(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    let body: Value = serde_json::from_slice(&body).map_err(|err| {
        tracing::debug!(error = %err, "relay body is not JSON");
        RelayError::InvalidRequest
    })?;
    let key = session_key(&headers, &body)?;

    match RelayRequest::parse(&body)? {
        RelayRequest::Reset => {
            if !state.sessions.reset(&key) {
                tracing::debug!(session = %key, "nothing to reset");
            }
            Ok(Json(ResetAck {
                message: RESET_ACK.to_string(),
            })
            .into_response())
        }
        RelayRequest::SendPrompt(prompt) => {
            let handle = state.sessions.handle(&key);
            let mut session = handle.lock().await;
            tracing::debug!(
                session = %key,
                handle = %session.id(),
                turns = session.turns().len(),
                live_sessions = state.sessions.len(),
                "forwarding prompt"
            );

            let reply = session
                .send_message(state.backend.as_ref(), &prompt)
                .await
                .map_err(|err| {
                    tracing::error!(session = %key, "Gemini error: {:#}", err);
                    RelayError::RemoteFailure(format!("{:#}", err))
                })?;

            let text = if reply.is_empty() {
                EMPTY_REPLY.to_string()
            } else {
                reply
            };
            Ok(Json(TextReply { text }).into_response())
        }
    }
}

/// Build the relay router around `state`.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route(RELAY_PATH, post(handle_relay))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay until Ctrl+C.
pub async fn serve(config: &Config) -> Result<()> {
    if !config.has_api_key() {
        tracing::warn!("no GEMINI_API_KEY configured; prompts will fail until one is set");
    }

    let backend: Arc<dyn ChatBackend> = Arc::new(GeminiClient::new(&config.relay)?);
    let sessions = SessionStore::with_limit(SessionSettings::from(&config.relay), config.relay.max_sessions);
    let state = RelayState::with_sessions(backend, sessions);

    let listener = TcpListener::bind(&config.relay.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.relay.bind))?;
    let addr = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!(model = %config.relay.model, "relay listening on http://{}{}", addr, RELAY_PATH);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down relay");
        })
        .await
        .context("Relay server failed")
}
