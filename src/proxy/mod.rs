//! The chat proxy: a single `POST /api/chat` endpoint in front of the Gemini API.
//!
//! Each request carries the whole conversation. The proxy keeps no state
//! between requests; the upstream handle is built once at startup and shared.

pub mod errors;
pub mod prompt;

use std::sync::Arc;

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use clap::Args;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::gemini_client::{CompletionApi, DEFAULT_BASE_URL, GeminiClient};
use crate::types::{ChatMessage, ChatReply};
use errors::{MISSING_MESSAGES, ProxyError};
use prompt::{DEFAULT_MODEL, GENERATION_CONFIG, build_turn};

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "CHAT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "CHAT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Gemini model to forward conversations to
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the Gemini API
    #[arg(long, env = "GEMINI_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,
}

#[derive(Clone)]
pub struct AppState {
    upstream: Option<Arc<dyn CompletionApi>>,
}

impl AppState {
    /// `None` means no credential was configured; every request then fails.
    pub fn new(upstream: Option<Arc<dyn CompletionApi>>) -> Self {
        Self { upstream }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handle_chat))
        .with_state(state)
}

pub async fn serve(args: &ServeArgs) -> eyre::Result<()> {
    let upstream = match GeminiClient::from_env(args.model.clone()) {
        Ok(client) => {
            let client = client.with_base_url(&args.api_base_url);
            info!("Forwarding chats to Gemini model {}", client.model());
            let client: Arc<dyn CompletionApi> = Arc::new(client);
            Some(client)
        }
        Err(e) => {
            error!("{}; chat requests will fail until it is set", e);
            None
        }
    };

    let app = router(AppState::new(upstream));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Chat proxy listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Chat proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatReply>, ProxyError> {
    info!("Received request in /api/chat");

    match respond(state.upstream.as_deref(), &body).await {
        Ok(text) => Ok(Json(ChatReply::message(text))),
        Err(e) => {
            error!("Error in chat route: {}", e);
            Err(e)
        }
    }
}

/// Run one request through validation and the upstream call.
///
/// Takes the raw body so that unparseable JSON is reported like any other
/// invalid request.
pub async fn respond(
    upstream: Option<&dyn CompletionApi>,
    body: &[u8],
) -> Result<String, ProxyError> {
    let body: Value = serde_json::from_slice(body)
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    debug!("Request body: {}", body);

    let messages = body
        .get("messages")
        .filter(|messages| messages.is_array())
        .ok_or_else(|| ProxyError::InvalidRequest(MISSING_MESSAGES.to_string()))?;
    let messages: Vec<ChatMessage> = serde_json::from_value(messages.clone())
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    info!("Number of messages: {}", messages.len());

    let upstream = upstream.ok_or(ProxyError::MissingCredential)?;

    let turn = build_turn(&messages)
        .ok_or_else(|| ProxyError::InvalidRequest("messages array is empty".to_string()))?;
    debug!("Last message: {}", turn.message);

    info!("Sending message to Gemini API");
    let text = upstream
        .send_message(&turn.history, &turn.message, &GENERATION_CONFIG)
        .await?;
    info!("Received response from Gemini API");
    debug!("Generated text: {}", text);

    Ok(text)
}
