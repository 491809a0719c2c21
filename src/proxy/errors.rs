use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::gemini_client::UpstreamError;
use crate::types::ChatReply;

pub const MISSING_MESSAGES: &str = "messages array is missing or not an array";

/// Upstream failure signals and the text shown to the user instead, checked in order.
const FRIENDLY_MESSAGES: &[(&str, &str)] = &[
    (
        "ERR_BLOCKED_BY_SAFETY",
        "I cannot provide assistance with that request as it may be harmful or inappropriate. Please try asking something else.",
    ),
    (
        "ERR_SAFETY_CATEGORY",
        "That topic falls outside of what I can safely discuss. Please try a different question.",
    ),
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("GEMINI_API_KEY is not set in the environment variables")]
    MissingCredential,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    /// Text reported to the caller.
    pub fn user_message(&self) -> String {
        friendly_message(&self.to_string())
    }
}

/// Swap a raw failure text for the first matching friendly message.
pub fn friendly_message(raw: &str) -> String {
    FRIENDLY_MESSAGES
        .iter()
        .find(|(signal, _)| raw.contains(signal))
        .map(|(_, friendly)| friendly.to_string())
        .unwrap_or_else(|| raw.to_string())
}

// Every failure category shares one status code.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatReply::error(self.user_message())),
        )
            .into_response()
    }
}
