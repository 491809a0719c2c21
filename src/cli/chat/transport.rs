use async_trait::async_trait;
use eyre::{Result, eyre};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::types::{ChatMessage, ChatReply, ChatRequest};

/// Why a turn produced no assistant reply. The `Display` text is what the user sees.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to reach the chat server: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}, body: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse server response")]
    Parse,

    #[error("{0}")]
    Server(String),

    #[error("Server response is missing the message field")]
    MissingMessage,
}

/// Delivers the full conversation to the chat proxy and returns the reply text.
#[async_trait]
pub trait ProxyTransport {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ClientError>;
}

pub struct HttpProxyTransport {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpProxyTransport {
    /// `server` is the proxy's base URL, e.g. `http://127.0.0.1:3000`.
    pub fn new(server: &str) -> Result<Self> {
        let endpoint = Url::parse(server)
            .and_then(|base| base.join("/api/chat"))
            .map_err(|e| eyre!("Invalid chat server URL {}: {}", server, e))?;

        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ProxyTransport for HttpProxyTransport {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ClientError> {
        let request = ChatRequest {
            messages: messages.to_vec(),
        };
        debug!("Posting {} messages to {}", messages.len(), self.endpoint);

        let response = self.client.post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        interpret_reply(&body)
    }
}

fn interpret_reply(body: &str) -> Result<String, ClientError> {
    let reply: ChatReply = serde_json::from_str(body).map_err(|_| ClientError::Parse)?;

    if let Some(error) = reply.error.filter(|error| !error.is_empty()) {
        return Err(ClientError::Server(error));
    }

    reply
        .message
        .filter(|message| !message.is_empty())
        .ok_or(ClientError::MissingMessage)
}
