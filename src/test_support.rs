//! Fakes shared by the in-crate tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::gemini_client::{CompletionApi, Content, GenerationConfig, UpstreamError};
use crate::proxy::{self, AppState};

type Outcome = Box<dyn Fn() -> Result<String, UpstreamError> + Send + Sync>;

/// A `CompletionApi` that records each call and answers with a canned outcome.
pub struct FakeUpstream {
    outcome: Outcome,
    calls: Mutex<Vec<(Vec<Content>, String)>>,
}

impl FakeUpstream {
    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Arc::new(Self {
            outcome: Box::new(move || Ok(text.clone())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: impl Fn() -> UpstreamError + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            outcome: Box::new(move || Err(error())),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(Vec<Content>, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionApi for FakeUpstream {
    async fn send_message(
        &self,
        history: &[Content],
        message: &str,
        _config: &GenerationConfig,
    ) -> Result<String, UpstreamError> {
        self.calls
            .lock()
            .unwrap()
            .push((history.to_vec(), message.to_string()));
        (self.outcome)()
    }
}

/// Serve the chat proxy on an ephemeral port and return its base URL.
pub async fn spawn_proxy(upstream: Option<Arc<FakeUpstream>>) -> String {
    let upstream = upstream.map(|fake| fake as Arc<dyn CompletionApi>);
    let app = proxy::router(AppState::new(upstream));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
