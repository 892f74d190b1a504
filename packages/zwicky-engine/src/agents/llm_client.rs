use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, ZwickyError};
use crate::prompts::{self, ChatRequest};

/// Abstract interface for the hosted language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one chat request and returns the completion text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Talks to the proxy gateway, which holds the real credential.
#[derive(Clone)]
pub struct GatewayClient {
    pub endpoint: String,
    client: Client,
}

impl GatewayClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl LlmClient for GatewayClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            max_tokens = request.max_tokens,
            prompt_length = request.prompt().len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ZwickyError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ZwickyError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "gateway returned an error");
            return Err(ZwickyError::Http {
                status: status.as_u16(),
                details: error_details(&body),
            });
        }

        let json: Value = serde_json::from_str(&body)?;
        prompts::response_text(&json)
    }
}

/// Best description of a failed response: the `details` or `error` field of
/// the gateway envelope, else the raw body.
fn error_details(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let from_envelope = serde_json::from_str::<Value>(trimmed).ok().and_then(|v| {
        ["details", "error"]
            .iter()
            .find_map(|key| match v.get(*key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Object(o)) => o
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
    });
    Some(from_envelope.unwrap_or_else(|| trimmed.to_string()))
}

// Exposed for e2e and integration testing
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    type MockResponseAction = Box<dyn Fn(&ChatRequest) -> Result<String> + Send + Sync>;

    /// Replays queued responses in order; records every request it sees.
    #[derive(Clone, Default)]
    pub struct MockLlmClient {
        pub responses: Arc<Mutex<VecDeque<MockResponseAction>>>,
        pub requests: Arc<Mutex<Vec<ChatRequest>>>,
        pub holds: Arc<Mutex<Vec<(u32, Arc<Notify>)>>>,
    }

    impl MockLlmClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_response(&self, response: impl Into<String>) {
            let response = response.into();
            let mut guard = self.responses.lock().unwrap();
            guard.push_back(Box::new(move |_| Ok(response.clone())));
        }

        pub fn add_action<F>(&self, action: F)
        where
            F: Fn(&ChatRequest) -> Result<String> + Send + Sync + 'static,
        {
            let mut guard = self.responses.lock().unwrap();
            guard.push_back(Box::new(action));
        }

        pub fn add_http_error(&self, status: u16) {
            self.add_action(move |_| {
                Err(ZwickyError::Http {
                    status,
                    details: None,
                })
            });
        }

        /// Requests with this token budget take their response, then wait for
        /// `gate` before returning it.
        pub fn hold_budget(&self, max_tokens: u32, gate: Arc<Notify>) {
            self.holds.lock().unwrap().push((max_tokens, gate));
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            let action_opt = {
                let mut guard = self.responses.lock().unwrap();
                guard.pop_front()
            };

            let result = if let Some(action) = action_opt {
                action(request)
            } else {
                Ok("MOCK_RESPONSE".to_string())
            };

            let hold = self
                .holds
                .lock()
                .unwrap()
                .iter()
                .find(|(budget, _)| *budget == request.max_tokens)
                .map(|(_, gate)| Arc::clone(gate));
            if let Some(gate) = hold {
                gate.notified().await;
            }
            result
        }
    }
}
