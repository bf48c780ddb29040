//! Shared test helpers for generator and orchestrator tests.

use std::sync::Mutex;
use syllabus_core::error::ProviderError;
use syllabus_core::message::{Message, MessageToolCall, Role};
use syllabus_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// A mock provider that returns scripted responses in order and keeps every
/// request it received.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<std::time::Duration>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// A single direct answer.
    pub fn text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    /// Tool calls in round 1, then a final answer.
    pub fn tool_then_text(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![tool_response(tool_calls), text_response(answer)])
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut requests = self.requests.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted after {} calls", requests.len());
        }
        requests.push(request);
        responses.remove(0)
    }
}

/// A mock provider that picks its script by the text of the user turn, so
/// concurrent queries each get their own tool calls.
///
/// Round 1 answers with the route's tool calls; once the request carries
/// tool results it answers `"Answer for <key>"`.
pub struct RoutedProvider {
    routes: Vec<(String, Vec<MessageToolCall>)>,
    delay: std::time::Duration,
}

impl RoutedProvider {
    pub fn new(routes: Vec<(&str, Vec<MessageToolCall>)>) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|(key, calls)| (key.to_string(), calls))
                .collect(),
            delay: std::time::Duration::from_millis(5),
        }
    }
}

#[async_trait::async_trait]
impl Provider for RoutedProvider {
    fn name(&self) -> &str {
        "routed_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        let user = request
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let Some((key, calls)) = self.routes.iter().find(|(key, _)| user.contains(key.as_str()))
        else {
            panic!("No route for user turn: {user}");
        };

        if request.messages.iter().any(|m| m.role == Role::Tool) {
            Ok(text_response(&format!("Answer for {key}")))
        } else {
            Ok(tool_response(calls.clone()))
        }
    }
}

pub fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(usage()),
        model: "mock-model".into(),
        stop_reason: Some("end_turn".into()),
    }
}

pub fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut msg = Message::assistant("");
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: Some(usage()),
        model: "mock-model".into(),
        stop_reason: Some("tool_use".into()),
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
