//! The two-round generation protocol.
//!
//! Round 1 offers the tool descriptors. If the model answers directly the
//! query ends there. Otherwise every requested call is dispatched, the
//! results are appended, and round 2 asks for a final answer with the
//! descriptors withheld so the model cannot call again.

use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use syllabus_core::error::{ProviderError, ToolError};
use syllabus_core::event::{DomainEvent, EventBus};
use syllabus_core::message::{Message, MessageToolCall};
use syllabus_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use syllabus_core::tool::{RequestContext, ToolCall, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};
use crate::prompt;

/// Where the protocol currently stands.
enum Phase {
    /// Round 1 still to be sent
    AwaitingModel,
    /// The model asked for tools; the assistant message carries the calls
    ToolDispatch(Message),
    /// Round 2 still to be sent
    FinalSynthesis,
}

/// Outcome of one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub answer: String,
    /// Model round trips made (1 or 2)
    pub rounds: u8,
    /// Tool calls dispatched
    pub tool_calls: usize,
    pub tokens_used: u32,
}

pub struct Generator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            event_bus,
            model: model.into(),
            temperature: 0.0,
            max_tokens: 800,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Answer `query`, dispatching tool calls through the registry.
    ///
    /// Sources recorded by the tools are appended to `ctx`.
    pub async fn generate(
        &self,
        query: &str,
        history: Option<&str>,
        session_id: &str,
        ctx: &mut RequestContext,
    ) -> Result<Generation, ProviderError> {
        let mut messages = vec![
            Message::system(prompt::system_prompt(history)),
            Message::user(query),
        ];
        let mut phase = Phase::AwaitingModel;
        let mut rounds = 0u8;
        let mut tool_calls = 0usize;
        let mut tokens_used = 0u32;

        let answer = loop {
            phase = match phase {
                Phase::AwaitingModel => {
                    let response = self.round(&messages, self.tools.definitions()).await?;
                    rounds += 1;
                    tokens_used += tokens(&response);
                    if !response.message.requests_tools() || self.tools.is_empty() {
                        break response.message.content;
                    }
                    Phase::ToolDispatch(response.message)
                }
                Phase::ToolDispatch(assistant) => {
                    let calls = assistant.tool_calls.clone();
                    messages.push(assistant);
                    for tc in &calls {
                        let result = self.dispatch(tc, ctx).await;
                        messages.push(Message::tool_result(&tc.id, result.output));
                    }
                    tool_calls += calls.len();
                    Phase::FinalSynthesis
                }
                Phase::FinalSynthesis => {
                    let response = self.round(&messages, Vec::new()).await?;
                    rounds += 1;
                    tokens_used += tokens(&response);
                    break response.message.content;
                }
            };
        };

        info!(session_id, rounds, tool_calls, tokens_used, "Response generated");
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            session_id: session_id.to_string(),
            model: self.model.clone(),
            rounds,
            tokens_used,
            timestamp: Utc::now(),
        });

        Ok(Generation {
            answer,
            rounds,
            tool_calls,
            tokens_used,
        })
    }

    async fn round(
        &self,
        messages: &[Message],
        tools: Vec<ToolDefinition>,
    ) -> Result<ProviderResponse, ProviderError> {
        debug!(messages = messages.len(), tools = tools.len(), "Sending model round");
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            tools,
        };
        self.provider.complete(request).await
    }

    /// Run one requested call. Never fails: every fault becomes result text.
    async fn dispatch(&self, tc: &MessageToolCall, ctx: &mut RequestContext) -> ToolResult {
        let start = Instant::now();
        let result = match parse_arguments(&tc.arguments) {
            Ok(arguments) => {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };
                self.tools.execute_tool(&call, ctx).await
            }
            Err(e) => {
                warn!(tool = %tc.name, error = %e, "Malformed tool arguments");
                ToolResult::failed(&tc.id, format!("Error: {e}"))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(tool = %tc.name, success = result.success, duration_ms, "Tool call finished");
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: tc.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: Utc::now(),
        });
        result
    }
}

fn parse_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn tokens(response: &ProviderResponse) -> u32 {
    response.usage.as_ref().map_or(0, |u| u.total_tokens)
}
