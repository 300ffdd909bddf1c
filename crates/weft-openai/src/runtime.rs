// OpenAI agent runtime
//
// Implements AgentRuntime over the OpenAI chat-completions protocol with
// SSE streaming. Works against any OpenAI-compatible endpoint.
//
// The compiled agent's instructions become the system message; its bound
// tools and handoff targets become function tools. Chunked tool-call deltas
// are assembled by index; usage is taken from the final usage chunk
// (stream_options.include_usage) and reported in the Done event.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde_json::json;

use weft_core::agent::CompiledAgent;
use weft_core::error::{OrchestratorError, Result};
use weft_core::events::{AgentEvent, AgentEventStream, CompletionUsage};
use weft_core::message::{Message, ToolCall};
use weft_core::traits::AgentRuntime;

use crate::types::{
    build_tools, from_wire_tool_call, to_wire_message, ChatRequest, StreamChunk, StreamOptions,
    WireMessage,
};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Call parameters applied to every model invocation
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Model used when an agent does not name one
    pub default_model: String,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate per output
    pub max_tokens: Option<u32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// OpenAI-protocol agent runtime
///
/// # Example
///
/// ```ignore
/// use weft_openai::OpenAiAgentRuntime;
///
/// let runtime = OpenAiAgentRuntime::from_env()?;
/// // or
/// let runtime = OpenAiAgentRuntime::new("your-api-key");
/// // or with a custom endpoint
/// let runtime = OpenAiAgentRuntime::with_base_url("key", "https://api.example.com/v1/chat/completions");
/// ```
#[derive(Clone)]
pub struct OpenAiAgentRuntime {
    client: Client,
    api_key: String,
    api_url: String,
    config: RuntimeConfig,
}

impl OpenAiAgentRuntime {
    /// Create a new runtime with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            config: RuntimeConfig::default(),
        }
    }

    /// Create a new runtime from the environment
    ///
    /// Reads OPENAI_API_KEY and, when set, OPENAI_BASE_URL.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            OrchestratorError::runtime("OPENAI_API_KEY environment variable not set")
        })?;
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) => Self::with_base_url(api_key, url),
            Err(_) => Self::new(api_key),
        })
    }

    /// Create a new runtime with a custom API URL (OpenAI-compatible APIs)
    pub fn with_base_url(api_key: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_url: api_url.into(),
            config: RuntimeConfig::default(),
        }
    }

    /// Set the call parameters
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the API URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn build_request(&self, agent: &CompiledAgent, messages: &[Message]) -> ChatRequest {
        let mut wire_messages = vec![WireMessage {
            role: "system".to_string(),
            content: Some(agent.instructions.clone()),
            tool_calls: None,
            tool_call_id: None,
        }];
        wire_messages.extend(messages.iter().map(to_wire_message));

        let tools = build_tools(agent);
        let model = if agent.model.is_empty() {
            self.config.default_model.clone()
        } else {
            agent.model.clone()
        };

        ChatRequest {
            model,
            messages: wire_messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: true,
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }
}

#[async_trait]
impl AgentRuntime for OpenAiAgentRuntime {
    async fn stream(
        &self,
        agent: &CompiledAgent,
        messages: &[Message],
    ) -> Result<AgentEventStream> {
        let request = self.build_request(agent, messages);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestratorError::runtime(format!("Failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::runtime(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let event_stream = response.bytes_stream().eventsource();

        let usage = Arc::new(Mutex::new(CompletionUsage::default()));
        let accumulated_tool_calls = Arc::new(Mutex::new(Vec::<ToolCall>::new()));

        let converted: AgentEventStream = Box::pin(event_stream.then(move |result| {
            let usage = Arc::clone(&usage);
            let accumulated_tool_calls = Arc::clone(&accumulated_tool_calls);

            async move {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => return Ok(AgentEvent::Error(format!("Stream error: {e}"))),
                };

                if event.data == "[DONE]" {
                    let usage = usage.lock().unwrap().clone();
                    return Ok(AgentEvent::Done(usage));
                }

                let chunk: StreamChunk = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => return Ok(AgentEvent::Error(format!("Failed to parse chunk: {e}"))),
                };

                if let Some(wire_usage) = &chunk.usage {
                    *usage.lock().unwrap() = CompletionUsage {
                        total_tokens: Some(wire_usage.total_tokens),
                        prompt_tokens: Some(wire_usage.prompt_tokens),
                        completion_tokens: Some(wire_usage.completion_tokens),
                    };
                }

                let Some(choice) = chunk.choices.first() else {
                    return Ok(AgentEvent::TextDelta(String::new()));
                };

                // Assemble chunked tool-call deltas by index
                if let Some(tool_calls) = &choice.delta.tool_calls {
                    let mut acc = accumulated_tool_calls.lock().unwrap();
                    for tc in tool_calls {
                        let idx = tc.index as usize;
                        while acc.len() <= idx {
                            acc.push(ToolCall {
                                id: String::new(),
                                name: String::new(),
                                arguments: json!(""),
                            });
                        }

                        if let Some(id) = &tc.id {
                            acc[idx].id = id.clone();
                        }
                        if let Some(function) = &tc.function {
                            if let Some(name) = &function.name {
                                acc[idx].name = name.clone();
                            }
                            if let Some(args) = &function.arguments {
                                let current = acc[idx].arguments.as_str().unwrap_or("");
                                acc[idx].arguments = json!(format!("{current}{args}"));
                            }
                        }
                    }
                    return Ok(AgentEvent::TextDelta(String::new()));
                }

                if let Some(content) = &choice.delta.content {
                    return Ok(AgentEvent::TextDelta(content.clone()));
                }

                if choice.finish_reason.as_deref() == Some("tool_calls") {
                    let calls = accumulated_tool_calls.lock().unwrap().clone();
                    if !calls.is_empty() {
                        let parsed = calls.into_iter().map(from_wire_tool_call).collect();
                        return Ok(AgentEvent::ToolCalls(parsed));
                    }
                }

                // Other finish reasons: wait for the usage chunk and [DONE]
                Ok(AgentEvent::TextDelta(String::new()))
            }
        }));

        Ok(converted)
    }
}

impl std::fmt::Debug for OpenAiAgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAgentRuntime")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::workflow::{AgentConfig, Workflow, WorkflowIndex};

    fn compiled() -> CompiledAgent {
        let workflow = Workflow::new("Front")
            .with_agent(
                AgentConfig::new("Front", "Route requests.").with_connected_agents(["Billing"]),
            )
            .with_agent(AgentConfig::new("Billing", "Handle billing."));
        let index = WorkflowIndex::build(&workflow);
        CompiledAgent::compile(index.agent("Front").unwrap(), &index)
    }

    #[test]
    fn test_runtime_debug_redacts_key() {
        let runtime = OpenAiAgentRuntime::new("secret-key");
        let rendered = format!("{runtime:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn test_request_has_system_and_handoff_tool() {
        let runtime = OpenAiAgentRuntime::with_base_url("key", "http://localhost/v1/chat");
        let history = vec![Message::user("hello")];
        let request = runtime.build_request(&compiled(), &history);

        assert_eq!(request.messages[0].role, "system");
        assert_eq!(
            request.messages[0].content.as_deref(),
            Some("Route requests.")
        );
        let tools = request.tools.unwrap();
        assert!(tools
            .iter()
            .any(|t| t.function.name == "transfer_to_Billing"));
    }

    #[test]
    fn test_request_falls_back_to_default_model() {
        let runtime = OpenAiAgentRuntime::new("key");
        let request = runtime.build_request(&compiled(), &[]);
        assert_eq!(request.model, DEFAULT_MODEL);
    }
}
