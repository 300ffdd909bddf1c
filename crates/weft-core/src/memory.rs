// In-memory implementations for examples and testing
//
// These implementations keep everything in memory, making them perfect for:
// - Standalone examples that don't need live backends
// - Unit and integration tests
// - Workflow authors simulating tool responses

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::json;
use tokio::sync::RwLock;

use crate::agent::CompiledAgent;
use crate::error::{OrchestratorError, Result};
use crate::events::{AgentEvent, AgentEventStream, CompletionUsage, TurnEvent, UsageSummary};
use crate::message::{Message, ToolCall};
use crate::traits::{AgentRuntime, ToolBinding, TurnEmitter};
use crate::workflow::{ToolConfig, ToolKind};

// ============================================================================
// Emitters
// ============================================================================

/// Emitter that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEmitter;

#[async_trait]
impl TurnEmitter for NoopEmitter {
    async fn emit(&self, _event: TurnEvent) -> Result<()> {
        Ok(())
    }
}

/// Emitter that collects events in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryEmitter {
    events: Arc<RwLock<Vec<TurnEvent>>>,
}

impl InMemoryEmitter {
    /// Create a new in-memory emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events, in emission order
    pub async fn events(&self) -> Vec<TurnEvent> {
        self.events.read().await.clone()
    }

    /// Only the collected messages
    pub async fn messages(&self) -> Vec<Message> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|e| match e {
                TurnEvent::Message(m) => Some(m.clone()),
                TurnEvent::Usage(_) => None,
            })
            .collect()
    }

    /// The final usage summary, if one was emitted
    pub async fn usage(&self) -> Option<UsageSummary> {
        self.events.read().await.iter().rev().find_map(|e| match e {
            TurnEvent::Usage(u) => Some(u.clone()),
            TurnEvent::Message(_) => None,
        })
    }

    /// Clear collected events
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl TurnEmitter for InMemoryEmitter {
    async fn emit(&self, event: TurnEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

// ============================================================================
// MockAgentRuntime - scripted model outputs
// ============================================================================

/// One scripted model output
#[derive(Debug, Clone)]
pub struct MockOutput {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: CompletionUsage,
    pub error: Option<String>,
}

impl MockOutput {
    /// A text-only output
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            usage: CompletionUsage::default(),
            error: None,
        }
    }

    /// An output carrying tool calls
    pub fn with_tools(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            usage: CompletionUsage::default(),
            error: None,
        }
    }

    /// An output whose stream errors instead of completing
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            tool_calls: Vec::new(),
            usage: CompletionUsage::default(),
            error: Some(message.into()),
        }
    }

    /// A handoff output (single transfer call to the target)
    pub fn handoff(target: &str) -> Self {
        Self::with_tools(
            "",
            vec![ToolCall::new(
                crate::handoff::handoff_tool_name(target),
                json!({}),
            )],
        )
    }

    /// Attach token usage to this output
    pub fn with_usage(mut self, total: u32, prompt: u32, completion: u32) -> Self {
        self.usage = CompletionUsage {
            total_tokens: Some(total),
            prompt_tokens: Some(prompt),
            completion_tokens: Some(completion),
        };
        self
    }
}

/// A logged runtime invocation
#[derive(Debug, Clone)]
pub struct RuntimeCall {
    /// Agent that was run
    pub agent: String,
    /// Number of messages it saw
    pub message_count: usize,
}

/// Mock agent runtime for testing
///
/// Returns scripted outputs in sequence, regardless of which agent runs.
#[derive(Debug, Default)]
pub struct MockAgentRuntime {
    outputs: Arc<RwLock<Vec<MockOutput>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<RuntimeCall>>>,
}

impl MockAgentRuntime {
    /// Create a new mock runtime
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock runtime preloaded with outputs
    pub fn scripted(outputs: Vec<MockOutput>) -> Self {
        Self {
            outputs: Arc::new(RwLock::new(outputs)),
            call_index: Arc::new(RwLock::new(0)),
            call_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue another output
    pub async fn add_output(&self, output: MockOutput) {
        self.outputs.write().await.push(output);
    }

    /// The invocation log
    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.call_log.read().await.clone()
    }

    /// Reset outputs and logs
    pub async fn reset(&self) {
        self.outputs.write().await.clear();
        *self.call_index.write().await = 0;
        self.call_log.write().await.clear();
    }
}

#[async_trait]
impl AgentRuntime for MockAgentRuntime {
    async fn stream(
        &self,
        agent: &CompiledAgent,
        messages: &[Message],
    ) -> Result<AgentEventStream> {
        self.call_log.write().await.push(RuntimeCall {
            agent: agent.name.clone(),
            message_count: messages.len(),
        });

        let mut index = self.call_index.write().await;
        let outputs = self.outputs.read().await;
        let output = outputs
            .get(*index)
            .cloned()
            .unwrap_or_else(|| MockOutput::text("Mock output (no more outputs scripted)"));
        *index += 1;
        drop(index);
        drop(outputs);

        let mut events = Vec::new();
        if let Some(error) = output.error {
            events.push(Ok(AgentEvent::Error(error)));
        } else {
            events.push(Ok(AgentEvent::TextDelta(output.text)));
            if !output.tool_calls.is_empty() {
                events.push(Ok(AgentEvent::ToolCalls(output.tool_calls)));
            }
            events.push(Ok(AgentEvent::Done(output.usage)));
        }

        Ok(Box::pin(stream::iter(events)))
    }
}

/// Agent runtime whose stream always errors
///
/// Useful for testing pipeline unwinding and fatal paths.
#[derive(Debug, Clone)]
pub struct FailingAgentRuntime {
    error_message: String,
}

impl FailingAgentRuntime {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
        }
    }
}

impl Default for FailingAgentRuntime {
    fn default() -> Self {
        Self::new("Agent run failed")
    }
}

#[async_trait]
impl AgentRuntime for FailingAgentRuntime {
    async fn stream(
        &self,
        _agent: &CompiledAgent,
        _messages: &[Message],
    ) -> Result<AgentEventStream> {
        Err(OrchestratorError::runtime(self.error_message.clone()))
    }
}

// ============================================================================
// Tool bindings
// ============================================================================

/// Mock tool binding for testing and workflow authoring
///
/// Resolution order: explicitly set results by tool name, then the tool
/// config's canned `mock_response` (mock tools), then a generic ok payload.
#[derive(Debug, Default)]
pub struct MockToolBinding {
    results: Arc<RwLock<std::collections::HashMap<String, serde_json::Value>>>,
    call_log: Arc<RwLock<Vec<ToolCall>>>,
}

impl MockToolBinding {
    /// Create a new mock tool binding
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the result for a specific tool
    pub async fn set_result(&self, tool_name: impl Into<String>, result: serde_json::Value) {
        self.results.write().await.insert(tool_name.into(), result);
    }

    /// The call log
    pub async fn calls(&self) -> Vec<ToolCall> {
        self.call_log.read().await.clone()
    }

    /// Clear the call log
    pub async fn clear_calls(&self) {
        self.call_log.write().await.clear();
    }
}

#[async_trait]
impl ToolBinding for MockToolBinding {
    async fn execute(&self, call: &ToolCall, config: &ToolConfig) -> Result<serde_json::Value> {
        self.call_log.write().await.push(call.clone());

        if let Some(result) = self.results.read().await.get(&call.name) {
            return Ok(result.clone());
        }
        if config.kind == ToolKind::Mock {
            if let Some(response) = &config.mock_response {
                return Ok(response.clone());
            }
        }
        Ok(json!({"status": "ok"}))
    }
}

/// Tool binding that always fails
///
/// Useful for testing the orchestrator's error wrapping.
#[derive(Debug, Clone)]
pub struct FailingToolBinding {
    error_message: String,
}

impl FailingToolBinding {
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
        }
    }
}

impl Default for FailingToolBinding {
    fn default() -> Self {
        Self::new("Tool execution failed")
    }
}

#[async_trait]
impl ToolBinding for FailingToolBinding {
    async fn execute(&self, _call: &ToolCall, _config: &ToolConfig) -> Result<serde_json::Value> {
        Err(OrchestratorError::tool(self.error_message.clone()))
    }
}
