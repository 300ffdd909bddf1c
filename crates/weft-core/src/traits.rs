// Core traits for pluggable backends
//
// These traits are the seams between the orchestration core and its
// external collaborators:
// - AgentRuntime runs one agent against the conversation and streams events
// - ToolBinding executes tool calls (mock, webhook, retrieval, third-party)
// - TurnEmitter receives the ordered output of a turn

use async_trait::async_trait;

use crate::agent::CompiledAgent;
use crate::error::Result;
use crate::events::{AgentEventStream, TurnEvent};
use crate::message::{Message, ToolCall};
use crate::workflow::ToolConfig;

// ============================================================================
// AgentRuntime - runs an agent, streams its events
// ============================================================================

/// Trait for agent runtimes
///
/// Given a compiled agent and the conversation so far, produce a stream of
/// text chunks, tool-call requests (handoff-shaped calls included), and a
/// final usage marker. The orchestrator consumes events in arrival order.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Start one model output for the agent
    async fn stream(&self, agent: &CompiledAgent, messages: &[Message])
        -> Result<AgentEventStream>;
}

// ============================================================================
// ToolBinding - executes tool calls
// ============================================================================

/// Trait for executing tool calls
///
/// Implementations dispatch on the tool kind:
/// - Mock tools return canned or simulated responses
/// - Webhook tools call out to operator endpoints
/// - Retrieval tools answer from attached knowledge sources
///
/// The orchestrator wraps every invocation: a returned error becomes an
/// `{"error": "..."}` payload surfaced to the agent, never a turn abort.
#[async_trait]
pub trait ToolBinding: Send + Sync {
    /// Execute a single tool call
    async fn execute(&self, call: &ToolCall, config: &ToolConfig) -> Result<serde_json::Value>;
}

// ============================================================================
// TurnEmitter - receives the turn's output sequence
// ============================================================================

/// Trait for consuming a turn's output as it is produced
///
/// Implementations can:
/// - Send events to a channel for streaming to a client
/// - Collect events in memory for testing
/// - Do nothing (no-op implementation)
#[async_trait]
pub trait TurnEmitter: Send + Sync {
    /// Emit a single event
    async fn emit(&self, event: TurnEvent) -> Result<()>;

    /// Emit multiple events
    async fn emit_batch(&self, events: Vec<TurnEvent>) -> Result<()> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}
