// Turn Orchestration Core
//
// This crate provides a backend-agnostic, streamable implementation of
// turn orchestration for multi-agent workflows: given a workflow (a
// directed graph of agents, tools, and prompts) and a conversation
// history, it decides which agent runs next, when control transfers
// between agents, and when the turn is finished.
//
// Key design decisions:
// - Uses traits (AgentRuntime, ToolBinding, TurnEmitter) for pluggable backends
// - Agent runtimes push typed events; the orchestrator pulls and folds them
//   into transcript + control-flow state, single-threaded
// - Handoffs are tool calls with a reserved name shape (transfer_to_<agent>);
//   every honored transfer writes a synthetic message pair so the transcript
//   is self-describing
// - Control-type resolution (retain / relinquish_to_parent /
//   relinquish_to_start) is one exhaustive match, reused for start-agent
//   resolution and internal-output resolution
// - Per-handoff instruction patching is recomputed from a pristine baseline,
//   never mutated in place
// - All turn state (call stack, transfer counter, pipeline store, usage) is
//   owned by the run - safe across concurrent conversations
// - Unresolved workflow references are dropped at index build, not rejected

pub mod agent;
pub mod error;
pub mod events;
pub mod handoff;
pub mod message;
pub mod pipeline;
pub mod stream;
pub mod traits;
pub mod transfer;
pub mod turn;
pub mod workflow;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use agent::CompiledAgent;
pub use error::{OrchestratorError, Result};
pub use events::{AgentEvent, AgentEventStream, CompletionUsage, TurnEvent, UsageSummary};
pub use handoff::{
    handoff_target, handoff_tool_name, resolve_control, validate_handoff_context, HandoffContext,
    HANDOFF_PREFIX,
};
pub use message::{Message, MessageRole, ResponseType, ToolCall};
pub use pipeline::{PipelineAdvance, PipelineState, PipelineStateManager};
pub use stream::{turn_stream, ChannelEmitter};
pub use traits::{AgentRuntime, ToolBinding, TurnEmitter};
pub use transfer::TransferCounter;
pub use turn::{OrchestratorConfig, TurnOrchestrator, TurnOutcome, DEFAULT_GREETING};
pub use workflow::{
    AgentConfig, ControlType, PipelineConfig, PromptConfig, PromptType, ToolConfig, ToolKind,
    Visibility, Workflow, WorkflowIndex,
};
