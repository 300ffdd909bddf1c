// OpenAI Agent Runtime
//
// This crate provides an OpenAI-compatible agent runtime implementation.
// It implements the AgentRuntime trait from weft-core, enabling the turn
// orchestrator to run agents against OpenAI's chat-completions API (or any
// endpoint speaking the same protocol).

mod runtime;
mod types;

pub use runtime::{OpenAiAgentRuntime, RuntimeConfig};
pub use types::{
    build_tools, handoff_parameters_schema, to_wire_message, ChatRequest, StreamChunk, WireMessage,
    WireTool,
};

// Re-export the core trait for convenience
pub use weft_core::traits::AgentRuntime;
