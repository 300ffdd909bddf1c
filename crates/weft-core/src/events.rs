// Event vocabulary for streaming
//
// AgentEvent is what an agent runtime pushes while it runs; the turn
// orchestrator pulls these and folds them into transcript and control-flow
// state. TurnEvent is what the orchestrator emits downstream: the durable
// message sequence plus one final usage summary.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, ToolCall};

/// Type alias for the agent runtime's event stream
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// Events pushed by a running agent
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Incremental text content
    TextDelta(String),
    /// Tool calls requested by the model (handoff-shaped calls included)
    ToolCalls(Vec<ToolCall>),
    /// The model output completed
    Done(CompletionUsage),
    /// Error while streaming
    Error(String),
}

/// Token usage reported for one model output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionUsage {
    /// Total tokens used (if available)
    pub total_tokens: Option<u32>,
    /// Input tokens used (if available)
    pub prompt_tokens: Option<u32>,
    /// Output tokens generated (if available)
    pub completion_tokens: Option<u32>,
}

/// Token totals accumulated across every agent run in a turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl UsageSummary {
    /// An all-zero summary
    pub fn zero() -> Self {
        Self::default()
    }

    /// Fold one model output's usage into the running totals
    pub fn absorb(&mut self, usage: &CompletionUsage) {
        self.total_tokens += usage.total_tokens.unwrap_or(0);
        self.prompt_tokens += usage.prompt_tokens.unwrap_or(0);
        self.completion_tokens += usage.completion_tokens.unwrap_or(0);
    }
}

/// Items produced by a turn, in causal order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A message appended to the turn transcript
    Message(Message),
    /// Final usage summary (at most one, always last)
    Usage(UsageSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_absorb() {
        let mut summary = UsageSummary::zero();
        summary.absorb(&CompletionUsage {
            total_tokens: Some(30),
            prompt_tokens: Some(20),
            completion_tokens: Some(10),
        });
        summary.absorb(&CompletionUsage {
            total_tokens: Some(5),
            prompt_tokens: None,
            completion_tokens: Some(5),
        });
        assert_eq!(summary.total_tokens, 35);
        assert_eq!(summary.prompt_tokens, 20);
        assert_eq!(summary.completion_tokens, 15);
    }
}
