// Message types
//
// Message is the shared vocabulary every other component reads and writes:
// the durable transcript of a conversation. Assistant messages carry an
// agent-name attribution and a response type copied from the producing
// agent's visibility at emission time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant response (text or tool calls)
    Assistant,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// Whether an assistant message is shown to the end user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Shown to the end user
    External,
    /// Only visible inside the workflow transcript
    Internal,
}

/// Tool call requested by an assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// Arguments as JSON
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a tool call with a fresh UUID v7 id
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,

    /// Message role
    pub role: MessageRole,

    /// Text content (empty for pure tool-call messages)
    pub content: String,

    /// Name of the agent that produced this message (assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    /// Visibility of this message (assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,

    /// Tool calls requested by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID (tool messages, correlates with a preceding assistant tool call)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this result (tool messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Timestamp when the message was created
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::System,
            content: content.into(),
            agent_name: None,
            response_type: None,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::User,
            content: content.into(),
            agent_name: None,
            response_type: None,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant text message attributed to an agent
    pub fn assistant(
        agent_name: impl Into<String>,
        response_type: ResponseType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::Assistant,
            content: content.into(),
            agent_name: Some(agent_name.into()),
            response_type: Some(response_type),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant message carrying tool calls
    pub fn assistant_tool_calls(
        agent_name: impl Into<String>,
        response_type: ResponseType,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::Assistant,
            content: content.into(),
            agent_name: Some(agent_name.into()),
            response_type: Some(response_type),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    /// Create a tool result message correlated with a tool call
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        result: &serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: MessageRole::Tool,
            content: serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string()),
            agent_name: None,
            response_type: None,
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            created_at: Utc::now(),
        }
    }

    /// Check if this message has tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }

    /// Check if this is a plain assistant text message (no tool calls)
    pub fn is_assistant_text(&self) -> bool {
        self.role == MessageRole::Assistant && !self.has_tool_calls()
    }
}
