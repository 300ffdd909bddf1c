// OpenAI protocol types
//
// Wire types for the chat-completions API plus the conversions from the
// core's message and tool vocabulary. Handoff targets become function tools
// named transfer_to_<agent> so handoff requests come back as ordinary tool
// calls the orchestrator recognizes by shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use weft_core::agent::CompiledAgent;
use weft_core::handoff::handoff_tool_name;
use weft_core::message::{Message, MessageRole, ToolCall};

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTool {
    pub r#type: String,
    pub function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    pub r#type: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    /// JSON-encoded arguments, per the wire protocol
    pub arguments: String,
}

// Streaming types

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub function: Option<StreamFunction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamFunction {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

// ============================================================================
// Conversions
// ============================================================================

/// Convert a conversation message to the wire format
pub fn to_wire_message(message: &Message) -> WireMessage {
    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    };

    WireMessage {
        role: role.to_string(),
        content: Some(message.content.clone()),
        tool_calls: message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    r#type: "function".to_string(),
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                    },
                })
                .collect()
        }),
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Parse an accumulated wire tool call back into the core type
pub fn from_wire_tool_call(mut call: ToolCall) -> ToolCall {
    if let Some(args) = call.arguments.as_str() {
        call.arguments = serde_json::from_str(args).unwrap_or_else(|_| json!({}));
    }
    call
}

/// JSON schema for the handoff context payload
pub fn handoff_parameters_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reason": {
                "type": "string",
                "description": "Why the conversation is being transferred"
            },
            "data": {
                "type": "object",
                "description": "Data to forward to the receiving agent"
            }
        }
    })
}

/// Build the function tool list for an agent: its bound tools plus one
/// transfer function per allowed handoff target
pub fn build_tools(agent: &CompiledAgent) -> Vec<WireTool> {
    let mut tools: Vec<WireTool> = agent
        .tools
        .iter()
        .map(|tool| WireTool {
            r#type: "function".to_string(),
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect();

    for target in &agent.handoff_targets {
        tools.push(WireTool {
            r#type: "function".to_string(),
            function: WireFunction {
                name: handoff_tool_name(target),
                description: format!("Transfer the conversation to the {target} agent."),
                parameters: handoff_parameters_schema(),
            },
        });
    }

    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::message::ResponseType;
    use weft_core::workflow::{AgentConfig, ToolConfig, Workflow, WorkflowIndex};

    #[test]
    fn test_message_conversion_roles() {
        let msg = Message::system("rules");
        assert_eq!(to_wire_message(&msg).role, "system");

        let msg = Message::assistant("Support", ResponseType::External, "hello");
        let wire = to_wire_message(&msg);
        assert_eq!(wire.role, "assistant");
        assert_eq!(wire.content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_tool_call_arguments_are_json_encoded() {
        let call = ToolCall::new("lookup", json!({"id": 7}));
        let msg = Message::assistant_tool_calls("A", ResponseType::Internal, "", vec![call]);
        let wire = to_wire_message(&msg);
        let calls = wire.tool_calls.unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"id":7}"#);
    }

    #[test]
    fn test_tool_result_carries_call_id() {
        let msg = Message::tool_result("call_9", "lookup", &json!({"ok": true}));
        let wire = to_wire_message(&msg);
        assert_eq!(wire.role, "tool");
        assert_eq!(wire.tool_call_id.as_deref(), Some("call_9"));
    }

    #[test]
    fn test_build_tools_includes_handoffs() {
        let workflow = Workflow::new("Front")
            .with_agent(
                AgentConfig::new("Front", "Route.")
                    .with_tools(["lookup"])
                    .with_connected_agents(["Billing"]),
            )
            .with_agent(AgentConfig::new("Billing", "Bill."))
            .with_tool(ToolConfig::mock("lookup", "Look things up"));
        let index = WorkflowIndex::build(&workflow);
        let agent = CompiledAgent::compile(index.agent("Front").unwrap(), &index);

        let tools = build_tools(&agent);
        let names: Vec<&str> = tools.iter().map(|t| t.function.name.as_str()).collect();
        assert_eq!(names, vec!["lookup", "transfer_to_Billing"]);
    }

    #[test]
    fn test_from_wire_tool_call_decodes_arguments() {
        let call = ToolCall {
            id: "c1".to_string(),
            name: "lookup".to_string(),
            arguments: json!(r#"{"id": 7}"#),
        };
        let parsed = from_wire_tool_call(call);
        assert_eq!(parsed.arguments, json!({"id": 7}));
    }
}
