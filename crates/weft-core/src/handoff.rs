// Handoff protocol
//
// A handoff is a tool call with a reserved name shape: `transfer_to_<agent>`.
// The arguments are a free-form JSON context validated against
// HandoffContext; malformed payloads are replaced with defaults rather than
// failing the turn. Every honored transfer writes a synthetic assistant
// tool-call + tool-result pair into the transcript so it is self-describing.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::message::{Message, ResponseType, ToolCall};
use crate::workflow::ControlType;

/// Name prefix that marks a tool call as a handoff request
pub const HANDOFF_PREFIX: &str = "transfer_to_";

/// Build the handoff tool name for a target agent
pub fn handoff_tool_name(target: &str) -> String {
    format!("{HANDOFF_PREFIX}{target}")
}

/// Extract the handoff target from a tool call, if it is handoff-shaped
pub fn handoff_target(call: &ToolCall) -> Option<&str> {
    call.name.strip_prefix(HANDOFF_PREFIX)
}

/// Context attached to a handoff request
///
/// Agents may pass anything; the shape below is what downstream agents can
/// rely on. Validation failure is recovered locally: the payload is replaced
/// with defaults and the turn continues.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffContext {
    /// Why control is being transferred
    #[serde(default)]
    pub reason: Option<String>,

    /// Free-form data forwarded to the target agent
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Validate a handoff context payload, substituting defaults on failure
pub fn validate_handoff_context(agent: &str, value: serde_json::Value) -> HandoffContext {
    match serde_json::from_value::<HandoffContext>(value) {
        Ok(context) => context,
        Err(err) => {
            warn!(agent = %agent, error = %err, "malformed handoff context, substituting defaults");
            HandoffContext::default()
        }
    }
}

/// Build the synthetic transfer message pair recording a handoff from
/// `from` to `to`: an assistant tool-call message followed by its result.
///
/// `extra` is merged into the result payload (pipeline completions attach
/// their aggregated results here).
pub fn transfer_messages(
    from: &str,
    from_visibility: ResponseType,
    to: &str,
    context: &HandoffContext,
    extra: Option<serde_json::Value>,
) -> (Message, Message) {
    let arguments = serde_json::to_value(context).unwrap_or_else(|_| json!({}));
    let call = ToolCall::new(handoff_tool_name(to), arguments);

    let mut payload = json!({"assistant": to});
    if let (Some(obj), Some(extra)) = (payload.as_object_mut(), extra) {
        obj.insert("results".to_string(), extra);
    }

    let result = Message::tool_result(&call.id, &call.name, &payload);
    let request = Message::assistant_tool_calls(from, from_visibility, "", vec![call]);
    (request, result)
}

/// Resolve which agent receives control next, given a control type.
///
/// The single resolution site for both uses:
/// - Start-agent resolution passes `current = Some(agent)`: `retain` keeps
///   the presumptive current agent.
/// - Internal-output resolution passes `current = None` (an internal agent
///   may not keep control): `retain` pops the call stack like
///   `relinquish_to_parent`.
pub fn resolve_control(
    control: ControlType,
    current: Option<&str>,
    call_stack: &mut Vec<String>,
    start_agent: &str,
) -> String {
    match control {
        ControlType::Retain => match current {
            Some(agent) => agent.to_string(),
            None => call_stack.pop().unwrap_or_else(|| start_agent.to_string()),
        },
        ControlType::RelinquishToParent => {
            call_stack.pop().unwrap_or_else(|| start_agent.to_string())
        }
        ControlType::RelinquishToStart => start_agent.to_string(),
    }
}
