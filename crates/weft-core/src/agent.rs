// Compiled agents
//
// CompiledAgent is the per-turn runnable form of an AgentConfig: name
// references resolved against the workflow index, instructions assembled,
// handoff targets fixed. Compilation happens once per turn per agent; the
// result is the pristine baseline. Handoff metadata is relative to the
// *current* parent, so the patched variant (give-up-control clause, parent
// appended to the target list) is always recomputed from the baseline via
// `for_parent`, never mutated in place.

use serde::{Deserialize, Serialize};

use crate::workflow::{AgentConfig, ControlType, ToolConfig, Visibility, WorkflowIndex};

/// Instructions clause injected when a user-facing retain child is handed
/// control and must know how to give it back
const GIVE_UP_CONTROL_CLAUSE: &str = "\n\n# Returning control\n\
If the user's request falls outside your scope, hand the conversation back \
to the agent that transferred it to you instead of answering yourself.";

/// The per-turn runnable form of an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledAgent {
    /// Agent name (unique within the workflow)
    pub name: String,

    /// Short description for handoff target listings
    pub description: String,

    /// Assembled instructions (system prompt)
    pub instructions: String,

    /// Model identifier
    pub model: String,

    /// Whether the agent's output is shown to the end user
    pub visibility: Visibility,

    /// What happens after this agent produces output with no handoff
    pub control_type: ControlType,

    /// Resolved tool configurations bound to this agent
    pub tools: Vec<ToolConfig>,

    /// Allowed handoff target names (agents or pipelines)
    pub handoff_targets: Vec<String>,

    /// Per-parent handoff limit (enforced when this agent is internal)
    pub max_calls_per_parent: u32,
}

impl CompiledAgent {
    /// Compile an agent config against the workflow index.
    ///
    /// Unresolvable tool and handoff references are dropped (debug-logged
    /// by the index), never rejected.
    pub fn compile(config: &AgentConfig, index: &WorkflowIndex) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            instructions: config.instructions.clone(),
            model: config.model.clone(),
            visibility: config.output_visibility,
            control_type: config.control_type,
            tools: index.resolved_tools(config),
            handoff_targets: index.resolved_handoffs(config),
            max_calls_per_parent: config.max_calls_per_parent,
        }
    }

    /// Recompute the handoff-patched variant of this agent relative to the
    /// given parent, from the pristine baseline (`self`).
    ///
    /// The patch applies only to user-facing agents with `retain` control:
    /// internal children return through the call stack automatically, and
    /// relinquishing children return by policy. Everyone else gets the
    /// parent appended as an explicit handoff target plus a clause telling
    /// them when to use it.
    pub fn for_parent(&self, parent: &str) -> Self {
        if self.visibility != Visibility::UserFacing || self.control_type != ControlType::Retain {
            return self.clone();
        }

        let mut patched = self.clone();
        patched.instructions.push_str(GIVE_UP_CONTROL_CLAUSE);
        if !patched.handoff_targets.iter().any(|t| t == parent) {
            patched.handoff_targets.push(parent.to_string());
        }
        patched
    }
}
