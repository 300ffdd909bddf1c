// Workflow document types and the per-turn lookup index
//
// A Workflow is the declarative document end users edit through a UI:
// agents, tools, prompts, pipelines, and a designated start agent.
// WorkflowIndex is built once per turn and answers name lookups.
//
// Decision: unresolved agent-to-agent and agent-to-tool references are
// dropped at index build (debug-logged), never rejected. A half-edited
// workflow must still run; only an unknown start agent is fatal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whether an agent's output is shown to the end user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Output is shown to the end user and can end a turn
    #[default]
    UserFacing,
    /// Output always triggers an automatic transfer, never ends a turn
    Internal,
}

/// Policy governing what happens after an agent produces output
/// with no explicit handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    /// Keep control with this agent
    #[default]
    Retain,
    /// Return control to the calling parent
    RelinquishToParent,
    /// Return control to the workflow's start agent
    RelinquishToStart,
}

impl std::fmt::Display for ControlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlType::Retain => write!(f, "retain"),
            ControlType::RelinquishToParent => write!(f, "relinquish_to_parent"),
            ControlType::RelinquishToStart => write!(f, "relinquish_to_start"),
        }
    }
}

/// Agent configuration within a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent name within the workflow
    pub name: String,

    /// Short description shown to other agents when offered as a handoff target
    #[serde(default)]
    pub description: String,

    /// Agent instructions (system prompt)
    pub instructions: String,

    /// Model identifier (e.g. "gpt-4o")
    #[serde(default)]
    pub model: String,

    /// Whether the agent's output is shown to the end user
    #[serde(default)]
    pub output_visibility: Visibility,

    /// What happens after this agent produces output with no handoff
    #[serde(default)]
    pub control_type: ControlType,

    /// Names of tools bound to this agent
    #[serde(default)]
    pub tools: Vec<String>,

    /// Names of agents this agent may hand off to
    #[serde(default)]
    pub connected_agents: Vec<String>,

    /// How many times one parent may hand off to this agent within a turn.
    /// Only enforced when this agent is internal.
    #[serde(default = "default_max_calls_per_parent")]
    pub max_calls_per_parent: u32,
}

fn default_max_calls_per_parent() -> u32 {
    3
}

impl AgentConfig {
    /// Create a minimal agent configuration
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            model: String::new(),
            output_visibility: Visibility::UserFacing,
            control_type: ControlType::Retain,
            tools: Vec::new(),
            connected_agents: Vec::new(),
            max_calls_per_parent: default_max_calls_per_parent(),
        }
    }

    /// Set the output visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.output_visibility = visibility;
        self
    }

    /// Set the control type
    pub fn with_control_type(mut self, control_type: ControlType) -> Self {
        self.control_type = control_type;
        self
    }

    /// Bind tools by name
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Allow handoffs to the named agents
    pub fn with_connected_agents(
        mut self,
        agents: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.connected_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-parent handoff limit
    pub fn with_max_calls_per_parent(mut self, max: u32) -> Self {
        self.max_calls_per_parent = max;
        self
    }
}

/// How a tool is executed. The orchestration core treats every kind
/// uniformly through the ToolBinding interface; the kind travels to
/// the binding so it can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Returns a canned or simulated response (workflow authoring/testing)
    #[default]
    Mock,
    /// Forwarded to an operator-configured webhook
    Webhook,
    /// Answered from an attached knowledge source
    Retrieval,
    /// Provided by a third-party integration
    ThirdParty,
}

/// Tool configuration within a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Unique tool name within the workflow
    pub name: String,

    /// Tool description for the model
    #[serde(default)]
    pub description: String,

    /// JSON schema for tool parameters
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,

    /// How this tool is executed
    #[serde(default)]
    pub kind: ToolKind,

    /// Canned response for mock tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_response: Option<serde_json::Value>,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolConfig {
    /// Create a mock tool configuration
    pub fn mock(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: empty_object_schema(),
            kind: ToolKind::Mock,
            mock_response: None,
        }
    }

    /// Set the parameters schema
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the canned response returned by the mock binding
    pub fn with_mock_response(mut self, response: serde_json::Value) -> Self {
        self.mock_response = Some(response);
        self
    }
}

/// Prompt purpose within a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    /// Emitted verbatim as the first assistant message of a conversation
    Greeting,
    /// Style guidance appended to agent instructions by the editor
    Style,
    /// Free-form prompt referenced from agent instructions
    #[default]
    Custom,
}

/// Prompt configuration within a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Unique prompt name within the workflow
    pub name: String,

    /// Prompt purpose
    #[serde(default)]
    pub prompt_type: PromptType,

    /// Prompt text
    pub prompt: String,
}

/// A pre-declared ordered sequence of agents executed as a sub-flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Unique pipeline name within the workflow
    pub name: String,

    /// Ordered step agents
    pub agents: Vec<String>,
}

/// A workflow: the directed graph of agents, tools, and prompts
/// an operator defines, plus the designated start agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub agents: Vec<AgentConfig>,

    #[serde(default)]
    pub tools: Vec<ToolConfig>,

    #[serde(default)]
    pub prompts: Vec<PromptConfig>,

    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,

    /// Name of the agent that receives control at the start of a conversation
    pub start_agent: String,
}

impl Workflow {
    /// Create a workflow with the given start agent
    pub fn new(start_agent: impl Into<String>) -> Self {
        Self {
            agents: Vec::new(),
            tools: Vec::new(),
            prompts: Vec::new(),
            pipelines: Vec::new(),
            start_agent: start_agent.into(),
        }
    }

    /// Add an agent
    pub fn with_agent(mut self, agent: AgentConfig) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add a tool
    pub fn with_tool(mut self, tool: ToolConfig) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add a prompt
    pub fn with_prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Add a pipeline
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipelines.push(pipeline);
        self
    }
}

// ============================================================================
// WorkflowIndex - name lookups, built once per turn
// ============================================================================

/// Pure lookup maps over a workflow document, built once per turn
#[derive(Debug, Clone)]
pub struct WorkflowIndex {
    agents: HashMap<String, AgentConfig>,
    tools: HashMap<String, ToolConfig>,
    prompts: HashMap<String, PromptConfig>,
    pipelines: HashMap<String, PipelineConfig>,
    start_agent: String,
}

impl WorkflowIndex {
    /// Build the index from a workflow document
    pub fn build(workflow: &Workflow) -> Self {
        let agents = workflow
            .agents
            .iter()
            .map(|a| (a.name.clone(), a.clone()))
            .collect();
        let tools = workflow
            .tools
            .iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();
        let prompts = workflow
            .prompts
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();
        let pipelines = workflow
            .pipelines
            .iter()
            .map(|p| (p.name.clone(), p.clone()))
            .collect();

        Self {
            agents,
            tools,
            prompts,
            pipelines,
            start_agent: workflow.start_agent.clone(),
        }
    }

    /// Look up an agent by name
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }

    /// Look up a tool by name
    pub fn tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.get(name)
    }

    /// Look up a prompt by name
    pub fn prompt(&self, name: &str) -> Option<&PromptConfig> {
        self.prompts.get(name)
    }

    /// Look up a pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.pipelines.get(name)
    }

    /// The workflow's designated start agent name
    pub fn start_agent(&self) -> &str {
        &self.start_agent
    }

    /// The greeting prompt, if one is configured
    pub fn greeting(&self) -> Option<&PromptConfig> {
        self.prompts
            .values()
            .find(|p| p.prompt_type == PromptType::Greeting)
    }

    /// Resolve an agent's bound tools, dropping unresolved names
    pub fn resolved_tools(&self, agent: &AgentConfig) -> Vec<ToolConfig> {
        agent
            .tools
            .iter()
            .filter_map(|name| {
                let tool = self.tools.get(name);
                if tool.is_none() {
                    debug!(agent = %agent.name, tool = %name, "dropping unresolved tool reference");
                }
                tool.cloned()
            })
            .collect()
    }

    /// Resolve an agent's handoff targets, dropping unresolved names.
    /// A target may be an agent or a pipeline.
    pub fn resolved_handoffs(&self, agent: &AgentConfig) -> Vec<String> {
        agent
            .connected_agents
            .iter()
            .filter(|name| {
                let known =
                    self.agents.contains_key(*name) || self.pipelines.contains_key(*name);
                if !known {
                    debug!(agent = %agent.name, target = %name, "dropping unresolved handoff reference");
                }
                known
            })
            .cloned()
            .collect()
    }
}
