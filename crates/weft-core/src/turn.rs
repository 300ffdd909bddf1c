// Turn orchestrator
//
// The main loop for one conversation turn. Coordinates:
// - Starting-agent resolution from the message history
// - Running agents via AgentRuntime and folding their event streams
// - Executing tool calls via ToolBinding (error-wrapped)
// - Handoffs: call stack, transfer limiting, synthetic transfer pairs
// - Pipeline sub-flows via PipelineStateManager
// - Emitting the ordered message sequence plus a final usage summary
//
// All turn state lives in TurnState, owned by the run: concurrent
// conversations never share orchestration state.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::agent::CompiledAgent;
use crate::error::{OrchestratorError, Result};
use crate::events::{AgentEvent, TurnEvent, UsageSummary};
use crate::handoff::{
    handoff_target, resolve_control, transfer_messages, validate_handoff_context, HandoffContext,
};
use crate::message::{Message, MessageRole, ResponseType, ToolCall};
use crate::pipeline::{PipelineAdvance, PipelineStateManager};
use crate::traits::{AgentRuntime, ToolBinding, TurnEmitter};
use crate::transfer::TransferCounter;
use crate::workflow::{Visibility, Workflow, WorkflowIndex};

/// Greeting used when the workflow has no greeting prompt configured
pub const DEFAULT_GREETING: &str = "How can I help you today?";

/// Configuration for the turn orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Cap on model outputs per turn. Loop protection against runtimes
    /// that never produce a terminating output; exceeding it is fatal.
    pub max_model_rounds: usize,

    /// Greeting fallback when the workflow has no greeting prompt
    pub greeting: Option<String>,
}

fn default_max_model_rounds() -> usize {
    48
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_model_rounds: default_max_model_rounds(),
            greeting: None,
        }
    }
}

impl OrchestratorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model-round cap
    pub fn with_max_model_rounds(mut self, max: usize) -> Self {
        self.max_model_rounds = max;
        self
    }

    /// Set the greeting fallback
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }
}

/// Result of a complete turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Messages produced by this turn, in order
    pub messages: Vec<Message>,
    /// Token totals accumulated across every agent run in the turn
    pub usage: UsageSummary,
}

/// Per-run orchestration state
struct TurnState {
    call_stack: Vec<String>,
    transfers: TransferCounter,
    pipelines: PipelineStateManager,
    usage: UsageSummary,
    transcript: Vec<Message>,
    produced: Vec<Message>,
    rounds: usize,
}

/// Outcome of one agent's run (one or more model rounds)
enum AgentRunOutcome {
    /// The agent produced a completed text output
    Output(String),
    /// The agent requested an honorable handoff
    Handoff {
        target: String,
        context: HandoffContext,
    },
}

/// The turn orchestrator
///
/// Drives one conversation turn against a workflow with pluggable backends:
/// - Agent execution (AgentRuntime)
/// - Tool execution (ToolBinding)
/// - Output consumption (TurnEmitter)
pub struct TurnOrchestrator<R, T, E>
where
    R: AgentRuntime,
    T: ToolBinding,
    E: TurnEmitter,
{
    workflow: Workflow,
    config: OrchestratorConfig,
    runtime: Arc<R>,
    tools: Arc<T>,
    emitter: Arc<E>,
}

impl<R, T, E> TurnOrchestrator<R, T, E>
where
    R: AgentRuntime,
    T: ToolBinding,
    E: TurnEmitter,
{
    /// Create a new turn orchestrator
    pub fn new(
        workflow: Workflow,
        config: OrchestratorConfig,
        runtime: R,
        tools: T,
        emitter: E,
    ) -> Self {
        Self {
            workflow,
            config,
            runtime: Arc::new(runtime),
            tools: Arc::new(tools),
            emitter: Arc::new(emitter),
        }
    }

    /// Create a new turn orchestrator with Arc-wrapped components
    pub fn with_arcs(
        workflow: Workflow,
        config: OrchestratorConfig,
        runtime: Arc<R>,
        tools: Arc<T>,
        emitter: Arc<E>,
    ) -> Self {
        Self {
            workflow,
            config,
            runtime,
            tools,
            emitter,
        }
    }

    /// Get the workflow
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Run one turn against the given message history.
    ///
    /// Emits every produced message, then one final usage summary, through
    /// the emitter in causal order, and returns the same sequence buffered.
    pub async fn run(&self, history: &[Message]) -> Result<TurnOutcome> {
        if history.is_empty() {
            return Err(OrchestratorError::NoMessages);
        }

        let index = WorkflowIndex::build(&self.workflow);

        // First contact: nothing but system messages so far. Emit the
        // greeting and a zero usage summary, then stop.
        if history.iter().all(|m| m.role == MessageRole::System) {
            return self.greet(&index).await;
        }

        let (start_name, call_stack) = resolve_start_agent(&index, history);
        info!(agent = %start_name, "turn started");

        let start_config = index
            .agent(&start_name)
            .ok_or_else(|| OrchestratorError::unknown_agent(&start_name))?;
        let mut active = CompiledAgent::compile(start_config, &index);

        let mut state = TurnState {
            call_stack,
            transfers: TransferCounter::new(),
            pipelines: PipelineStateManager::new(),
            usage: UsageSummary::zero(),
            transcript: history.to_vec(),
            produced: Vec::new(),
            rounds: 0,
        };

        'turn: loop {
            let outcome = match self.run_agent(&index, &mut state, &active).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    // A failing pipeline step unwinds to its calling agent
                    // instead of aborting the turn.
                    if state.pipelines.state_for(&active.name).is_some() {
                        if let PipelineAdvance::Complete { return_to, results } = state
                            .pipelines
                            .handle_error(&active.name, &err.to_string(), true)
                        {
                            active = self
                                .transfer(
                                    &index,
                                    &mut state,
                                    &active,
                                    &return_to,
                                    HandoffContext::default(),
                                    Some(results),
                                )
                                .await?;
                            continue 'turn;
                        }
                    }
                    return Err(err);
                }
            };

            match outcome {
                AgentRunOutcome::Handoff { target, context } => {
                    // A handoff target naming a pipeline starts the sub-flow
                    // and transfers to its first step agent.
                    if let Some(pipeline) = index.pipeline(&target).cloned() {
                        let first_known = pipeline
                            .agents
                            .first()
                            .is_some_and(|first| index.agent(first).is_some());
                        if !first_known {
                            warn!(pipeline = %target, "pipeline has no runnable first step, skipping handoff");
                            continue 'turn;
                        }
                        let Some(first) =
                            state
                                .pipelines
                                .initialize(&active.name, &pipeline, context.data.clone())
                        else {
                            continue 'turn;
                        };
                        active = self
                            .transfer(&index, &mut state, &active, &first, context, None)
                            .await?;
                        continue 'turn;
                    }

                    let target_config = index
                        .agent(&target)
                        .ok_or_else(|| OrchestratorError::unknown_agent(&target))?;
                    if target_config.output_visibility == Visibility::Internal {
                        state.call_stack.push(active.name.clone());
                        state.transfers.increment(&active.name, &target);
                    }
                    active = self
                        .transfer(&index, &mut state, &active, &target, context, None)
                        .await?;
                }

                AgentRunOutcome::Output(text) => {
                    let response_type = ResponseType::from(active.visibility);
                    let message = Message::assistant(&active.name, response_type, &text);
                    self.append(&mut state, message).await?;

                    // An agent holding pipeline state just completed its
                    // step: fold the output in and advance the pipeline.
                    if state.pipelines.state_for(&active.name).is_some() {
                        let step_result = json!({"agent": active.name, "output": text});
                        match state.pipelines.advance(&active.name, &index, step_result) {
                            PipelineAdvance::Handoff { next_agent } => {
                                active = self
                                    .transfer(
                                        &index,
                                        &mut state,
                                        &active,
                                        &next_agent,
                                        HandoffContext::default(),
                                        None,
                                    )
                                    .await?;
                                continue 'turn;
                            }
                            PipelineAdvance::Complete { return_to, results } => {
                                active = self
                                    .transfer(
                                        &index,
                                        &mut state,
                                        &active,
                                        &return_to,
                                        HandoffContext::default(),
                                        Some(results),
                                    )
                                    .await?;
                                continue 'turn;
                            }
                            PipelineAdvance::Error { message } => {
                                warn!(agent = %active.name, error = %message, "pipeline advance failed");
                            }
                        }
                    }

                    match active.visibility {
                        // An internal agent's output always causes an
                        // automatic transfer, never a turn end.
                        Visibility::Internal => {
                            let next = resolve_control(
                                active.control_type,
                                None,
                                &mut state.call_stack,
                                index.start_agent(),
                            );
                            debug!(from = %active.name, to = %next, control = %active.control_type, "internal output, auto transfer");
                            active = self
                                .transfer(
                                    &index,
                                    &mut state,
                                    &active,
                                    &next,
                                    HandoffContext::default(),
                                    None,
                                )
                                .await?;
                        }
                        Visibility::UserFacing => {
                            let last_is_own_text = state.transcript.last().is_some_and(|m| {
                                m.is_assistant_text()
                                    && m.agent_name.as_deref() == Some(active.name.as_str())
                            });
                            if last_is_own_text {
                                break 'turn;
                            }
                        }
                    }
                }
            }
        }

        info!(
            agent = %active.name,
            messages = state.produced.len(),
            rounds = state.rounds,
            "turn completed"
        );

        self.emitter
            .emit(TurnEvent::Usage(state.usage.clone()))
            .await?;

        Ok(TurnOutcome {
            messages: state.produced,
            usage: state.usage,
        })
    }

    // =========================================================================
    // Private methods
    // =========================================================================

    /// Emit the first-contact greeting and a zero usage summary
    async fn greet(&self, index: &WorkflowIndex) -> Result<TurnOutcome> {
        let greeting = index
            .greeting()
            .map(|p| p.prompt.clone())
            .or_else(|| self.config.greeting.clone())
            .unwrap_or_else(|| DEFAULT_GREETING.to_string());

        info!(agent = %index.start_agent(), "first contact, emitting greeting");

        let message = Message::assistant(index.start_agent(), ResponseType::External, greeting);
        self.emitter
            .emit(TurnEvent::Message(message.clone()))
            .await?;
        self.emitter
            .emit(TurnEvent::Usage(UsageSummary::zero()))
            .await?;

        Ok(TurnOutcome {
            messages: vec![message],
            usage: UsageSummary::zero(),
        })
    }

    /// Run one agent until it produces a completed text output or an
    /// honorable handoff. Non-handoff tool calls are executed inline and
    /// followed by another model round; dishonorable handoffs (self-handoff,
    /// transfer bound reached, unknown target) are skipped.
    async fn run_agent(
        &self,
        index: &WorkflowIndex,
        state: &mut TurnState,
        agent: &CompiledAgent,
    ) -> Result<AgentRunOutcome> {
        loop {
            state.rounds += 1;
            if state.rounds > self.config.max_model_rounds {
                return Err(OrchestratorError::MaxRoundsReached(
                    self.config.max_model_rounds,
                ));
            }

            let mut stream = self.runtime.stream(agent, &state.transcript).await?;

            let mut text = String::new();
            let mut tool_calls: Vec<ToolCall> = Vec::new();

            while let Some(event) = stream.next().await {
                match event? {
                    AgentEvent::TextDelta(delta) => text.push_str(&delta),
                    AgentEvent::ToolCalls(calls) => tool_calls.extend(calls),
                    AgentEvent::Done(usage) => {
                        state.usage.absorb(&usage);
                        break;
                    }
                    AgentEvent::Error(err) => return Err(OrchestratorError::runtime(err)),
                }
            }

            let (handoffs, regular): (Vec<ToolCall>, Vec<ToolCall>) = tool_calls
                .into_iter()
                .partition(|call| handoff_target(call).is_some());

            if !regular.is_empty() {
                let message = Message::assistant_tool_calls(
                    &agent.name,
                    ResponseType::from(agent.visibility),
                    &text,
                    regular.clone(),
                );
                self.append(state, message).await?;

                for call in &regular {
                    let result = self.execute_tool(index, call).await;
                    let message = Message::tool_result(&call.id, &call.name, &result);
                    self.append(state, message).await?;
                }
            }

            if let Some(call) = handoffs.first() {
                // One transfer per model output: the first handoff wins.
                if handoffs.len() > 1 {
                    warn!(agent = %agent.name, dropped = handoffs.len() - 1, "multiple handoffs in one output, honoring the first");
                }

                let target = handoff_target(call)
                    .expect("partitioned as handoff-shaped")
                    .to_string();
                let context = validate_handoff_context(&agent.name, call.arguments.clone());

                if target == agent.name {
                    info!(agent = %agent.name, "self-handoff ignored");
                    continue;
                }

                if index.pipeline(&target).is_none() {
                    let Some(target_config) = index.agent(&target) else {
                        warn!(agent = %agent.name, target = %target, "handoff to unknown target ignored");
                        continue;
                    };
                    if target_config.output_visibility == Visibility::Internal
                        && state.transfers.get(&agent.name, &target)
                            >= target_config.max_calls_per_parent
                    {
                        info!(
                            from = %agent.name,
                            to = %target,
                            limit = target_config.max_calls_per_parent,
                            "transfer limit reached, handoff ignored"
                        );
                        continue;
                    }
                }

                return Ok(AgentRunOutcome::Handoff { target, context });
            }

            if !regular.is_empty() {
                // Tool results are in the transcript; give the agent
                // another round to use them.
                continue;
            }

            return Ok(AgentRunOutcome::Output(text));
        }
    }

    /// Append the synthetic transfer pair and compile the receiving agent,
    /// patched relative to the sending parent from its pristine baseline.
    async fn transfer(
        &self,
        index: &WorkflowIndex,
        state: &mut TurnState,
        from: &CompiledAgent,
        to: &str,
        context: HandoffContext,
        extra: Option<serde_json::Value>,
    ) -> Result<CompiledAgent> {
        let (request, result) = transfer_messages(
            &from.name,
            ResponseType::from(from.visibility),
            to,
            &context,
            extra,
        );
        self.append(state, request).await?;
        self.append(state, result).await?;

        let config = index
            .agent(to)
            .ok_or_else(|| OrchestratorError::unknown_agent(to))?;
        let baseline = CompiledAgent::compile(config, index);
        Ok(baseline.for_parent(&from.name))
    }

    /// Append a message to the turn transcript and emit it
    async fn append(&self, state: &mut TurnState, message: Message) -> Result<()> {
        state.transcript.push(message.clone());
        state.produced.push(message.clone());
        self.emitter.emit(TurnEvent::Message(message)).await
    }

    /// Execute one tool call, wrapping any failure into an error payload
    /// surfaced to the agent. Tool failures never abort the turn.
    async fn execute_tool(&self, index: &WorkflowIndex, call: &ToolCall) -> serde_json::Value {
        let Some(config) = index.tool(&call.name) else {
            warn!(tool = %call.name, "tool not found in workflow");
            return json!({"error": format!("tool not found: {}", call.name)});
        };

        match self.tools.execute(call, config).await {
            Ok(value) => value,
            Err(err) => {
                warn!(tool = %call.name, error = %err, "tool execution failed");
                json!({"error": err.to_string()})
            }
        }
    }
}

/// Reconstruct the presumptive current agent and call stack from the
/// message history, then apply the agent's control type.
///
/// Pure function of history + configs: re-running it yields the same agent.
fn resolve_start_agent(index: &WorkflowIndex, history: &[Message]) -> (String, Vec<String>) {
    let mut stack: Vec<String> = Vec::new();
    for message in history {
        if message.role != MessageRole::Assistant {
            continue;
        }
        if let Some(name) = &message.agent_name {
            // Collapse immediate repeats: consecutive outputs by the same
            // agent are one stack entry.
            if stack.last() != Some(name) {
                stack.push(name.clone());
            }
        }
    }

    let presumptive = stack.pop();
    let current = presumptive
        .filter(|name| index.agent(name).is_some())
        .unwrap_or_else(|| index.start_agent().to_string());

    let control = index
        .agent(&current)
        .map(|a| a.control_type)
        .unwrap_or_default();

    let resolved = resolve_control(control, Some(&current), &mut stack, index.start_agent());
    (resolved, stack)
}

impl From<Visibility> for ResponseType {
    fn from(visibility: Visibility) -> Self {
        match visibility {
            Visibility::UserFacing => ResponseType::External,
            Visibility::Internal => ResponseType::Internal,
        }
    }
}
