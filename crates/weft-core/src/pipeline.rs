// Pipeline state manager
//
// A pipeline is a pre-declared ordered sequence of agents executed as a
// sub-flow with shared accumulating data, layered on top of the ordinary
// handoff mechanism. In-flight state is keyed by the NEXT agent expected to
// run a step and is owned exclusively by this manager for the duration of
// the pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::workflow::{PipelineConfig, WorkflowIndex};

/// In-flight execution state for one pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Pipeline name
    pub pipeline_name: String,

    /// Index of the step about to run (0-based)
    pub current_step: usize,

    /// Number of steps in the pipeline
    pub total_steps: usize,

    /// Agent to return control to when the pipeline completes
    pub calling_agent: String,

    /// Shallow-merged data shared across steps
    pub pipeline_data: serde_json::Map<String, Value>,

    /// Results of completed steps, in order
    pub step_results: Vec<Value>,

    /// When the pipeline was initialized
    pub started_at: DateTime<Utc>,
}

/// Outcome of advancing or failing a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineAdvance {
    /// Hand control to the next step agent
    Handoff { next_agent: String },
    /// Pipeline finished; return control to the calling agent
    Complete { return_to: String, results: Value },
    /// Unrecoverable within the pipeline; no caller to unwind to
    Error { message: String },
}

/// Manages in-flight pipeline execution state for one turn
#[derive(Debug, Default)]
pub struct PipelineStateManager {
    states: HashMap<String, PipelineState>,
}

impl PipelineStateManager {
    /// Create an empty manager (turn start)
    pub fn new() -> Self {
        Self::default()
    }

    /// The state held by an agent, if any
    pub fn state_for(&self, agent: &str) -> Option<&PipelineState> {
        self.states.get(agent)
    }

    /// Initialize a pipeline: creates step-0 state keyed by the first step
    /// agent. Returns the first agent, or None for an empty pipeline.
    ///
    /// Starting a pipeline while its first agent already holds state
    /// overwrites that state (last-write-wins).
    pub fn initialize(
        &mut self,
        calling_agent: &str,
        config: &PipelineConfig,
        initial_data: serde_json::Map<String, Value>,
    ) -> Option<String> {
        let first = config.agents.first()?.clone();

        let state = PipelineState {
            pipeline_name: config.name.clone(),
            current_step: 0,
            total_steps: config.agents.len(),
            calling_agent: calling_agent.to_string(),
            pipeline_data: initial_data,
            step_results: Vec::new(),
            started_at: Utc::now(),
        };

        if let Some(previous) = self.states.insert(first.clone(), state) {
            warn!(
                pipeline = %config.name,
                displaced = %previous.pipeline_name,
                agent = %first,
                "overwriting in-flight pipeline state"
            );
        }
        debug!(pipeline = %config.name, caller = %calling_agent, first_step = %first, "pipeline initialized");
        Some(first)
    }

    /// Advance a pipeline after `current_agent` completed its step.
    ///
    /// Merges `step_result` into the accumulated step results (append) and
    /// pipeline data (shallow-merge of object payloads). On the final step,
    /// clears the stored state and returns `Complete` carrying the
    /// aggregated results and the original calling agent; otherwise re-keys
    /// the state under the next step agent and returns `Handoff`.
    pub fn advance(
        &mut self,
        current_agent: &str,
        index: &WorkflowIndex,
        step_result: Value,
    ) -> PipelineAdvance {
        let Some(mut state) = self.states.remove(current_agent) else {
            return PipelineAdvance::Error {
                message: format!("no pipeline state for agent {current_agent}"),
            };
        };

        if let Some(object) = step_result.as_object() {
            for (key, value) in object {
                state.pipeline_data.insert(key.clone(), value.clone());
            }
        }
        state.step_results.push(step_result);

        let Some(config) = index.pipeline(&state.pipeline_name) else {
            return PipelineAdvance::Error {
                message: format!("pipeline {} not found in workflow", state.pipeline_name),
            };
        };

        if state.current_step + 1 >= state.total_steps {
            debug!(pipeline = %state.pipeline_name, caller = %state.calling_agent, "pipeline complete");
            return PipelineAdvance::Complete {
                return_to: state.calling_agent,
                results: json!({
                    "pipeline": state.pipeline_name,
                    "step_results": state.step_results,
                    "pipeline_data": state.pipeline_data,
                }),
            };
        }

        state.current_step += 1;
        let next_agent = config.agents[state.current_step].clone();
        debug!(
            pipeline = %state.pipeline_name,
            step = state.current_step,
            next = %next_agent,
            "pipeline advanced"
        );
        self.states.insert(next_agent.clone(), state);
        PipelineAdvance::Handoff { next_agent }
    }

    /// Handle a failure in a pipeline step.
    ///
    /// If the agent holds state and the caller should be notified, the
    /// state is cleared and `Complete` is returned with an error-annotated
    /// payload (including partial results) directed back to the calling
    /// agent. Otherwise a bare `Error` is returned.
    pub fn handle_error(
        &mut self,
        agent: &str,
        error: &str,
        should_return_to_caller: bool,
    ) -> PipelineAdvance {
        match self.states.remove(agent) {
            Some(state) if should_return_to_caller => {
                warn!(
                    pipeline = %state.pipeline_name,
                    agent = %agent,
                    error = %error,
                    "pipeline failed, unwinding to caller"
                );
                PipelineAdvance::Complete {
                    return_to: state.calling_agent,
                    results: json!({
                        "pipeline": state.pipeline_name,
                        "error": error,
                        "step_results": state.step_results,
                        "pipeline_data": state.pipeline_data,
                    }),
                }
            }
            _ => PipelineAdvance::Error {
                message: error.to_string(),
            },
        }
    }
}
