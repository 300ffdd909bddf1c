// Integration tests for turn orchestration
//
// These tests drive the full orchestrator against scripted agent runtimes
// and verify the turn-level guarantees: greeting on first contact, direct
// answers, handoff limiting, automatic returns from internal agents,
// pipeline sub-flows, and tool error wrapping.

use serde_json::json;

use weft_core::memory::{
    FailingToolBinding, InMemoryEmitter, MockAgentRuntime, MockOutput, MockToolBinding,
};
use weft_core::{
    AgentConfig, ControlType, Message, MessageRole, OrchestratorConfig, PipelineConfig,
    PromptConfig, PromptType, ResponseType, ToolCall, ToolConfig, TurnEvent, TurnOrchestrator,
    UsageSummary, Visibility, Workflow, DEFAULT_GREETING,
};

fn orchestrator(
    workflow: Workflow,
    runtime: MockAgentRuntime,
) -> TurnOrchestrator<MockAgentRuntime, MockToolBinding, InMemoryEmitter> {
    TurnOrchestrator::new(
        workflow,
        OrchestratorConfig::default(),
        runtime,
        MockToolBinding::new(),
        InMemoryEmitter::new(),
    )
}

/// Transfer tool messages appended for handoffs into `target`
fn transfers_to(messages: &[Message], target: &str) -> usize {
    messages
        .iter()
        .filter(|m| {
            m.tool_calls
                .as_ref()
                .is_some_and(|calls| calls.iter().any(|c| c.name == format!("transfer_to_{target}")))
        })
        .count()
}

// =============================================================================
// Scenario A: first contact
// =============================================================================

#[tokio::test]
async fn test_first_contact_emits_configured_greeting() {
    let workflow = Workflow::new("Support")
        .with_agent(AgentConfig::new("Support", "Help."))
        .with_prompt(PromptConfig {
            name: "welcome".to_string(),
            prompt_type: PromptType::Greeting,
            prompt: "Welcome! What can we look into for you?".to_string(),
        });
    let orchestrator = orchestrator(workflow, MockAgentRuntime::new());

    let history = vec![Message::system("You are a support workflow.")];
    let outcome = orchestrator.run(&history).await.unwrap();

    assert_eq!(outcome.messages.len(), 1);
    let greeting = &outcome.messages[0];
    assert_eq!(greeting.role, MessageRole::Assistant);
    assert_eq!(greeting.content, "Welcome! What can we look into for you?");
    assert_eq!(greeting.agent_name.as_deref(), Some("Support"));
    assert_eq!(greeting.response_type, Some(ResponseType::External));
    assert_eq!(outcome.usage, UsageSummary::zero());
}

#[tokio::test]
async fn test_first_contact_falls_back_to_default_greeting() {
    let workflow = Workflow::new("Support").with_agent(AgentConfig::new("Support", "Help."));
    let runtime = MockAgentRuntime::new();
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator
        .run(&[Message::system("sys")])
        .await
        .unwrap();

    assert_eq!(outcome.messages[0].content, DEFAULT_GREETING);
}

// =============================================================================
// Scenario B: direct answer, one agent run
// =============================================================================

#[tokio::test]
async fn test_direct_answer_ends_turn_after_one_run() {
    let workflow = Workflow::new("Support").with_agent(AgentConfig::new("Support", "Help."));
    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::text("Your order is on its way.").with_usage(20, 15, 5)
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let history = vec![Message::user("Where is my order?")];
    let outcome = orchestrator.run(&history).await.unwrap();

    assert_eq!(outcome.messages.len(), 1);
    assert_eq!(outcome.messages[0].content, "Your order is on its way.");
    assert_eq!(
        outcome.usage,
        UsageSummary {
            total_tokens: 20,
            prompt_tokens: 15,
            completion_tokens: 5
        }
    );
}

// =============================================================================
// Scenario C: transfer limiting and the relinquish-to-parent return path
// =============================================================================

#[tokio::test]
async fn test_transfer_limit_blocks_second_handoff_into_internal_agent() {
    let workflow = Workflow::new("Front")
        .with_agent(AgentConfig::new("Front", "Route.").with_connected_agents(["Checker"]))
        .with_agent(
            AgentConfig::new("Checker", "Check internally.")
                .with_visibility(Visibility::Internal)
                .with_control_type(ControlType::RelinquishToParent)
                .with_max_calls_per_parent(1),
        );

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("Checker"),
        MockOutput::text("internal check complete"),
        // Second attempt at the same internal target: blocked by the limit,
        // the agent does not transfer and runs another round instead.
        MockOutput::handoff("Checker"),
        MockOutput::text("All set."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let history = vec![Message::user("Please double-check my account.")];
    let outcome = orchestrator.run(&history).await.unwrap();

    // Exactly one honored transfer into Checker.
    assert_eq!(transfers_to(&outcome.messages, "Checker"), 1);
    // Checker's output came back via the relinquish_to_parent pop path.
    assert_eq!(transfers_to(&outcome.messages, "Front"), 1);

    let last = outcome.messages.last().unwrap();
    assert_eq!(last.content, "All set.");
    assert_eq!(last.agent_name.as_deref(), Some("Front"));
    assert_eq!(last.response_type, Some(ResponseType::External));
}

#[tokio::test]
async fn test_internal_output_never_ends_the_turn() {
    let workflow = Workflow::new("Front")
        .with_agent(AgentConfig::new("Front", "Route.").with_connected_agents(["Worker"]))
        .with_agent(
            AgentConfig::new("Worker", "Work.")
                .with_visibility(Visibility::Internal)
                .with_control_type(ControlType::RelinquishToParent),
        );

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("Worker"),
        MockOutput::text("worked"),
        MockOutput::text("Done, here is what I found."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator.run(&[Message::user("go")]).await.unwrap();

    // The internal message is in the transcript but the turn ended on the
    // user-facing agent's own text.
    let internal = outcome
        .messages
        .iter()
        .find(|m| m.agent_name.as_deref() == Some("Worker") && m.is_assistant_text())
        .unwrap();
    assert_eq!(internal.response_type, Some(ResponseType::Internal));

    let last = outcome.messages.last().unwrap();
    assert_eq!(last.response_type, Some(ResponseType::External));
    assert_eq!(last.agent_name.as_deref(), Some("Front"));
}

#[tokio::test]
async fn test_self_handoff_is_ignored() {
    let workflow = Workflow::new("Solo")
        .with_agent(AgentConfig::new("Solo", "Answer.").with_connected_agents(["Solo"]));

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("Solo"),
        MockOutput::text("Answered without transferring."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator.run(&[Message::user("hi")]).await.unwrap();

    assert_eq!(transfers_to(&outcome.messages, "Solo"), 0);
    assert_eq!(
        outcome.messages.last().unwrap().content,
        "Answered without transferring."
    );
}

#[tokio::test]
async fn test_handoff_to_unknown_target_is_ignored() {
    let workflow = Workflow::new("Solo").with_agent(AgentConfig::new("Solo", "Answer."));

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("Ghost"),
        MockOutput::text("Handled it myself."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator.run(&[Message::user("hi")]).await.unwrap();
    assert_eq!(transfers_to(&outcome.messages, "Ghost"), 0);
    assert_eq!(outcome.messages.len(), 1);
}

// =============================================================================
// Tool execution
// =============================================================================

#[tokio::test]
async fn test_tool_calls_execute_and_feed_the_next_round() {
    let workflow = Workflow::new("Support")
        .with_agent(AgentConfig::new("Support", "Help.").with_tools(["lookup_order"]))
        .with_tool(
            ToolConfig::mock("lookup_order", "Look up an order")
                .with_mock_response(json!({"status": "shipped"})),
        );

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::with_tools(
            "",
            vec![ToolCall::new("lookup_order", json!({"order_id": "A-17"}))],
        ),
        MockOutput::text("Your order has shipped."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator
        .run(&[Message::user("Where is order A-17?")])
        .await
        .unwrap();

    assert_eq!(outcome.messages.len(), 3);
    assert!(outcome.messages[0].has_tool_calls());
    assert_eq!(outcome.messages[1].role, MessageRole::Tool);
    assert_eq!(
        outcome.messages[1].tool_call_id,
        outcome.messages[0].tool_calls.as_ref().map(|c| c[0].id.clone())
    );
    let payload: serde_json::Value = serde_json::from_str(&outcome.messages[1].content).unwrap();
    assert_eq!(payload, json!({"status": "shipped"}));
    assert_eq!(outcome.messages[2].content, "Your order has shipped.");
}

#[tokio::test]
async fn test_tool_failure_becomes_error_payload_and_turn_continues() {
    let workflow = Workflow::new("Support")
        .with_agent(AgentConfig::new("Support", "Help.").with_tools(["lookup_order"]))
        .with_tool(ToolConfig::mock("lookup_order", "Look up an order"));

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::with_tools("", vec![ToolCall::new("lookup_order", json!({}))]),
        MockOutput::text("Sorry, the order system is down."),
    ]);
    let orchestrator = TurnOrchestrator::new(
        workflow,
        OrchestratorConfig::default(),
        runtime,
        FailingToolBinding::new("backend unavailable"),
        InMemoryEmitter::new(),
    );

    let outcome = orchestrator.run(&[Message::user("check")]).await.unwrap();

    let payload: serde_json::Value = serde_json::from_str(&outcome.messages[1].content).unwrap();
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .contains("backend unavailable"));
    assert_eq!(
        outcome.messages.last().unwrap().content,
        "Sorry, the order system is down."
    );
}

// =============================================================================
// Scenario D: pipelines
// =============================================================================

#[tokio::test]
async fn test_pipeline_runs_steps_in_order_and_returns_to_caller() {
    let workflow = Workflow::new("Router")
        .with_agent(AgentConfig::new("Router", "Route.").with_connected_agents(["intake"]))
        .with_agent(
            AgentConfig::new("Extract", "Extract.").with_visibility(Visibility::Internal),
        )
        .with_agent(AgentConfig::new("Enrich", "Enrich.").with_visibility(Visibility::Internal))
        .with_agent(
            AgentConfig::new("Summarize", "Summarize.").with_visibility(Visibility::Internal),
        )
        .with_pipeline(PipelineConfig {
            name: "intake".to_string(),
            agents: vec![
                "Extract".to_string(),
                "Enrich".to_string(),
                "Summarize".to_string(),
            ],
        });

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("intake"),
        MockOutput::text("entities extracted"),
        MockOutput::text("records enriched"),
        MockOutput::text("summary written"),
        MockOutput::text("Here is the processed intake."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator
        .run(&[Message::user("process this")])
        .await
        .unwrap();

    // Steps ran in declared order.
    let step_agents: Vec<&str> = outcome
        .messages
        .iter()
        .filter(|m| m.is_assistant_text() && m.response_type == Some(ResponseType::Internal))
        .filter_map(|m| m.agent_name.as_deref())
        .collect();
    assert_eq!(step_agents, vec!["Extract", "Enrich", "Summarize"]);

    // The completion transfer back to Router carries the aggregated results.
    let completion = outcome
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter_map(|m| serde_json::from_str::<serde_json::Value>(&m.content).ok())
        .find(|p| p["assistant"] == "Router" && p.get("results").is_some())
        .expect("completion transfer payload");
    assert_eq!(
        completion["results"]["step_results"].as_array().unwrap().len(),
        3
    );

    let last = outcome.messages.last().unwrap();
    assert_eq!(last.agent_name.as_deref(), Some("Router"));
    assert_eq!(last.response_type, Some(ResponseType::External));
}

#[tokio::test]
async fn test_pipeline_step_failure_unwinds_to_caller() {
    let workflow = Workflow::new("Router")
        .with_agent(AgentConfig::new("Router", "Route.").with_connected_agents(["intake"]))
        .with_agent(
            AgentConfig::new("Extract", "Extract.").with_visibility(Visibility::Internal),
        )
        .with_agent(AgentConfig::new("Enrich", "Enrich.").with_visibility(Visibility::Internal))
        .with_pipeline(PipelineConfig {
            name: "intake".to_string(),
            agents: vec!["Extract".to_string(), "Enrich".to_string()],
        });

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("intake"),
        MockOutput::error("model exploded"),
        MockOutput::text("The intake pipeline failed, but I can help directly."),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator.run(&[Message::user("process")]).await.unwrap();

    let unwind = outcome
        .messages
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter_map(|m| serde_json::from_str::<serde_json::Value>(&m.content).ok())
        .find(|p| p["assistant"] == "Router" && p["results"].get("error").is_some())
        .expect("error unwind payload");
    assert!(unwind["results"]["error"]
        .as_str()
        .unwrap()
        .contains("model exploded"));

    let last = outcome.messages.last().unwrap();
    assert_eq!(last.agent_name.as_deref(), Some("Router"));
    assert_eq!(last.response_type, Some(ResponseType::External));
}

// =============================================================================
// Turn-level guarantees
// =============================================================================

#[tokio::test]
async fn test_emitted_sequence_matches_outcome_and_ends_with_usage() {
    let workflow = Workflow::new("Support").with_agent(AgentConfig::new("Support", "Help."));
    let runtime =
        MockAgentRuntime::scripted(vec![MockOutput::text("Answer.").with_usage(9, 6, 3)]);
    let emitter = InMemoryEmitter::new();
    let orchestrator = TurnOrchestrator::new(
        workflow,
        OrchestratorConfig::default(),
        runtime,
        MockToolBinding::new(),
        emitter.clone(),
    );

    let outcome = orchestrator.run(&[Message::user("hi")]).await.unwrap();

    let emitted = emitter.messages().await;
    assert_eq!(emitted.len(), outcome.messages.len());
    assert_eq!(
        emitted.last().map(|m| m.id),
        outcome.messages.last().map(|m| m.id)
    );

    let events = emitter.events().await;
    assert!(matches!(events.last(), Some(TurnEvent::Usage(_))));
    assert_eq!(emitter.usage().await, Some(outcome.usage));
}

#[tokio::test]
async fn test_unknown_start_agent_is_fatal() {
    let workflow = Workflow::new("Missing");
    let orchestrator = orchestrator(workflow, MockAgentRuntime::new());

    let err = orchestrator
        .run(&[Message::user("hi")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown agent"));
}

#[tokio::test]
async fn test_usage_accumulates_across_agent_runs() {
    let workflow = Workflow::new("Front")
        .with_agent(AgentConfig::new("Front", "Route.").with_connected_agents(["Worker"]))
        .with_agent(
            AgentConfig::new("Worker", "Work.")
                .with_visibility(Visibility::Internal)
                .with_control_type(ControlType::RelinquishToParent),
        );

    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("Worker").with_usage(10, 8, 2),
        MockOutput::text("worked").with_usage(7, 4, 3),
        MockOutput::text("Done.").with_usage(5, 4, 1),
    ]);
    let orchestrator = orchestrator(workflow, runtime);

    let outcome = orchestrator.run(&[Message::user("go")]).await.unwrap();
    assert_eq!(
        outcome.usage,
        UsageSummary {
            total_tokens: 22,
            prompt_tokens: 16,
            completion_tokens: 6
        }
    );
}
