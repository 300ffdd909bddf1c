//! Simple Workflow Example - two agents and a handoff
//!
//! Runs a two-agent workflow with scripted mock outputs: a user-facing
//! triage agent hands off to an internal specialist, whose output returns
//! automatically to the parent.
//!
//! Run with: cargo run -p weft-core --example simple_workflow

use weft_core::memory::{InMemoryEmitter, MockAgentRuntime, MockOutput, MockToolBinding};
use weft_core::{
    AgentConfig, ControlType, Message, OrchestratorConfig, TurnOrchestrator, Visibility, Workflow,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Simple Workflow (weft-core) ===\n");

    // 1. Define the workflow: Triage routes, Specialist digs in internally
    let workflow = Workflow::new("Triage")
        .with_agent(
            AgentConfig::new("Triage", "Classify the request and route it.")
                .with_connected_agents(["Specialist"]),
        )
        .with_agent(
            AgentConfig::new("Specialist", "Investigate in depth.")
                .with_visibility(Visibility::Internal)
                .with_control_type(ControlType::RelinquishToParent),
        );

    // 2. Script the runtime (swap in weft-openai's OpenAiAgentRuntime for
    //    live model calls)
    let runtime = MockAgentRuntime::scripted(vec![
        MockOutput::handoff("Specialist"),
        MockOutput::text("account flagged: two failed payments").with_usage(18, 12, 6),
        MockOutput::text("Your account has two failed payments; I can retry them for you.")
            .with_usage(25, 18, 7),
    ]);

    // 3. Run one turn
    let orchestrator = TurnOrchestrator::new(
        workflow,
        OrchestratorConfig::default(),
        runtime,
        MockToolBinding::new(),
        InMemoryEmitter::new(),
    );

    let history = vec![Message::user("Why was my card declined?")];
    let outcome = orchestrator.run(&history).await?;

    // 4. Print the transcript
    for message in &outcome.messages {
        let who = message.agent_name.as_deref().unwrap_or("-");
        println!("[{} / {}] {}", message.role, who, message.content);
    }
    println!(
        "\n(tokens: {} total, {} prompt, {} completion)",
        outcome.usage.total_tokens, outcome.usage.prompt_tokens, outcome.usage.completion_tokens
    );

    Ok(())
}
