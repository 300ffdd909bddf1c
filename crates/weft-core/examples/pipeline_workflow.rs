//! Pipeline Workflow Example - a three-step sub-flow
//!
//! A router agent kicks off a declared pipeline (extract -> enrich ->
//! summarize); each step's output accumulates, and the aggregated results
//! return to the router when the pipeline completes.
//!
//! Run with: cargo run -p weft-core --example pipeline_workflow

use weft_core::memory::{InMemoryEmitter, MockAgentRuntime, MockOutput, MockToolBinding};
use weft_core::{
    AgentConfig, Message, OrchestratorConfig, PipelineConfig, TurnOrchestrator, Visibility,
    Workflow,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Pipeline Workflow (weft-core) ===\n");

    let workflow = Workflow::new("Router")
        .with_agent(
            AgentConfig::new("Router", "Route intake requests.").with_connected_agents(["intake"]),
        )
        .with_agent(AgentConfig::new("Extract", "Extract fields.").with_visibility(Visibility::Internal))
        .with_agent(AgentConfig::new("Enrich", "Enrich records.").with_visibility(Visibility::Internal))
        .with_agent(AgentConfig::new("Summarize", "Summarize.").with_visibility(Visibility::Internal))
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
        MockOutput::text("extracted 4 fields"),
        MockOutput::text("enriched with CRM data"),
        MockOutput::text("one-paragraph summary ready"),
        MockOutput::text("Intake processed; summary is ready for review."),
    ]);

    let orchestrator = TurnOrchestrator::new(
        workflow,
        OrchestratorConfig::default(),
        runtime,
        MockToolBinding::new(),
        InMemoryEmitter::new(),
    );

    let history = vec![Message::user("Process this intake form, please.")];
    let outcome = orchestrator.run(&history).await?;

    for message in &outcome.messages {
        let who = message.agent_name.as_deref().unwrap_or("-");
        println!("[{} / {}] {}", message.role, who, message.content);
    }

    Ok(())
}
