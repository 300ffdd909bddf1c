// Streaming consumption of a turn
//
// The orchestrator pushes TurnEvents through its emitter as they are
// produced. ChannelEmitter bridges that to a tokio mpsc channel so
// consumers can pull an ordered async stream; turn_stream wires a full run
// to a channel and returns the receiving end.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use crate::error::{OrchestratorError, Result};
use crate::events::TurnEvent;
use crate::message::Message;
use crate::traits::{AgentRuntime, ToolBinding, TurnEmitter};
use crate::turn::TurnOrchestrator;

/// Emitter that forwards events into a tokio mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::Sender<TurnEvent>,
}

impl ChannelEmitter {
    /// Create an emitter/receiver pair with the given channel capacity
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TurnEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TurnEmitter for ChannelEmitter {
    async fn emit(&self, event: TurnEvent) -> Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| OrchestratorError::emission("turn event receiver dropped"))
    }
}

/// Run a turn in the background and return its event stream.
///
/// The orchestrator must be constructed with a ChannelEmitter whose
/// receiver is passed here. Dropping the stream stops progress at the next
/// suspension point; there is no mid-turn rollback.
pub fn turn_stream<R, T>(
    orchestrator: Arc<TurnOrchestrator<R, T, ChannelEmitter>>,
    history: Vec<Message>,
    receiver: mpsc::Receiver<TurnEvent>,
) -> ReceiverStream<TurnEvent>
where
    R: AgentRuntime + 'static,
    T: ToolBinding + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = orchestrator.run(&history).await {
            error!(error = %err, "turn failed");
        }
    });
    ReceiverStream::new(receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UsageSummary;
    use crate::memory::{MockAgentRuntime, MockOutput, MockToolBinding};
    use crate::turn::OrchestratorConfig;
    use crate::workflow::{AgentConfig, Workflow};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_turn_stream_yields_messages_then_usage() {
        let workflow =
            Workflow::new("Solo").with_agent(AgentConfig::new("Solo", "Answer directly."));
        let runtime =
            MockAgentRuntime::scripted(vec![MockOutput::text("All done.").with_usage(12, 8, 4)]);
        let (emitter, receiver) = ChannelEmitter::new(32);
        let orchestrator = Arc::new(TurnOrchestrator::new(
            workflow,
            OrchestratorConfig::default(),
            runtime,
            MockToolBinding::new(),
            emitter,
        ));

        let history = vec![Message::user("hello")];
        let events: Vec<TurnEvent> = turn_stream(orchestrator, history, receiver).collect().await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            TurnEvent::Message(m) => assert_eq!(m.content, "All done."),
            other => panic!("expected message, got {other:?}"),
        }
        match &events[1] {
            TurnEvent::Usage(u) => {
                assert_eq!(
                    u,
                    &UsageSummary {
                        total_tokens: 12,
                        prompt_tokens: 8,
                        completion_tokens: 4
                    }
                );
            }
            other => panic!("expected usage, got {other:?}"),
        }
    }
}
