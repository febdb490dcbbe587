//! Generation task supervision.
//!
//! At most one generation task runs per connection. The task streams deltas
//! to the outbound channel and commits the finished (or interrupted) exchange
//! to history in a finalization step that runs on every exit path, so the
//! terminal event is never skipped and history always matches what the
//! caller was sent.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::engine::{GenerationRequest, TextGenerator};
use crate::events::OutboundEvent;
use crate::history::ConversationHistory;
use crate::prompt::PromptRenderer;

struct ActiveTurn {
    request_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct TurnSupervisor {
    engine: Arc<dyn TextGenerator>,
    renderer: Arc<dyn PromptRenderer>,
    history: Arc<Mutex<ConversationHistory>>,
    out_tx: mpsc::UnboundedSender<OutboundEvent>,
    max_context_tokens: usize,
    max_output_tokens: usize,
    active: Option<ActiveTurn>,
}

impl TurnSupervisor {
    pub fn new(
        engine: Arc<dyn TextGenerator>,
        renderer: Arc<dyn PromptRenderer>,
        history: Arc<Mutex<ConversationHistory>>,
        out_tx: mpsc::UnboundedSender<OutboundEvent>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            engine,
            renderer,
            history,
            out_tx,
            max_context_tokens: config.max_context_tokens,
            max_output_tokens: config.max_output_tokens,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Launch a generation task for a completed utterance. Any previous turn
    /// is settled first, so its history commit lands before the new prompt
    /// is rendered.
    pub async fn start(&mut self, utterance: String) {
        self.interrupt().await;

        let request_id = Uuid::new_v4().simple().to_string();
        let cancel = CancellationToken::new();
        debug!(request_id = %request_id, "starting generation turn");

        let task = tokio::spawn(run_generation(
            Arc::clone(&self.engine),
            Arc::clone(&self.renderer),
            Arc::clone(&self.history),
            self.out_tx.clone(),
            request_id.clone(),
            utterance,
            self.max_context_tokens,
            self.max_output_tokens,
            cancel.clone(),
        ));

        self.active = Some(ActiveTurn {
            request_id,
            cancel,
            task,
        });
    }

    /// Cancel the active turn, if any, and wait for it to settle. Returns
    /// only after the task's finalization has committed to history and sent
    /// the terminal event, so the caller can safely process the next
    /// utterance. No-op when idle.
    pub async fn interrupt(&mut self) {
        let Some(turn) = self.active.take() else {
            return;
        };
        turn.cancel.cancel();
        if let Err(err) = turn.task.await {
            warn!(request_id = %turn.request_id, "generation task panicked: {err}");
        }
    }
}

/// One generation turn, from prompt render to finalization.
#[allow(clippy::too_many_arguments)]
async fn run_generation(
    engine: Arc<dyn TextGenerator>,
    renderer: Arc<dyn PromptRenderer>,
    history: Arc<Mutex<ConversationHistory>>,
    out_tx: mpsc::UnboundedSender<OutboundEvent>,
    request_id: String,
    utterance: String,
    max_context_tokens: usize,
    max_output_tokens: usize,
    cancel: CancellationToken,
) {
    let prompt = {
        let history = history.lock().await;
        renderer.render(&history.context_window(max_context_tokens), &utterance)
    };

    let mut replies: Vec<String> = Vec::new();
    let mut cursor = 0usize;

    let submitted = tokio::select! {
        _ = cancel.cancelled() => None,
        result = engine.submit(GenerationRequest {
            id: request_id.clone(),
            prompt,
            max_output_tokens,
        }) => Some(result),
    };

    match submitted {
        Some(Ok(mut snapshots)) => loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Release engine resources promptly; the turn is being
                    // torn down either way.
                    if let Err(err) = engine.abort(&request_id).await {
                        warn!(request_id = %request_id, "engine abort failed: {err}");
                    }
                    break;
                }
                snapshot = snapshots.recv() => {
                    let Some(snapshot) = snapshot else { break };
                    // Snapshots are cumulative; anything at or below the
                    // cursor carries no new text.
                    let Some(delta) = snapshot.get(cursor..).filter(|d| !d.is_empty()) else {
                        continue;
                    };
                    cursor = snapshot.len();
                    replies.push(delta.to_string());
                    let _ = out_tx.send(OutboundEvent::delta(delta));
                }
            }
        },
        Some(Err(err)) => {
            warn!(request_id = %request_id, "generation submit failed: {err}");
        }
        None => {
            debug!(request_id = %request_id, "turn cancelled before submission");
        }
    }

    // Finalization: runs exactly once on every exit path. The exchange is
    // appended under a single lock hold, then the terminal event closes the
    // client-side stream.
    let reply = replies.concat();
    {
        let mut history = history.lock().await;
        history.push_exchange(utterance, reply);
    }
    let _ = out_tx.send(OutboundEvent::terminal());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ChatMarkupRenderer;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct Script {
        snapshots: Vec<&'static str>,
        hold_open: bool,
    }

    /// Engine that replays scripted cumulative snapshots, one script per
    /// submitted request, and records aborts.
    struct ScriptedEngine {
        scripts: StdMutex<VecDeque<Script>>,
        aborts: StdMutex<Vec<String>>,
        release: CancellationToken,
    }

    impl ScriptedEngine {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: StdMutex::new(scripts.into()),
                aborts: StdMutex::new(Vec::new()),
                release: CancellationToken::new(),
            })
        }

        fn aborted_ids(&self) -> Vec<String> {
            self.aborts.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedEngine {
        async fn submit(
            &self,
            _request: GenerationRequest,
        ) -> crate::errors::Result<mpsc::Receiver<String>> {
            let script = self
                .scripts
                .lock()
                .expect("lock")
                .pop_front()
                .expect("unexpected submit");
            let (tx, rx) = mpsc::channel(8);
            let release = self.release.clone();
            tokio::spawn(async move {
                for snapshot in script.snapshots {
                    if tx.send(snapshot.to_string()).await.is_err() {
                        return;
                    }
                }
                if script.hold_open {
                    release.cancelled().await;
                }
            });
            Ok(rx)
        }

        async fn abort(&self, request_id: &str) -> crate::errors::Result<()> {
            self.aborts
                .lock()
                .expect("lock")
                .push(request_id.to_string());
            self.release.cancel();
            Ok(())
        }
    }

    /// Engine whose submission always fails.
    struct FailingEngine;

    #[async_trait]
    impl TextGenerator for FailingEngine {
        async fn submit(
            &self,
            _request: GenerationRequest,
        ) -> crate::errors::Result<mpsc::Receiver<String>> {
            Err(crate::errors::RelayError::Engine("backend down".to_string()))
        }

        async fn abort(&self, _request_id: &str) -> crate::errors::Result<()> {
            Ok(())
        }
    }

    fn supervisor_with<E: TextGenerator + 'static>(
        engine: Arc<E>,
    ) -> (
        TurnSupervisor,
        Arc<Mutex<ConversationHistory>>,
        mpsc::UnboundedReceiver<OutboundEvent>,
    ) {
        let history = Arc::new(Mutex::new(ConversationHistory::new("sys")));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let supervisor = TurnSupervisor::new(
            engine,
            Arc::new(ChatMarkupRenderer),
            Arc::clone(&history),
            out_tx,
            &RelayConfig::default(),
        );
        (supervisor, history, out_rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<OutboundEvent>) -> OutboundEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for outbound event")
            .expect("outbound channel closed")
    }

    async fn drain_until_terminal(
        rx: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    ) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await;
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }
    }

    #[tokio::test]
    async fn completed_turn_streams_deltas_and_commits_history() {
        let engine = ScriptedEngine::new(vec![Script {
            snapshots: vec!["Hi", "Hi!", "Hi! How are you?"],
            hold_open: false,
        }]);
        let (mut supervisor, history, mut out_rx) = supervisor_with(engine);

        supervisor.start("Hello there".to_string()).await;
        let events = drain_until_terminal(&mut out_rx).await;

        assert_eq!(
            events,
            vec![
                OutboundEvent::delta("Hi"),
                OutboundEvent::delta("!"),
                OutboundEvent::delta(" How are you?"),
                OutboundEvent::terminal(),
            ]
        );

        let history = history.lock().await;
        assert_eq!(history.exchange_count(), 1);
        let turns = history.turns();
        assert_eq!(turns[1].content, "Hello there");
        assert_eq!(turns[2].content, "Hi! How are you?");
    }

    #[tokio::test]
    async fn interrupt_aborts_engine_and_keeps_partial_reply() {
        let engine = ScriptedEngine::new(vec![Script {
            snapshots: vec!["Hi"],
            hold_open: true,
        }]);
        let (mut supervisor, history, mut out_rx) = supervisor_with(Arc::clone(&engine));

        supervisor.start("Hello there".to_string()).await;
        assert_eq!(next_event(&mut out_rx).await, OutboundEvent::delta("Hi"));

        supervisor.interrupt().await;
        assert!(!supervisor.is_active());
        assert_eq!(engine.aborted_ids().len(), 1);

        // The terminal event was sent before interrupt() returned.
        let terminal = out_rx.try_recv().expect("terminal should already be queued");
        assert!(terminal.is_terminal());

        let history = history.lock().await;
        assert_eq!(history.exchange_count(), 1);
        assert_eq!(history.turns()[1].content, "Hello there");
        assert_eq!(history.turns()[2].content, "Hi");
    }

    #[tokio::test]
    async fn interrupt_when_idle_is_a_no_op() {
        let engine = ScriptedEngine::new(Vec::new());
        let (mut supervisor, history, mut out_rx) = supervisor_with(Arc::clone(&engine));

        supervisor.interrupt().await;
        supervisor.interrupt().await;

        assert!(out_rx.try_recv().is_err());
        assert!(engine.aborted_ids().is_empty());
        assert_eq!(history.lock().await.turns().len(), 1);
    }

    #[tokio::test]
    async fn interrupted_then_restarted_turns_never_interleave() {
        let engine = ScriptedEngine::new(vec![
            Script {
                snapshots: vec!["A partial"],
                hold_open: true,
            },
            Script {
                snapshots: vec!["B reply"],
                hold_open: false,
            },
        ]);
        let (mut supervisor, history, mut out_rx) = supervisor_with(Arc::clone(&engine));

        supervisor.start("question A".to_string()).await;
        assert_eq!(
            next_event(&mut out_rx).await,
            OutboundEvent::delta("A partial")
        );
        supervisor.interrupt().await;

        supervisor.start("question B".to_string()).await;
        // Terminal for A, then B's stream.
        let terminal_a = next_event(&mut out_rx).await;
        assert!(terminal_a.is_terminal());
        let events_b = drain_until_terminal(&mut out_rx).await;
        assert_eq!(
            events_b,
            vec![OutboundEvent::delta("B reply"), OutboundEvent::terminal()]
        );

        let history = history.lock().await;
        assert_eq!(history.exchange_count(), 2);
        let turns = history.turns();
        assert_eq!(turns[1].content, "question A");
        assert_eq!(turns[2].content, "A partial");
        assert_eq!(turns[3].content, "question B");
        assert_eq!(turns[4].content, "B reply");
    }

    #[tokio::test]
    async fn stalled_snapshots_produce_no_empty_deltas() {
        let engine = ScriptedEngine::new(vec![Script {
            snapshots: vec!["Hi", "Hi", "Hi there"],
            hold_open: false,
        }]);
        let (mut supervisor, _history, mut out_rx) = supervisor_with(engine);

        supervisor.start("hey".to_string()).await;
        let events = drain_until_terminal(&mut out_rx).await;

        assert_eq!(
            events,
            vec![
                OutboundEvent::delta("Hi"),
                OutboundEvent::delta(" there"),
                OutboundEvent::terminal(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_submission_still_finalizes() {
        let (mut supervisor, history, mut out_rx) = supervisor_with(Arc::new(FailingEngine));

        supervisor.start("anyone there?".to_string()).await;
        let events = drain_until_terminal(&mut out_rx).await;

        assert_eq!(events, vec![OutboundEvent::terminal()]);
        let history = history.lock().await;
        assert_eq!(history.exchange_count(), 1);
        assert_eq!(history.turns()[1].content, "anyone there?");
        assert_eq!(history.turns()[2].content, "");
    }
}
