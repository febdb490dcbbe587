//! Per-connection session loop.
//!
//! The transport layer feeds inbound events here one at a time, in arrival
//! order. That strict ordering, together with the supervisor's
//! await-until-settled interrupt, is what keeps history updates race-free.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::aggregator::UtteranceAggregator;
use crate::config::RelayConfig;
use crate::engine::TextGenerator;
use crate::events::{InboundEvent, OutboundEvent};
use crate::history::ConversationHistory;
use crate::prompt::PromptRenderer;
use crate::supervisor::TurnSupervisor;

pub struct ChatSession {
    aggregator: UtteranceAggregator,
    supervisor: TurnSupervisor,
    history: Arc<Mutex<ConversationHistory>>,
}

impl ChatSession {
    pub fn new(
        config: &RelayConfig,
        engine: Arc<dyn TextGenerator>,
        renderer: Arc<dyn PromptRenderer>,
        out_tx: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Self {
        let history = Arc::new(Mutex::new(ConversationHistory::new(
            config.system_prompt.clone(),
        )));
        let supervisor =
            TurnSupervisor::new(engine, renderer, Arc::clone(&history), out_tx, config);
        Self {
            aggregator: UtteranceAggregator::new(),
            supervisor,
            history,
        }
    }

    /// Dispatch one inbound event. Must be called serially; the transport's
    /// dispatch loop processes one event at a time.
    pub async fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Prompt { voice_prompt, last } => {
                if let Some(utterance) = self.aggregator.accept(voice_prompt, last) {
                    self.supervisor.start(utterance).await;
                }
            }
            InboundEvent::Interrupt { .. } => {
                self.aggregator.discard();
                self.supervisor.interrupt().await;
            }
            InboundEvent::Setup { call_sid } => {
                info!(call_sid = call_sid.as_deref().unwrap_or("-"), "relay session setup");
            }
            InboundEvent::Unknown => {
                debug!("ignoring unrecognized inbound event");
            }
        }
    }

    /// Tear down on transport close: cancel and settle any in-flight turn.
    pub async fn shutdown(&mut self) {
        self.supervisor.interrupt().await;
    }

    pub fn history(&self) -> Arc<Mutex<ConversationHistory>> {
        Arc::clone(&self.history)
    }
}
