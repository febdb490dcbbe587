//! Shared application state.

use std::sync::Arc;

use voxbridge_core::{ChatMarkupRenderer, OpenAiGenerator, PromptRenderer, TextGenerator};

use crate::config::ServiceConfig;

#[derive(Clone)]
pub struct AppState {
    /// Streaming generation backend, shared by every connection.
    pub engine: Arc<dyn TextGenerator>,
    /// Prompt renderer; deterministic, so one instance serves all sessions.
    pub renderer: Arc<dyn PromptRenderer>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let engine = OpenAiGenerator::new(&config.engine_url, config.model.clone())?;
        Ok(Self {
            engine: Arc::new(engine),
            renderer: Arc::new(ChatMarkupRenderer),
            config: Arc::new(config),
        })
    }
}
