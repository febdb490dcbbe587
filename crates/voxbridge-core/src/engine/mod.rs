//! Generation engine adapter interface.

pub mod openai;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;

pub use openai::OpenAiGenerator;

/// One generation request handed to the engine.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Opaque unique id, used to abort the request later.
    pub id: String,
    /// Fully rendered prompt text.
    pub prompt: String,
    /// Completion-side token cap.
    pub max_output_tokens: usize,
}

/// A streaming text-generation backend.
///
/// `submit` returns a channel of cumulative-text snapshots: each item is the
/// full text generated so far, not the delta. The channel closes when the
/// engine finishes or fails; callers that stop early should `abort` the
/// request so engine resources are released promptly.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn submit(&self, request: GenerationRequest) -> Result<mpsc::Receiver<String>>;

    /// Best-effort, idempotent abort of an in-flight request.
    async fn abort(&self, request_id: &str) -> Result<()>;
}
