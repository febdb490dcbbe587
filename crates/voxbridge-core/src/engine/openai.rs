//! Streaming client for OpenAI-compatible completion servers (vLLM,
//! llama.cpp server, and friends).
//!
//! `submit` opens a `stream: true` request against `/v1/completions` and
//! spawns a reader task that folds SSE chunks into cumulative-text
//! snapshots. The task handle is tracked by request id so `abort` can tear
//! the stream down; compatible servers cancel generation when the client
//! side of the stream goes away.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{GenerationRequest, TextGenerator};
use crate::errors::{RelayError, Result};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 32;

pub struct OpenAiGenerator {
    client: reqwest::Client,
    completions_url: String,
    model: String,
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("voxbridge/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| RelayError::Engine(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            completions_url: format!("{}/v1/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn submit(&self, request: GenerationRequest) -> Result<mpsc::Receiver<String>> {
        let body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "max_tokens": request.max_output_tokens,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.completions_url)
            .json(&body)
            .send()
            .await
            .map_err(|err| RelayError::Engine(format!("Completion request failed: {err}")))?
            .error_for_status()
            .map_err(|err| RelayError::Engine(format!("Completion request rejected: {err}")))?;

        let (snapshot_tx, snapshot_rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let request_id = request.id.clone();
        self.in_flight
            .lock()
            .await
            .insert(request_id.clone(), cancel.clone());

        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut pending = String::new();
            let mut cumulative = String::new();

            'stream: loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = stream.next() => chunk,
                };
                let chunk = match chunk {
                    Some(Ok(chunk)) => chunk,
                    Some(Err(err)) => {
                        warn!(request_id = %request_id, "completion stream failed: {err}");
                        break;
                    }
                    None => break,
                };
                pending.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line) = take_line(&mut pending) {
                    match parse_sse_line(&line) {
                        SseLine::Done => break 'stream,
                        SseLine::Chunk(text) => {
                            cumulative.push_str(&text);
                            if snapshot_tx.send(cumulative.clone()).await.is_err() {
                                // Consumer went away; stop reading.
                                break 'stream;
                            }
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            // Dropping the response stream disconnects, which compatible
            // servers treat as a generation abort.
            in_flight.lock().await.remove(&request_id);
        });

        Ok(snapshot_rx)
    }

    async fn abort(&self, request_id: &str) -> Result<()> {
        match self.in_flight.lock().await.remove(request_id) {
            Some(cancel) => cancel.cancel(),
            None => debug!(request_id, "abort for unknown or finished request"),
        }
        Ok(())
    }
}

enum SseLine {
    /// `data: [DONE]` — end of stream.
    Done,
    /// A completion chunk carrying new text.
    Chunk(String),
    /// Comment, blank line, or a chunk without text.
    Skip,
}

fn take_line(pending: &mut String) -> Option<String> {
    let pos = pending.find('\n')?;
    let line = pending[..pos].trim_end_matches('\r').to_string();
    pending.drain(..=pos);
    Some(line)
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return SseLine::Skip;
    };
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match chunk_text(data) {
        Some(text) if !text.is_empty() => SseLine::Chunk(text),
        _ => SseLine::Skip,
    }
}

/// Extract `choices[0].text` from one streamed completion payload.
fn chunk_text(data: &str) -> Option<String> {
    let payload: serde_json::Value = serde_json::from_str(data).ok()?;
    payload
        .get("choices")?
        .get(0)?
        .get("text")?
        .as_str()
        .map(str::to_string)
}
