//! Environment-driven service configuration.

use tracing::warn;
use voxbridge_core::RelayConfig;

const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct";

const DEFAULT_CHAT_GREETING: &str = "Hi! I'm your voice assistant. Just start chatting!";
const DEFAULT_TRANSLATE_GREETING: &str = "Hi! I will translate English into Spanish for you!";
const DEFAULT_TRANSLATE_LANGUAGE: &str = "es-ES";

const DEFAULT_TRANSLATE_PROMPT: &str = "You are a translation machine. Your sole function is to translate the input text from English to Spanish.
Do not add, omit, or alter any information.
Do not provide explanations, opinions, or any additional text beyond the direct translation.
Translate the entire input text from their turn.
Example interaction:
User: Very well. Would you like to have a coffee with me?
Assistant: Muy bien. \u{bf}Quieres tomar un caf\u{e9} conmigo?";

/// Everything the server needs beyond the bind address. Read once at
/// startup; per-connection settings are derived from here.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Externally reachable base URL, used to build the websocket URLs in
    /// the call-setup TwiML.
    pub public_url: String,
    /// OpenAI-compatible completion endpoint base URL.
    pub engine_url: String,
    /// Model id passed through to the engine.
    pub model: String,
    /// Greeting spoken when a chat call connects.
    pub chat_greeting: String,
    /// Greeting spoken when a translation call connects.
    pub translate_greeting: String,
    /// Language tag stamped on translation output events.
    pub translate_language: String,
    /// System prompt for the translation variant's fixed two-turn prompt.
    pub translate_prompt: String,
    /// Per-conversation generation settings for the chat variant.
    pub relay: RelayConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let mut relay = RelayConfig::default();
        if let Some(prompt) = env_string("VOXBRIDGE_SYSTEM_PROMPT") {
            relay.system_prompt = prompt;
        }
        if let Some(value) = env_usize("VOXBRIDGE_MAX_CONTEXT_TOKENS") {
            relay.max_context_tokens = value;
        }
        if let Some(value) = env_usize("VOXBRIDGE_MAX_OUTPUT_TOKENS") {
            relay.max_output_tokens = value;
        }

        Self {
            public_url: env_string("VOXBRIDGE_PUBLIC_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
            engine_url: env_string("VOXBRIDGE_ENGINE_URL")
                .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string()),
            model: env_string("VOXBRIDGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            chat_greeting: env_string("VOXBRIDGE_GREETING")
                .unwrap_or_else(|| DEFAULT_CHAT_GREETING.to_string()),
            translate_greeting: env_string("VOXBRIDGE_TRANSLATE_GREETING")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_GREETING.to_string()),
            translate_language: env_string("VOXBRIDGE_TRANSLATE_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_LANGUAGE.to_string()),
            translate_prompt: env_string("VOXBRIDGE_TRANSLATE_PROMPT")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_PROMPT.to_string()),
            relay,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Some(parsed),
        _ => {
            warn!("Invalid {}='{}', using default", name, raw);
            None
        }
    }
}
