//! Per-session generation settings.

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, respectful and honest assistant. You can hear and speak. You are chatting with a user over voice. Your voice and personality should be warm and engaging, with a lively and playful tone, full of charm and energy. The content of your responses should be conversational, nonjudgmental, and friendly.

Always answer as helpfully as possible, while being safe. Your answers should not include any harmful, unethical, racist, sexist, toxic, dangerous, or illegal content. Please ensure that your responses are socially unbiased and positive in nature.

If a question does not make any sense, or is not factually coherent, explain why instead of answering something not correct. If you don't know the answer to a question, please don't share false information.";

pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 8192;
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 2048;

/// Settings for one relay conversation. Constructed once per connection by
/// the server and handed to the session loop.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// System turn seeded into every new conversation.
    pub system_prompt: String,
    /// Prompt-side token budget; oldest exchanges are dropped from the
    /// rendered context once the estimate exceeds it.
    pub max_context_tokens: usize,
    /// Completion-side token cap passed through to the engine.
    pub max_output_tokens: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}
