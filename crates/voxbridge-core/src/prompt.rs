//! Prompt rendering: structured turns in, engine-ready text out.

use crate::history::{Turn, TurnRole};

/// Renders a conversation plus the pending user utterance into the exact
/// string fed to the engine. Implementations must be deterministic and free
/// of side effects.
pub trait PromptRenderer: Send + Sync {
    fn render(&self, turns: &[Turn], pending_user_text: &str) -> String;
}

/// ChatML-style renderer matching the instruct template of the Llama/Qwen
/// chat families: each turn framed by `<|im_start|>role` / `<|im_end|>`,
/// terminated with an open assistant header as the generation prompt.
#[derive(Debug, Clone, Default)]
pub struct ChatMarkupRenderer;

impl ChatMarkupRenderer {
    fn push_turn(out: &mut String, role: TurnRole, content: &str) {
        out.push_str("<|im_start|>");
        out.push_str(role.as_str());
        out.push('\n');
        out.push_str(content);
        out.push_str("<|im_end|>\n");
    }
}

impl PromptRenderer for ChatMarkupRenderer {
    fn render(&self, turns: &[Turn], pending_user_text: &str) -> String {
        let mut out = String::new();
        for turn in turns {
            Self::push_turn(&mut out, turn.role, &turn.content);
        }
        Self::push_turn(&mut out, TurnRole::User, pending_user_text);
        out.push_str("<|im_start|>assistant\n");
        out
    }
}
