//! Conversation history for one relay connection.
//!
//! The history always starts with exactly one system turn, and everything
//! after it is completed user/assistant pairs. A pair is appended in a single
//! call so no render ever observes a user turn without its reply.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Rough prompt-size estimate used for context trimming. Four bytes per
/// token is the usual heuristic for English chat text.
fn estimated_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(TurnRole::System, system_prompt)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of completed user/assistant pairs.
    pub fn exchange_count(&self) -> usize {
        (self.turns.len() - 1) / 2
    }

    /// Append one completed exchange. Both turns land together, keeping the
    /// strict user/assistant alternation intact.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::new(TurnRole::User, user));
        self.turns.push(Turn::new(TurnRole::Assistant, assistant));
    }

    /// The turns to render for the next prompt: the system turn plus the
    /// newest exchanges whose token estimate fits `max_context_tokens`.
    /// Exchanges are dropped oldest-first and only whole pairs are dropped.
    pub fn context_window(&self, max_context_tokens: usize) -> Vec<Turn> {
        let system = &self.turns[0];
        let mut budget = max_context_tokens.saturating_sub(estimated_tokens(&system.content));

        let mut kept_pairs: Vec<&[Turn]> = Vec::new();
        for pair in self.turns[1..].chunks(2).rev() {
            let cost: usize = pair.iter().map(|t| estimated_tokens(&t.content)).sum();
            if cost > budget {
                break;
            }
            budget -= cost;
            kept_pairs.push(pair);
        }

        let mut out = Vec::with_capacity(1 + kept_pairs.len() * 2);
        out.push(system.clone());
        for pair in kept_pairs.into_iter().rev() {
            out.extend_from_slice(pair);
        }
        out
    }
}
