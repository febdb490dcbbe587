//! ConversationRelay wire events.
//!
//! Inbound messages arrive as JSON text frames tagged by `type`. Anything
//! with an unrecognized tag deserializes into [`InboundEvent::Unknown`] and
//! is ignored by the session loop; frames that fail to deserialize at all
//! are dropped at the read loop.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEvent {
    /// One speech-to-text fragment; `last` marks the end of the utterance.
    Prompt {
        #[serde(rename = "voicePrompt")]
        voice_prompt: String,
        #[serde(default)]
        last: bool,
    },
    /// The user started speaking over the assistant. Carries the portion of
    /// the reply that was played back before the barge-in.
    Interrupt {
        #[serde(rename = "utteranceUntilInterrupt", default)]
        utterance_until_interrupt: Option<String>,
    },
    /// Sent once by ConversationRelay when the media stream opens.
    Setup {
        #[serde(rename = "callSid", default)]
        call_sid: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// A streamed reply update. `token` holds the delta since the previous
    /// event and is empty only on the terminal event (`last: true`), which
    /// is sent exactly once per generation.
    Text {
        token: String,
        last: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
}

impl OutboundEvent {
    pub fn delta(token: impl Into<String>) -> Self {
        Self::Text {
            token: token.into(),
            last: false,
            lang: None,
        }
    }

    pub fn terminal() -> Self {
        Self::Text {
            token: String::new(),
            last: true,
            lang: None,
        }
    }

    /// Tag the event with a target-language hint (translation sessions).
    pub fn with_lang(self, lang: impl Into<String>) -> Self {
        match self {
            Self::Text { token, last, .. } => Self::Text {
                token,
                last,
                lang: Some(lang.into()),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Text { last, .. } => *last,
        }
    }
}
