//! Session core for voxbridge: bridging Twilio ConversationRelay media
//! streams to a streaming text-generation backend, with mid-generation
//! interruption.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod history;
pub mod prompt;
pub mod session;
pub mod supervisor;

pub use aggregator::UtteranceAggregator;
pub use config::RelayConfig;
pub use engine::{GenerationRequest, OpenAiGenerator, TextGenerator};
pub use errors::{RelayError, Result};
pub use events::{InboundEvent, OutboundEvent};
pub use history::{ConversationHistory, Turn, TurnRole};
pub use prompt::{ChatMarkupRenderer, PromptRenderer};
pub use session::ChatSession;
pub use supervisor::TurnSupervisor;
