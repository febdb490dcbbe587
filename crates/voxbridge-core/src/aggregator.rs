//! Assembles speech-to-text fragments into complete utterances.
//!
//! ConversationRelay delivers each user utterance as a run of `prompt`
//! events; the final one carries `last: true`. Fragments buffer here until
//! that marker arrives, or until an interruption throws them away.

#[derive(Debug, Default)]
pub struct UtteranceAggregator {
    fragments: Vec<String>,
}

impl UtteranceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `fragment`. Returns the completed utterance (fragments joined
    /// with single spaces, in arrival order) when `last` is set, leaving the
    /// buffer empty.
    pub fn accept(&mut self, fragment: String, last: bool) -> Option<String> {
        self.fragments.push(fragment);
        if !last {
            return None;
        }
        let utterance = self.fragments.join(" ");
        self.fragments.clear();
        Some(utterance)
    }

    /// Drop everything buffered so far without yielding an utterance. Used
    /// when the user interrupts mid-utterance.
    pub fn discard(&mut self) {
        self.fragments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
