//! Conversation transcript with streaming partial updates
//!
//! Streaming transcription replays the whole utterance on every update,
//! so consecutive partials from one speaker replace the tail message
//! instead of appending new ones. Turn boundaries finalize everything.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One utterance in the conversation
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptMessage {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub is_final: bool,
}

/// Ordered log of the conversation so far
#[derive(Debug, Default)]
pub struct TranscriptLog {
    messages: Vec<TranscriptMessage>,
}

impl TranscriptLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a (possibly partial) user utterance.
    pub fn append_user(&mut self, text: &str) {
        self.append(Speaker::User, text);
    }

    /// Record a (possibly partial) assistant utterance.
    pub fn append_assistant(&mut self, text: &str) {
        self.append(Speaker::Assistant, text);
    }

    fn append(&mut self, speaker: Speaker, text: &str) {
        if let Some(tail) = self.messages.last_mut() {
            if tail.speaker == speaker && !tail.is_final {
                tail.text = text.to_string();
                return;
            }
        }
        self.messages.push(TranscriptMessage {
            id: Uuid::new_v4(),
            speaker,
            text: text.to_string(),
            is_final: false,
        });
    }

    /// Mark every message final; the next append starts a new message.
    pub fn finalize_all(&mut self) {
        for message in &mut self.messages {
            message.is_final = true;
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_partials_replace_the_tail() {
        let mut log = TranscriptLog::new();
        log.append_user("what's");
        log.append_user("what's the weather");
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].text, "what's the weather");
        assert!(!log.messages()[0].is_final);
    }

    #[test]
    fn speaker_change_starts_a_new_message() {
        let mut log = TranscriptLog::new();
        log.append_user("hello");
        log.append_assistant("hi there");
        log.append_assistant("hi there, how can I help");
        assert_eq!(log.messages().len(), 2);
        assert_eq!(log.messages()[1].text, "hi there, how can I help");
    }

    #[test]
    fn finalize_then_append_starts_a_new_message() {
        let mut log = TranscriptLog::new();
        log.append_user("first utterance");
        log.finalize_all();
        log.append_user("second utterance");
        assert_eq!(log.messages().len(), 2);
        assert!(log.messages()[0].is_final);
        assert!(!log.messages()[1].is_final);
        assert_ne!(log.messages()[0].id, log.messages()[1].id);
    }

    #[test]
    fn replacement_keeps_the_message_id() {
        let mut log = TranscriptLog::new();
        log.append_assistant("par");
        let id = log.messages()[0].id;
        log.append_assistant("partial grown");
        assert_eq!(log.messages()[0].id, id);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = TranscriptLog::new();
        log.append_user("hello");
        log.clear();
        assert!(log.messages().is_empty());
    }
}
