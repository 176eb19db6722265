//! Wake word gating over streaming transcription
//!
//! Partial transcripts arrive as fragments with no guarantee that a wake
//! phrase lands inside a single fragment. The gate accumulates fragments
//! and scans the running text case-insensitively, so "hey", " cor",
//! "tex ..." still triggers.

/// Result of feeding one transcript fragment through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Still waiting for a wake phrase; nothing should reach the transcript
    Suppressed,
    /// A wake phrase just matched; `remainder` is any speech after it
    Triggered { remainder: String },
    /// Gate already open; `text` is the full accumulated utterance so far
    Content { text: String },
}

/// Accumulating wake word detector
#[derive(Debug)]
pub struct WakeWordGate {
    phrases: Vec<String>,
    accumulated: String,
    awaiting: bool,
}

impl WakeWordGate {
    /// Phrases are matched case-insensitively; empty phrases are dropped.
    #[must_use]
    pub fn new(phrases: &[String]) -> Self {
        let phrases = phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            phrases,
            accumulated: String::new(),
            awaiting: true,
        }
    }

    /// Whether the gate is closed and scanning for a wake phrase.
    #[must_use]
    pub fn awaiting(&self) -> bool {
        self.awaiting
    }

    /// Close the gate again and discard any accumulated text.
    pub fn rearm(&mut self) {
        self.awaiting = true;
        self.accumulated.clear();
    }

    /// Feed one transcript fragment and report what the session should do.
    pub fn push(&mut self, fragment: &str) -> GateOutcome {
        self.accumulated.push_str(fragment);

        if !self.awaiting {
            return GateOutcome::Content {
                text: self.accumulated.clone(),
            };
        }

        let lowered = self.accumulated.to_lowercase();
        let Some(match_end) = self.rightmost_match_end(&lowered) else {
            return GateOutcome::Suppressed;
        };

        self.awaiting = false;

        // Splitting by byte offset only works when lowercasing did not
        // shift positions; otherwise drop everything up to now.
        let remainder = if lowered.len() == self.accumulated.len() {
            self.accumulated[match_end..].trim_start().to_string()
        } else {
            String::new()
        };
        self.accumulated = remainder.clone();

        GateOutcome::Triggered { remainder }
    }

    /// End offset of the latest wake phrase occurrence, across all phrases.
    fn rightmost_match_end(&self, lowered: &str) -> Option<usize> {
        self.phrases
            .iter()
            .filter_map(|p| lowered.rfind(p.as_str()).map(|start| start + p.len()))
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> WakeWordGate {
        WakeWordGate::new(&["cortex".to_string(), "hey cortex".to_string()])
    }

    #[test]
    fn suppresses_until_wake_phrase() {
        let mut g = gate();
        assert_eq!(g.push("what time is it"), GateOutcome::Suppressed);
        assert!(g.awaiting());
    }

    #[test]
    fn triggers_across_fragment_boundaries() {
        let mut g = gate();
        assert_eq!(g.push("hey"), GateOutcome::Suppressed);
        assert_eq!(g.push(" cor"), GateOutcome::Suppressed);
        assert_eq!(
            g.push("tex what's the weather"),
            GateOutcome::Triggered {
                remainder: "what's the weather".to_string()
            }
        );
        assert_eq!(
            g.push(" in tokyo"),
            GateOutcome::Content {
                text: "what's the weather in tokyo".to_string()
            }
        );
    }

    #[test]
    fn trigger_with_no_trailing_speech() {
        let mut g = gate();
        assert_eq!(
            g.push("hey cortex"),
            GateOutcome::Triggered {
                remainder: String::new()
            }
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let mut g = gate();
        assert!(matches!(g.push("Hey Cortex hello"), GateOutcome::Triggered { .. }));
    }

    #[test]
    fn rightmost_phrase_wins() {
        let mut g = gate();
        // "hey cortex" ends after the bare "cortex" inside it
        let outcome = g.push("um hey cortex play music");
        assert_eq!(
            outcome,
            GateOutcome::Triggered {
                remainder: "play music".to_string()
            }
        );
    }

    #[test]
    fn rearm_closes_and_clears() {
        let mut g = gate();
        g.push("hey cortex hello");
        assert!(!g.awaiting());
        g.rearm();
        assert!(g.awaiting());
        assert_eq!(g.push("hello again"), GateOutcome::Suppressed);
    }

    #[test]
    fn non_ascii_before_phrase_falls_back_to_empty_remainder() {
        let mut g = gate();
        // 'İ' lowercases to a two-codepoint sequence, shifting byte offsets
        let outcome = g.push("İstanbul cortex talk to me");
        assert_eq!(
            outcome,
            GateOutcome::Triggered {
                remainder: String::new()
            }
        );
    }

    #[test]
    fn empty_phrase_list_never_triggers() {
        let mut g = WakeWordGate::new(&[]);
        assert_eq!(g.push("cortex hello"), GateOutcome::Suppressed);
    }
}
