//! Error types for the cortex-live session engine

use thiserror::Error;

/// Result type alias for cortex-live operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the session engine
///
/// Only [`Error::ResourceDenied`] and [`Error::Channel`] are fatal to a
/// session and surfaced to the user; everything else is contained by the
/// component that detected it.
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone or output device unavailable, or permission refused.
    /// Fatal to the attempted session.
    #[error("resource denied: {0}")]
    ResourceDenied(String),

    /// Remote channel failure. Fatal; forces a full session teardown.
    #[error("channel error: {0}")]
    Channel(String),

    /// A single inbound payload failed to decode. The offending chunk is
    /// dropped and the session continues.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Audio processing error outside of device acquisition
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error forces the session into the `Error` state
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceDenied(_) | Self::Channel(_))
    }

    /// Human-readable message for the presentation layer.
    ///
    /// Distinguishes permission problems from generic failures so the UI
    /// can tell the user what to fix.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ResourceDenied(msg) => {
                format!("Microphone or speaker access was denied: {msg}")
            }
            Self::Channel(_) => {
                "The connection to the assistant failed. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(Error::ResourceDenied("mic".into()).is_fatal());
        assert!(Error::Channel("closed".into()).is_fatal());
        assert!(!Error::MalformedPayload("odd length".into()).is_fatal());
        assert!(!Error::Config("bad toml".into()).is_fatal());
    }

    #[test]
    fn resource_denied_message_is_distinguishable() {
        let err = Error::ResourceDenied("no input device".into());
        assert!(err.user_message().contains("denied"));

        let err = Error::Channel("ws closed".into());
        assert!(!err.user_message().contains("ws closed"));
    }
}
