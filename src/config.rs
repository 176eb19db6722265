//! Configuration for the cortex-live session engine
//!
//! Loaded from a TOML file (default `~/.config/cortex/config.toml`) with
//! environment overrides. Configuration is immutable for the engine's
//! lifetime; nothing else survives a stop/start cycle.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

use crate::{Error, Result};

/// Default Gemini Live model
const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Default prebuilt voice for speech synthesis
const DEFAULT_VOICE: &str = "Zephyr";

/// Default system instruction for the assistant
const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Cortex, a friendly and helpful \
    voice assistant. You can see through the user's camera. Use this visual \
    information to provide more relevant and helpful responses. Keep your \
    responses concise and conversational.";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: SecretString,

    /// Model identifier for the live session
    pub model: String,

    /// Prebuilt voice name for synthesized speech
    pub voice: String,

    /// System instruction sent in the session setup
    pub system_instruction: String,

    /// Trigger phrases; any one of them activates a turn
    pub wake_words: Vec<String>,

    /// Audio capture/playback parameters
    pub audio: AudioConfig,
}

/// Audio capture and playback parameters
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (speech-optimized)
    pub input_sample_rate: u32,

    /// Playback sample rate in Hz (matches the model's output format)
    pub output_sample_rate: u32,

    /// Samples per capture buffer; one buffer is sent per capture tick
    pub capture_buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            capture_buffer_size: 4096,
        }
    }
}

impl AudioConfig {
    /// Duration of one capture buffer, which sets the capture tick cadence
    #[must_use]
    pub fn capture_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(
            self.capture_buffer_size as f64 / f64::from(self.input_sample_rate),
        )
    }
}

/// On-disk representation; every field optional so a partial file works
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: Option<String>,
    model: Option<String>,
    voice: Option<String>,
    system_instruction: Option<String>,
    wake_words: Option<Vec<String>>,
    #[serde(default)]
    audio: Option<AudioConfig>,
}

impl Config {
    /// Load configuration from the given path, or the default location.
    ///
    /// The API key is taken from `GEMINI_API_KEY` when set, otherwise from
    /// the file's `api_key` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be parsed or no API key
    /// is available from any source.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Self::read_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::read_file(&p)?,
                _ => ConfigFile::default(),
            },
        };

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(file.api_key)
            .ok_or_else(|| {
                Error::Config(
                    "no API key: set GEMINI_API_KEY or add `api_key` to config.toml".to_string(),
                )
            })?;

        let wake_words = file
            .wake_words
            .unwrap_or_else(|| vec!["cortex".to_string(), "hey cortex".to_string()]);
        if wake_words.iter().all(|w| w.trim().is_empty()) {
            return Err(Error::Config("wake_words must not be empty".to_string()));
        }

        Ok(Self {
            api_key: SecretString::from(api_key),
            model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            voice: file.voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            system_instruction: file
                .system_instruction
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            wake_words,
            audio: file.audio.unwrap_or_default(),
        })
    }

    /// Default config file location (`~/.config/cortex/config.toml`)
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.config_dir().join("cortex").join("config.toml"))
    }

    fn read_file(path: &Path) -> Result<ConfigFile> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_defaults_match_wire_format() {
        let audio = AudioConfig::default();
        assert_eq!(audio.input_sample_rate, 16_000);
        assert_eq!(audio.output_sample_rate, 24_000);
        assert_eq!(audio.capture_buffer_size, 4096);
    }

    #[test]
    fn capture_interval_derives_from_buffer_size() {
        let audio = AudioConfig::default();
        // 4096 samples at 16kHz = 256ms
        assert_eq!(audio.capture_interval().as_millis(), 256);
    }

    #[test]
    fn partial_file_parses() {
        let file: ConfigFile = toml::from_str(r#"voice = "Aoede""#).unwrap();
        assert_eq!(file.voice.as_deref(), Some("Aoede"));
        assert!(file.wake_words.is_none());
    }

    #[test]
    fn audio_section_parses() {
        let file: ConfigFile = toml::from_str(
            r"
            [audio]
            input_sample_rate = 8000
            ",
        )
        .unwrap();
        let audio = file.audio.unwrap();
        assert_eq!(audio.input_sample_rate, 8000);
        // unspecified fields keep their defaults
        assert_eq!(audio.capture_buffer_size, 4096);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: std::result::Result<ConfigFile, _> = toml::from_str(r#"nonsense = true"#);
        assert!(result.is_err());
    }
}
