//! Gemini Live wire format (`BidiGenerateContent`)
//!
//! Client frames are JSON text; server frames are JSON carried in either
//! Text or Binary WebSocket messages. Audio payloads cross the wire as
//! base64 strings tagged with a PCM MIME type.

use base64::Engine as _;
use serde::Serialize;

use super::ChannelEvent;

/// Session setup, sent as the first frame after connecting
#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: SetupPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPayload {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    /// Empty object enables streaming transcription of user speech
    pub input_audio_transcription: EmptyConfig,
    /// Empty object enables streaming transcription of model speech
    pub output_audio_transcription: EmptyConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Serializes as `{}`
#[derive(Debug, Default, Serialize)]
pub struct EmptyConfig {}

/// Streaming media input: audio chunks or auxiliary image frames
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

/// Base64 payload tagged with its MIME type
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

/// Build the setup frame for a live session.
#[must_use]
pub fn setup_message(
    model: &str,
    voice: &str,
    system_instruction: &str,
) -> SetupMessage {
    SetupMessage {
        setup: SetupPayload {
            model: format!("models/{model}"),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                }),
            },
            system_instruction: Some(SystemInstruction {
                parts: vec![TextPart {
                    text: system_instruction.to_string(),
                }],
            }),
            input_audio_transcription: EmptyConfig {},
            output_audio_transcription: EmptyConfig {},
        },
    }
}

/// Wrap an encoded PCM chunk as a realtime media frame.
#[must_use]
pub fn audio_message(pcm: &[u8], sample_rate: u32) -> RealtimeInputMessage {
    media_message(
        format!("audio/pcm;rate={sample_rate}"),
        base64::engine::general_purpose::STANDARD.encode(pcm),
    )
}

/// Wrap a JPEG camera frame as a realtime media frame.
#[must_use]
pub fn image_message(jpeg: &[u8]) -> RealtimeInputMessage {
    media_message(
        "image/jpeg".to_string(),
        base64::engine::general_purpose::STANDARD.encode(jpeg),
    )
}

fn media_message(mime_type: String, data: String) -> RealtimeInputMessage {
    RealtimeInputMessage {
        realtime_input: RealtimeInput {
            media_chunks: vec![MediaChunk { mime_type, data }],
        },
    }
}

/// Whether a server frame is the `setupComplete` acknowledgment.
#[must_use]
pub fn is_setup_complete(json_text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(json_text)
        .is_ok_and(|v| v.get("setupComplete").is_some())
}

/// Parse one server frame into events, preserving their in-frame order.
///
/// A single frame can carry several events at once (transcription plus
/// audio plus turn state). Unparseable frames yield a single
/// [`ChannelEvent::Error`].
#[must_use]
pub fn parse_server_message(json_text: &str) -> Vec<ChannelEvent> {
    let value: serde_json::Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            return vec![ChannelEvent::Error(format!(
                "unparseable server frame: {e}"
            ))];
        }
    };

    let mut events = Vec::new();

    if let Some(content) = value.get("serverContent") {
        if let Some(text) = transcription_text(content.get("inputTranscription")) {
            events.push(ChannelEvent::InputTranscript(text));
        }
        if let Some(text) = transcription_text(content.get("outputTranscription")) {
            events.push(ChannelEvent::OutputTranscript(text));
        }

        if let Some(parts) = content.pointer("/modelTurn/parts").and_then(|v| v.as_array()) {
            for part in parts {
                if let Some(data) = part.pointer("/inlineData/data").and_then(|v| v.as_str()) {
                    match base64::engine::general_purpose::STANDARD.decode(data) {
                        Ok(bytes) => events.push(ChannelEvent::Audio(bytes)),
                        Err(e) => {
                            tracing::warn!(error = %e, "dropping undecodable inline audio");
                        }
                    }
                }
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    if !text.is_empty() {
                        events.push(ChannelEvent::OutputTranscript(text.to_string()));
                    }
                }
            }
        }

        if content.get("interrupted").and_then(serde_json::Value::as_bool) == Some(true) {
            events.push(ChannelEvent::Interrupted);
        }
        if content.get("turnComplete").and_then(serde_json::Value::as_bool) == Some(true) {
            events.push(ChannelEvent::TurnComplete);
        }
    }

    // Some server versions deliver transcriptions at the top level
    if let Some(text) = transcription_text(value.get("inputTranscription")) {
        events.push(ChannelEvent::InputTranscript(text));
    }
    if let Some(text) = transcription_text(value.get("outputTranscription")) {
        events.push(ChannelEvent::OutputTranscript(text));
    }

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown server error");
        events.push(ChannelEvent::Error(message.to_string()));
    }

    events
}

fn transcription_text(node: Option<&serde_json::Value>) -> Option<String> {
    node?
        .get("text")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}
