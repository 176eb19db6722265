//! Cortex Live - Real-time bidirectional voice assistant engine
//!
//! This library provides the core functionality for the Cortex engine:
//! - Microphone capture and PCM transcoding
//! - Wake word gating over streaming transcription
//! - Gemini Live channel (bidirectional WebSocket)
//! - Sample-accurate playback scheduling with barge-in interrupt
//! - Session lifecycle and transcript management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Session Engine                      │
//! │   Lifecycle  │  Wake Gate  │  Transcript            │
//! └──────┬──────────────────────────────────┬───────────┘
//!        │                                  │
//! ┌──────▼───────────────┐   ┌──────────────▼───────────┐
//! │       Voice           │   │        Channel           │
//! │  Capture │ Transcode  │   │   Gemini Live WebSocket  │
//! │  Playback Scheduler   │   │   (audio + transcripts)  │
//! └───────────────────────┘   └──────────────────────────┘
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod session;
pub mod voice;

pub use channel::{ChannelEvent, ChannelHandle, Connector, LiveConnector, OutboundFrame};
pub use config::{AudioConfig, Config};
pub use error::{Error, Result};
pub use session::{
    GateOutcome, SessionEngine, SessionState, Speaker, TranscriptLog, TranscriptMessage,
    WakeWordGate,
};
pub use voice::{
    CpalDeviceFactory, DeviceFactory, InputDevice, MicCapture, OutputDevice, PlaybackScheduler,
};
