//! Remote conversational channel
//!
//! The engine talks to the remote agent through the [`Connector`] seam:
//! outbound frames go through a [`ChannelHandle`], inbound events arrive on
//! an mpsc receiver. The concrete implementation is the Gemini Live
//! WebSocket client in [`live`]; tests substitute a scripted connector.

mod live;
pub mod wire;

pub use live::LiveConnector;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Config, Error, Result};

/// Events delivered by the remote channel, in arrival order
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Growing partial transcription of the user's speech
    InputTranscript(String),
    /// Growing partial transcription of the assistant's speech
    OutputTranscript(String),
    /// Encoded response audio chunk (16-bit LE PCM at the output rate)
    Audio(Vec<u8>),
    /// The current exchange is complete
    TurnComplete,
    /// The user spoke over the assistant; cancel queued playback
    Interrupted,
    /// Channel-level failure; fatal to the session
    Error(String),
    /// Channel closed by the remote side
    Closed,
}

/// Outbound frame for the remote channel
#[derive(Debug)]
pub enum OutboundFrame {
    /// Encoded capture audio, tagged with its sample rate
    Audio { pcm: Vec<u8>, sample_rate: u32 },
    /// Best-effort auxiliary camera frame (JPEG bytes)
    Image { jpeg: Vec<u8> },
    /// Close the channel gracefully
    Close,
}

/// Sending half of an established channel. Cheap to clone; sends are
/// fire-and-forget from the caller's perspective.
#[derive(Clone)]
pub struct ChannelHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl ChannelHandle {
    #[must_use]
    pub const fn new(tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self { tx }
    }

    /// Queue one encoded audio chunk for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the channel's outbound loop has exited.
    pub async fn send_audio(&self, pcm: Vec<u8>, sample_rate: u32) -> Result<()> {
        self.tx
            .send(OutboundFrame::Audio { pcm, sample_rate })
            .await
            .map_err(|_| Error::Channel("outbound channel closed".to_string()))
    }

    /// Queue one auxiliary image frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the channel's outbound loop has exited.
    pub async fn send_image(&self, jpeg: Vec<u8>) -> Result<()> {
        self.tx
            .send(OutboundFrame::Image { jpeg })
            .await
            .map_err(|_| Error::Channel("outbound channel closed".to_string()))
    }

    /// Request a graceful close. Best-effort.
    pub async fn close(&self) {
        let _ = self.tx.send(OutboundFrame::Close).await;
    }
}

/// Establishes a channel to the remote agent. The returned receiver yields
/// inbound events until the channel closes; a successful return means the
/// channel is open (the engine's channel-open transition).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and complete any protocol handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the connection or handshake fails.
    async fn connect(&self, config: &Config)
        -> Result<(ChannelHandle, mpsc::Receiver<ChannelEvent>)>;
}
