//! Gemini Live WebSocket connector
//!
//! Opens a `BidiGenerateContent` session, performs the setup handshake,
//! then splits the socket into an outbound writer task and an inbound
//! reader task bridged to the engine through channels.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt as _, Stream, StreamExt as _};
use secrecy::ExposeSecret as _;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::config::Config;
use crate::error::{Error, Result};

use super::{wire, ChannelEvent, ChannelHandle, Connector, OutboundFrame};

const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// How long to wait for `setupComplete` before declaring the session dead
const SETUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Depth of the outbound frame queue; roughly two seconds of audio chunks
const OUTBOUND_QUEUE: usize = 32;

/// Live session connector backed by the Gemini `BidiGenerateContent` API
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveConnector;

impl LiveConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for LiveConnector {
    async fn connect(
        &self,
        config: &Config,
    ) -> Result<(ChannelHandle, mpsc::Receiver<ChannelEvent>)> {
        let url = format!("{LIVE_ENDPOINT}?key={}", config.api_key.expose_secret());

        tracing::info!(model = %config.model, "connecting live session");
        let (ws, _response) = connect_async(&url)
            .await
            .map_err(|e| Error::Channel(format!("websocket connect failed: {e}")))?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        let setup = wire::setup_message(&config.model, &config.voice, &config.system_instruction);
        let setup_json = serde_json::to_string(&setup)?;
        ws_tx
            .send(WsMessage::text(setup_json))
            .await
            .map_err(|e| Error::Channel(format!("setup send failed: {e}")))?;

        await_setup_complete(&mut ws_rx).await?;
        tracing::info!("live session established");

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_QUEUE);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(64);

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let message = match frame {
                    OutboundFrame::Audio { pcm, sample_rate } => {
                        serde_json::to_string(&wire::audio_message(&pcm, sample_rate))
                    }
                    OutboundFrame::Image { jpeg } => {
                        serde_json::to_string(&wire::image_message(&jpeg))
                    }
                    OutboundFrame::Close => {
                        let _ = ws_tx.send(WsMessage::Close(None)).await;
                        break;
                    }
                };
                let json = match message {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unserializable outbound frame");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(WsMessage::text(json)).await {
                    tracing::warn!(error = %e, "outbound send failed, stopping writer");
                    break;
                }
            }
            tracing::debug!("outbound writer finished");
        });

        tokio::spawn(async move {
            while let Some(incoming) = ws_rx.next().await {
                let text = match incoming {
                    Ok(msg) => match server_json(&msg) {
                        Some(text) => text,
                        None => {
                            if matches!(msg, WsMessage::Close(_)) {
                                break;
                            }
                            continue;
                        }
                    },
                    Err(e) => {
                        let _ = event_tx
                            .send(ChannelEvent::Error(format!("websocket read failed: {e}")))
                            .await;
                        break;
                    }
                };
                for event in wire::parse_server_message(&text) {
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            let _ = event_tx.send(ChannelEvent::Closed).await;
            tracing::debug!("inbound reader finished");
        });

        Ok((ChannelHandle::new(out_tx), event_rx))
    }
}

/// Consume frames until the server acknowledges the setup message.
async fn await_setup_complete<S>(ws_rx: &mut S) -> Result<()>
where
    S: Stream<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let handshake = async {
        while let Some(incoming) = ws_rx.next().await {
            let msg = incoming.map_err(|e| Error::Channel(format!("handshake read failed: {e}")))?;
            if let Some(text) = server_json(&msg) {
                if wire::is_setup_complete(&text) {
                    return Ok(());
                }
                tracing::debug!("ignoring pre-setup frame");
            } else if matches!(msg, WsMessage::Close(_)) {
                return Err(Error::Channel(
                    "server closed connection during setup".to_string(),
                ));
            }
        }
        Err(Error::Channel(
            "connection ended before setup completed".to_string(),
        ))
    };

    tokio::time::timeout(SETUP_TIMEOUT, handshake)
        .await
        .map_err(|_| Error::Channel("timed out waiting for session setup".to_string()))?
}

/// Extract the JSON text of a server frame.
///
/// The live API sends JSON in Binary frames as well as Text frames, so
/// binary payloads that look like JSON are decoded too.
fn server_json(msg: &WsMessage) -> Option<String> {
    match msg {
        WsMessage::Text(text) => Some(text.to_string()),
        WsMessage::Binary(data) if data.first() == Some(&b'{') => {
            String::from_utf8(data.to_vec()).ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_pass_through() {
        let msg = WsMessage::text(r#"{"turnComplete": true}"#);
        assert_eq!(server_json(&msg).as_deref(), Some(r#"{"turnComplete": true}"#));
    }

    #[test]
    fn binary_json_frames_are_decoded() {
        let msg = WsMessage::binary(br#"{"setupComplete": {}}"#.to_vec());
        let text = server_json(&msg).unwrap();
        assert!(wire::is_setup_complete(&text));
    }

    #[test]
    fn non_json_binary_frames_are_skipped() {
        let msg = WsMessage::binary(vec![0u8, 1, 2, 3]);
        assert!(server_json(&msg).is_none());
    }

    #[test]
    fn ping_frames_are_skipped() {
        let msg = WsMessage::Ping(vec![].into());
        assert!(server_json(&msg).is_none());
    }
}
