//! Session lifecycle and event routing
//!
//! [`SessionEngine`] owns one live conversation at a time: it acquires the
//! audio devices, opens the remote channel, then runs two tasks until the
//! session ends. A capture task drains the microphone on a fixed cadence
//! and streams encoded chunks out; a routing task consumes channel events
//! and drives the wake gate, the transcript, and the playback schedule.
//!
//! Every session carries a generation number. Stopping (or restarting)
//! bumps the counter, and tasks from an older generation check it before
//! touching shared state, so late events from a dead session are inert.

mod gate;
mod transcript;

pub use gate::{GateOutcome, WakeWordGate};
pub use transcript::{Speaker, TranscriptLog, TranscriptMessage};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::channel::{ChannelEvent, ChannelHandle, Connector};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::voice::{
    decode_pcm16, encode_pcm16, DeviceFactory, InputDevice, OutputDevice, PlaybackScheduler,
};

/// Observable lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; no devices or channel held
    Idle,
    /// Session live, wake gate closed, audio streaming out
    PassiveListening,
    /// Wake phrase heard; awaiting the assistant's response
    Thinking,
    /// Assistant audio is arriving or playing
    Speaking,
    /// Session ended by a fatal failure; see [`SessionEngine::last_error`]
    Error,
}

type SharedInput = Arc<Mutex<Box<dyn InputDevice>>>;
type SharedOutput = Arc<Mutex<Box<dyn OutputDevice>>>;

struct ActiveSession {
    generation: u64,
    input: SharedInput,
    output: SharedOutput,
    scheduler: PlaybackScheduler,
    channel: ChannelHandle,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    config: Config,
    connector: Arc<dyn Connector>,
    devices: Arc<dyn DeviceFactory>,
    generation: AtomicU64,
    state_tx: watch::Sender<SessionState>,
    transcript: Mutex<TranscriptLog>,
    last_error: Mutex<Option<String>>,
    active: AsyncMutex<Option<ActiveSession>>,
}

impl Inner {
    /// Publish `state` only if `generation` is still current.
    fn set_state(&self, generation: u64, state: SessionState) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state_tx.send_if_modified(|current| {
                if *current == state {
                    false
                } else {
                    tracing::debug!(from = ?current, to = ?state, "session state change");
                    *current = state;
                    true
                }
            });
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// One-at-a-time voice session engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionEngine {
    inner: Arc<Inner>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        config: Config,
        connector: Arc<dyn Connector>,
        devices: Arc<dyn DeviceFactory>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                devices,
                generation: AtomicU64::new(0),
                state_tx,
                transcript: Mutex::new(TranscriptLog::new()),
                last_error: Mutex::new(None),
                active: AsyncMutex::new(None),
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Watch stream of lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Message shown to the user for the most recent fatal failure.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the conversation so far.
    #[must_use]
    pub fn transcript(&self) -> Vec<TranscriptMessage> {
        self.inner
            .transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages()
            .to_vec()
    }

    /// Begin a session: microphone, then speaker, then remote channel.
    ///
    /// Starting while a session is live restarts it. On success the engine
    /// is in [`SessionState::PassiveListening`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceDenied`] if a device cannot be acquired and
    /// [`Error::Channel`] if the remote channel cannot be opened. The engine
    /// is left in [`SessionState::Error`] in both cases.
    pub async fn start(&self) -> Result<()> {
        self.teardown(SessionState::Idle).await;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.open_session(generation).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "session start failed");
                // A stop() that raced in already owns the state; only a
                // failure of the still-current attempt is surfaced.
                if self.inner.is_current(generation) {
                    *self
                        .inner
                        .last_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(e.user_message());
                    self.inner.set_state(generation, SessionState::Error);
                }
                Err(e)
            }
        }
    }

    /// End the session and release everything. Idempotent.
    pub async fn stop(&self) {
        self.teardown(SessionState::Idle).await;
        self.inner
            .transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Send a camera frame alongside the audio stream. Best-effort; a
    /// failure is logged and the session continues.
    pub async fn push_auxiliary_frame(&self, jpeg: Vec<u8>) {
        let channel = {
            let active = self.inner.active.lock().await;
            active.as_ref().map(|a| a.channel.clone())
        };
        match channel {
            Some(channel) => {
                if let Err(e) = channel.send_image(jpeg).await {
                    tracing::warn!(error = %e, "auxiliary frame dropped");
                }
            }
            None => tracing::debug!("auxiliary frame ignored, no live session"),
        }
    }

    async fn open_session(&self, generation: u64) -> Result<()> {
        let inner = &self.inner;
        let audio = &inner.config.audio;

        let mut input = inner.devices.open_input(audio)?;
        input.start()?;

        let scheduler = PlaybackScheduler::new(audio.output_sample_rate);
        let mut output = match inner.devices.open_output(audio, scheduler.shared()) {
            Ok(output) => output,
            Err(e) => {
                input.stop();
                return Err(e);
            }
        };

        let (channel, events) = match inner.connector.connect(&inner.config).await {
            Ok(pair) => pair,
            Err(e) => {
                input.stop();
                output.close();
                return Err(e);
            }
        };

        let input: SharedInput = Arc::new(Mutex::new(input));
        let output: SharedOutput = Arc::new(Mutex::new(output));

        let mut active = inner.active.lock().await;

        // A stop() that landed while we were acquiring resources has
        // already bumped the generation; this session must not come alive.
        if !inner.is_current(generation) {
            drop(active);
            tracing::debug!(generation, "session canceled during startup");
            input
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .stop();
            output
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .close();
            channel.close().await;
            return Err(Error::Channel(
                "session stopped during startup".to_string(),
            ));
        }

        {
            let mut transcript = inner
                .transcript
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            transcript.clear();
        }
        *inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        let capture = tokio::spawn(capture_loop(
            self.clone(),
            generation,
            Arc::clone(&input),
            channel.clone(),
        ));
        let routing = tokio::spawn(routing_loop(
            self.clone(),
            generation,
            events,
            Arc::clone(&output),
            scheduler.clone(),
        ));

        *active = Some(ActiveSession {
            generation,
            input,
            output,
            scheduler,
            channel,
            tasks: vec![capture, routing],
        });
        inner.set_state(generation, SessionState::PassiveListening);
        drop(active);

        tracing::info!(generation, "session started");
        Ok(())
    }

    /// Tear down whatever session is live and publish `final_state`.
    ///
    /// The generation counter is bumped before anything else, and even when
    /// no session is installed yet: a `start()` still parked in resource
    /// acquisition belongs to the invalidated generation and must not come
    /// alive afterwards.
    async fn teardown(&self, final_state: SessionState) {
        let inner = &self.inner;
        inner.generation.fetch_add(1, Ordering::SeqCst);

        let Some(session) = inner.active.lock().await.take() else {
            if final_state == SessionState::Idle {
                inner.state_tx.send_if_modified(|current| {
                    if *current == SessionState::Idle {
                        false
                    } else {
                        *current = SessionState::Idle;
                        true
                    }
                });
            }
            return;
        };

        tracing::info!(generation = session.generation, "session stopping");
        Self::release(session).await;
        let _ = inner.state_tx.send(final_state);
    }

    /// Tear down only if `generation` still owns the active session.
    ///
    /// Used by a session's own routing task for fatal events; a restart
    /// that raced in keeps the newer session untouched.
    async fn teardown_if_current(&self, generation: u64, final_state: SessionState) {
        let inner = &self.inner;
        let (session, fenced) = {
            let mut active = inner.active.lock().await;
            if !active.as_ref().is_some_and(|s| s.generation == generation) {
                return;
            }
            let fenced = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (active.take(), fenced)
        };
        let Some(session) = session else { return };

        tracing::info!(generation = session.generation, "session stopping");
        Self::release(session).await;
        // A concurrent stop() or restart owns the final state now
        if inner.generation.load(Ordering::SeqCst) == fenced {
            let _ = inner.state_tx.send(final_state);
        }
    }

    /// Release a session's resources in fixed order.
    async fn release(session: ActiveSession) {
        session
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
        session.scheduler.interrupt();
        session
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
        session.channel.close().await;
        for task in session.tasks {
            task.abort();
        }
    }
}

/// Drain the microphone on a fixed cadence and stream encoded chunks out.
async fn capture_loop(
    engine: SessionEngine,
    generation: u64,
    input: SharedInput,
    channel: ChannelHandle,
) {
    let audio = engine.inner.config.audio;
    let mut ticker = tokio::time::interval(audio.capture_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Anything captured before the channel opened is stale
    input
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain(usize::MAX);

    loop {
        ticker.tick().await;
        if !engine.inner.is_current(generation) {
            break;
        }

        let samples = input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(audio.capture_buffer_size);
        if samples.is_empty() {
            continue;
        }

        let pcm = encode_pcm16(&samples);
        if let Err(e) = channel.send_audio(pcm, audio.input_sample_rate).await {
            tracing::warn!(error = %e, "capture chunk dropped");
        }
    }
    tracing::debug!(generation, "capture loop finished");
}

/// Route channel events into the gate, transcript, and playback schedule.
async fn routing_loop(
    engine: SessionEngine,
    generation: u64,
    mut events: mpsc::Receiver<ChannelEvent>,
    output: SharedOutput,
    scheduler: PlaybackScheduler,
) {
    let inner = Arc::clone(&engine.inner);
    let mut gate = WakeWordGate::new(&inner.config.wake_words);
    let mut assistant_partial = String::new();

    while let Some(event) = events.recv().await {
        if !inner.is_current(generation) {
            break;
        }
        match event {
            ChannelEvent::InputTranscript(text) => match gate.push(&text) {
                GateOutcome::Suppressed => {}
                GateOutcome::Triggered { remainder } => {
                    tracing::info!("wake phrase detected");
                    inner.set_state(generation, SessionState::Thinking);
                    if !remainder.is_empty() {
                        inner
                            .transcript
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .append_user(&remainder);
                    }
                }
                GateOutcome::Content { text } => {
                    inner
                        .transcript
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .append_user(&text);
                }
            },
            ChannelEvent::OutputTranscript(text) => {
                inner.set_state(generation, SessionState::Speaking);
                assistant_partial.push_str(&text);
                inner
                    .transcript
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .append_assistant(&assistant_partial);
            }
            ChannelEvent::Audio(bytes) => match decode_pcm16(&bytes) {
                Ok(samples) => {
                    inner.set_state(generation, SessionState::Speaking);
                    let clock = output
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clock();
                    let start = scheduler.enqueue(samples, clock);
                    tracing::trace!(start_secs = start, "audio chunk scheduled");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed audio chunk");
                }
            },
            ChannelEvent::TurnComplete => {
                inner
                    .transcript
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .finalize_all();
                gate.rearm();
                assistant_partial.clear();
                inner.set_state(generation, SessionState::PassiveListening);
            }
            ChannelEvent::Interrupted => {
                tracing::debug!("playback interrupted by user");
                scheduler.interrupt();
            }
            ChannelEvent::Error(message) => {
                let error = Error::Channel(message);
                tracing::error!(error = %error, "fatal channel error");
                if inner.is_current(generation) {
                    *inner
                        .last_error
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(error.user_message());
                }
                engine
                    .teardown_if_current(generation, SessionState::Error)
                    .await;
                break;
            }
            ChannelEvent::Closed => {
                tracing::info!("channel closed by remote");
                engine
                    .teardown_if_current(generation, SessionState::Idle)
                    .await;
                break;
            }
        }
    }
    tracing::debug!(generation, "routing loop finished");
}
