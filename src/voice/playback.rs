//! Playback timeline scheduling and output rendering
//!
//! The scheduler owns a monotonic sample-indexed cursor: each enqueued chunk
//! is placed at the cursor and the cursor advances by the chunk's length, so
//! consecutive chunks render back-to-back with no gap and no overlap. A
//! single mutex guards the whole schedule, which makes [`PlaybackScheduler::interrupt`]
//! atomic with respect to concurrent enqueues: a unit either lands before the
//! clear and dies with it, or lands after and is scheduled from a reset
//! timeline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use super::OutputDevice;
use crate::{Error, Result};

/// Schedule shared between the scheduler and the output device callback
pub type SharedSchedule = Arc<Mutex<ScheduleState>>;

/// One decoded response chunk placed on the timeline
struct PlaybackUnit {
    samples: Vec<f32>,
    /// Absolute start time on the device timeline, in samples
    start: u64,
    /// Render progress within `samples`
    consumed: usize,
}

/// Timeline cursor plus the set of currently scheduled units
pub struct ScheduleState {
    /// Next free slot on the timeline, in samples. Monotonically
    /// non-decreasing between interrupts.
    cursor: u64,
    queue: VecDeque<PlaybackUnit>,
}

impl ScheduleState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cursor: 0,
            queue: VecDeque::new(),
        }
    }

    /// Place a chunk at the next free slot, returns its start time in samples.
    fn enqueue(&mut self, samples: Vec<f32>, device_clock: u64) -> u64 {
        // Never schedule in the past: after a quiet period the cursor has
        // fallen behind the device clock and must re-seed from it.
        self.cursor = self.cursor.max(device_clock);
        let start = self.cursor;
        self.cursor += samples.len() as u64;
        self.queue.push_back(PlaybackUnit {
            samples,
            start,
            consumed: 0,
        });
        start
    }

    /// Cancel every scheduled unit and reset the timeline.
    fn interrupt(&mut self) {
        self.queue.clear();
        self.cursor = 0;
    }

    /// Render one mono buffer starting at device time `clock` (samples).
    ///
    /// Units are consumed strictly in enqueue order; gaps before a unit's
    /// start render as silence. Fully played units are dropped from the
    /// scheduled set as the clock passes them.
    pub fn render(&mut self, clock: u64, out: &mut [f32]) {
        for (i, slot) in out.iter_mut().enumerate() {
            let t = clock + i as u64;
            *slot = loop {
                match self.queue.front_mut() {
                    None => break 0.0,
                    Some(unit) if unit.consumed >= unit.samples.len() => {
                        self.queue.pop_front();
                    }
                    Some(unit) if t < unit.start => break 0.0,
                    Some(unit) => {
                        let sample = unit.samples[unit.consumed];
                        unit.consumed += 1;
                        break sample;
                    }
                }
            };
        }
    }

    /// Number of units still scheduled (including the one being rendered)
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub const fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the playback timeline for one session. Clones share the timeline.
#[derive(Clone)]
pub struct PlaybackScheduler {
    shared: SharedSchedule,
    sample_rate: u32,
}

impl PlaybackScheduler {
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ScheduleState::new())),
            sample_rate,
        }
    }

    /// Handle for the output device to render from
    #[must_use]
    pub fn shared(&self) -> SharedSchedule {
        Arc::clone(&self.shared)
    }

    /// Schedule decoded samples at the next free slot.
    ///
    /// `device_clock` is the output device's current position in samples;
    /// the first chunk after a quiet period starts there rather than in the
    /// past. Returns the scheduled start time in seconds.
    pub fn enqueue(&self, samples: Vec<f32>, device_clock: u64) -> f64 {
        let start = self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .enqueue(samples, device_clock);
        self.to_secs(start)
    }

    /// Stop every scheduled unit immediately and reset the cursor to zero.
    ///
    /// The next enqueue re-seeds the cursor from the device clock.
    pub fn interrupt(&self) {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .interrupt();
        tracing::debug!("playback interrupted, schedule cleared");
    }

    /// Number of units currently scheduled
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scheduled_count()
    }

    /// Duration of `sample_count` samples at the playback rate, in seconds
    #[must_use]
    pub fn to_secs(&self, sample_count: u64) -> f64 {
        sample_count as f64 / f64::from(self.sample_rate)
    }
}

/// cpal-backed output device rendering the shared schedule.
///
/// The stream runs on a dedicated thread (the handle is not `Send`); the
/// device clock advances by one per mono frame rendered.
pub struct CpalPlayback {
    clock: Arc<AtomicU64>,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CpalPlayback {
    /// Open the default output device and start rendering `schedule`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceDenied`] if no usable output device exists.
    pub fn open(sample_rate: u32, schedule: SharedSchedule) -> Result<Self> {
        let clock = Arc::new(AtomicU64::new(0));
        let clock_worker = Arc::clone(&clock);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let stream = match build_output_stream(sample_rate, schedule, clock_worker) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(Error::ResourceDenied(format!(
                    "failed to start playback stream: {e}"
                ))));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::debug!(sample_rate, "audio playback started");
                Ok(Self {
                    clock,
                    stop_tx: Some(stop_tx),
                    handle: Some(handle),
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(Error::ResourceDenied(
                "playback worker exited before reporting readiness".to_string(),
            )),
        }
    }
}

impl OutputDevice for CpalPlayback {
    fn clock(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            tracing::debug!("audio playback stopped");
        }
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build a mono-or-stereo f32 output stream at the requested rate
fn build_output_stream(
    sample_rate: u32,
    schedule: SharedSchedule,
    clock: Arc<AtomicU64>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host.default_output_device().ok_or_else(|| {
        Error::ResourceDenied("no output device available".to_string())
    })?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::ResourceDenied(format!("output device access refused: {e}")))?
        .find(|c| {
            (c.channels() == 1 || c.channels() == 2)
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| {
            Error::ResourceDenied(format!("no output config at {sample_rate} Hz"))
        })?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio playback initialized"
    );

    let mut mono: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                mono.resize(frames, 0.0);
                let now = clock.load(Ordering::Relaxed);
                schedule
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .render(now, &mut mono);
                for (frame, &sample) in data.chunks_mut(channels).zip(&mono) {
                    for out in frame {
                        *out = sample;
                    }
                }
                clock.fetch_add(frames as u64, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::ResourceDenied(format!("failed to open playback stream: {e}")))
}
