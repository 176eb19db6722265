//! Audio capture, transcoding, and playback scheduling
//!
//! Device access goes through the [`InputDevice`]/[`OutputDevice`] traits so
//! the session engine can be driven without hardware in tests. The cpal
//! implementations run their streams on dedicated threads; `cpal::Stream` is
//! not `Send`, and the engine holds devices across async task boundaries.

mod capture;
mod playback;
mod transcode;

pub use capture::MicCapture;
pub use playback::{CpalPlayback, PlaybackScheduler, ScheduleState, SharedSchedule};
pub use transcode::{decode_pcm16, encode_pcm16, samples_to_wav};

use crate::config::AudioConfig;
use crate::Result;

/// Microphone resource: accumulates capture samples until drained.
pub trait InputDevice: Send {
    /// Begin capturing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ResourceDenied`] if the device cannot be opened.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing and release the device.
    fn stop(&mut self);

    /// Take up to `max_samples` of the oldest captured samples.
    fn drain(&mut self, max_samples: usize) -> Vec<f32>;
}

/// Output device: renders the shared playback schedule and exposes a
/// monotonic device clock in samples.
pub trait OutputDevice: Send {
    /// Samples rendered since the device was opened.
    fn clock(&self) -> u64;

    /// Stop rendering and release the device.
    fn close(&mut self);
}

/// Opens audio devices. Swapped for a fake in tests.
pub trait DeviceFactory: Send + Sync {
    /// Open the microphone.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ResourceDenied`] if no usable input device exists.
    fn open_input(&self, audio: &AudioConfig) -> Result<Box<dyn InputDevice>>;

    /// Open the output device, wired to render `schedule`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ResourceDenied`] if no usable output device exists.
    fn open_output(
        &self,
        audio: &AudioConfig,
        schedule: SharedSchedule,
    ) -> Result<Box<dyn OutputDevice>>;
}

/// Default factory backed by cpal.
pub struct CpalDeviceFactory;

impl DeviceFactory for CpalDeviceFactory {
    fn open_input(&self, audio: &AudioConfig) -> Result<Box<dyn InputDevice>> {
        Ok(Box::new(MicCapture::new(audio.input_sample_rate)))
    }

    fn open_output(
        &self,
        audio: &AudioConfig,
        schedule: SharedSchedule,
    ) -> Result<Box<dyn OutputDevice>> {
        Ok(Box::new(CpalPlayback::open(
            audio.output_sample_rate,
            schedule,
        )?))
    }
}
