//! Microphone capture via cpal
//!
//! The cpal stream lives on a dedicated worker thread because the stream
//! handle is not `Send`. Captured f32 samples accumulate in a shared buffer
//! that the capture tick loop drains in fixed-size chunks.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use super::InputDevice;
use crate::{Error, Result};

/// Captures audio from the default input device
pub struct MicCapture {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl MicCapture {
    /// Create a capture handle. The device itself is acquired in [`InputDevice::start`].
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer: Arc::new(Mutex::new(Vec::new())),
            worker: None,
        }
    }
}

impl InputDevice for MicCapture {
    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let sample_rate = self.sample_rate;
        let buffer = Arc::clone(&self.buffer);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let stream = match build_input_stream(sample_rate, buffer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(Error::ResourceDenied(format!(
                    "failed to start capture stream: {e}"
                ))));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Park until stop() is called or the handle is dropped
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::debug!(sample_rate, "audio capture started");
                self.worker = Some(CaptureWorker { stop_tx, handle });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(Error::ResourceDenied(
                "capture worker exited before reporting readiness".to_string(),
            )),
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.handle.join();
            tracing::debug!("audio capture stopped");
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    fn drain(&mut self, max_samples: usize) -> Vec<f32> {
        self.buffer.lock().map_or_else(
            |_| Vec::new(),
            |mut buf| {
                let take = buf.len().min(max_samples);
                buf.drain(..take).collect()
            },
        )
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build a mono f32 input stream at the requested rate
fn build_input_stream(
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host.default_input_device().ok_or_else(|| {
        Error::ResourceDenied("no input device available (microphone missing or blocked)".to_string())
    })?;

    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::ResourceDenied(format!("microphone access refused: {e}")))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| {
            Error::ResourceDenied(format!(
                "no mono input config at {sample_rate} Hz"
            ))
        })?;

    let config = supported.with_sample_rate(SampleRate(sample_rate)).config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        "audio capture initialized"
    );

    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::ResourceDenied(format!("failed to open capture stream: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_respects_max_and_preserves_order() {
        let mut mic = MicCapture::new(16_000);
        mic.buffer.lock().unwrap().extend([0.1, 0.2, 0.3, 0.4]);

        assert_eq!(mic.drain(3), vec![0.1, 0.2, 0.3]);
        assert_eq!(mic.drain(3), vec![0.4]);
        assert!(mic.drain(3).is_empty());
    }

    #[test]
    fn stop_without_start_is_harmless() {
        let mut mic = MicCapture::new(16_000);
        mic.stop();
        mic.stop();
    }
}
