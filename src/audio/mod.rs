//! Audio capture and playback
//!
//! Capture goes through cpal (PipeWire, PulseAudio and ALSA backends),
//! playback through rodio. Neither crate's stream type is Send, so each
//! open stream lives on a dedicated thread and talks to the controller
//! over channels; the state machine itself never touches a stream object.

pub mod capture;
pub mod playback;

use crate::config::AudioConfig;
use crate::error::AudioError;
use std::path::Path;
use tokio::sync::oneshot;

/// One slice of captured audio: mono, signed 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    /// Rate the samples were captured at
    pub sample_rate: u32,
    /// The producer fell behind and samples were dropped before this chunk
    pub overflowed: bool,
}

/// Handle to an in-flight playback; resolves when the sink drains.
///
/// Dropping the handle leaves the sound playing (fire-and-forget).
pub struct PlaybackHandle {
    done: oneshot::Receiver<()>,
}

impl PlaybackHandle {
    pub(crate) fn new(done: oneshot::Receiver<()>) -> Self {
        Self { done }
    }

    /// Wait for playback to finish. There is no timeout: completion is
    /// signalled by the audio subsystem itself.
    pub async fn wait(self) {
        let _ = self.done.await;
    }
}

/// An open capture session against the default input device
#[async_trait::async_trait]
pub trait CaptureStream: Send {
    /// Read up to `frames` samples, suspending until they are available.
    /// Returns with `overflowed` set when the producer dropped data since
    /// the previous read.
    async fn read(&mut self, frames: usize) -> Result<AudioChunk, AudioError>;

    /// Release the capture device. Safe to call even if no read ever
    /// completed.
    async fn stop(&mut self) -> Result<(), AudioError>;
}

/// The two audio capabilities the state machine drives
#[async_trait::async_trait]
pub trait AudioAdapter: Send {
    /// Open a mono 16-bit capture stream on the default input device.
    async fn open_capture(&self) -> Result<Box<dyn CaptureStream>, AudioError>;

    /// Decode `path` and start playback on the configured output device
    /// without blocking the caller. Device-not-found and decode failures
    /// are logged and yield None; the caller's control flow is unaffected.
    async fn play(&self, path: &Path) -> Option<PlaybackHandle>;
}

/// Production adapter: cpal capture, rodio playback
pub struct CpalAudio {
    config: AudioConfig,
}

impl CpalAudio {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait::async_trait]
impl AudioAdapter for CpalAudio {
    async fn open_capture(&self) -> Result<Box<dyn CaptureStream>, AudioError> {
        Ok(Box::new(capture::CpalCaptureStream::open(&self.config)?))
    }

    async fn play(&self, path: &Path) -> Option<PlaybackHandle> {
        match playback::start(path, &self.config.output_device) {
            Ok(handle) => Some(handle),
            Err(AudioError::DeviceNotFound(name)) => {
                tracing::warn!("Device '{}' not found.", name);
                None
            }
            Err(e) => {
                tracing::warn!("Playback of {:?} skipped: {}", path, e);
                None
            }
        }
    }
}

/// Factory function for the production audio adapter
pub fn create_adapter(config: &AudioConfig) -> Box<dyn AudioAdapter> {
    Box::new(CpalAudio::new(config))
}
