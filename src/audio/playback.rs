//! File playback on a named output device
//!
//! Resolves the device by name prefix, decodes the file with rodio, and
//! renders it on a dedicated thread (rodio's OutputStream is not Send).
//! The returned handle resolves when the sink drains; dropping the handle
//! leaves the sound playing.

use super::PlaybackHandle;
use crate::device;
use crate::error::AudioError;
use rodio::{Decoder, OutputStream, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use tokio::sync::oneshot;

/// Start playback of `path` on the first output device matching
/// `device_prefix`. Device resolution and decoding happen up front so
/// those failures surface before any thread spawns.
pub(crate) fn start(path: &Path, device_prefix: &str) -> Result<PlaybackHandle, AudioError> {
    let host = cpal::default_host();
    let device = device::find_output_device(&host, device_prefix)?;

    let file = File::open(path).map_err(|e| AudioError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let (done_tx, done_rx) = oneshot::channel();
    let path_label = path.display().to_string();

    thread::spawn(move || {
        let (_stream, stream_handle) = match OutputStream::try_from_device(&device) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!("Failed to open output stream: {}", e);
                return;
            }
        };

        let sink = match Sink::try_new(&stream_handle) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to create audio sink: {}", e);
                return;
            }
        };

        sink.append(source);
        sink.sleep_until_end();

        tracing::debug!("Playback of {} finished", path_label);
        let _ = done_tx.send(());
    });

    Ok(PlaybackHandle::new(done_rx))
}
