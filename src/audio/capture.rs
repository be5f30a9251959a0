//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input. cpal::Stream is
//! not Send, so the stream lives on a dedicated thread and feeds sample
//! chunks over a bounded channel. The consumer assembles fixed-size
//! chunks from whatever buffer sizes the hardware delivers; callbacks
//! that cannot be queued are counted and surfaced as an overflow on the
//! next read.

use super::{AudioChunk, CaptureStream};
use crate::config::AudioConfig;
use crate::error::AudioError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

/// Parameters for building an audio input stream
struct StreamBuildParams {
    tx: mpsc::Sender<Vec<i16>>,
    dropped: Arc<AtomicUsize>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// Capture stream backed by a cpal input stream on its own thread
pub struct CpalCaptureStream {
    rx: mpsc::Receiver<Vec<i16>>,
    pending: VecDeque<i16>,
    dropped: Arc<AtomicUsize>,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    sample_rate: u32,
}

impl CpalCaptureStream {
    /// Open the default input device at the configured sample rate.
    ///
    /// Fails if no input device exists or its configuration cannot be
    /// queried; stream errors after that point are logged from the
    /// capture thread and surface as a closed channel on read.
    pub(crate) fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::debug!("Capturing from: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let source_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let sample_format = supported_config.sample_format();
        let target_rate = config.sample_rate;

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_rate,
            source_channels,
            sample_format
        );

        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<i16>>(64);
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let dropped = Arc::new(AtomicUsize::new(0));
        let dropped_cb = dropped.clone();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let make_params = || StreamBuildParams {
                tx: chunk_tx.clone(),
                dropped: dropped_cb.clone(),
                source_rate,
                target_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, make_params(), err_fn)
                }
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build capture stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start capture stream: {}", e);
                return;
            }

            tracing::debug!("Capture thread started");

            // Block until stop is requested or the stream owner goes away.
            let _ = stop_rx.recv();
            drop(stream);

            tracing::debug!("Capture thread stopped");
        });

        Ok(Self {
            rx: chunk_rx,
            pending: VecDeque::new(),
            dropped,
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
            sample_rate: target_rate,
        })
    }
}

#[async_trait::async_trait]
impl CaptureStream for CpalCaptureStream {
    async fn read(&mut self, frames: usize) -> Result<AudioChunk, AudioError> {
        while self.pending.len() < frames {
            match self.rx.recv().await {
                Some(samples) => self.pending.extend(samples),
                None => {
                    // Producer went away mid-session.
                    if self.pending.is_empty() {
                        return Err(AudioError::StreamError(
                            "capture stream closed".to_string(),
                        ));
                    }
                    break;
                }
            }
        }

        let take = frames.min(self.pending.len());
        let samples: Vec<i16> = self.pending.drain(..take).collect();

        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!("Capture overflow: {} samples dropped", dropped);
        }

        Ok(AudioChunk {
            samples,
            sample_rate: self.sample_rate,
            overflowed: dropped > 0,
        })
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        tx,
        dropped,
        source_rate,
        target_rate,
        source_channels,
    } = params;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                // Convert to f32 and mix to mono
                let mono_f32: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                // Resample if needed
                let resampled = if source_rate != target_rate {
                    resample(&mono_f32, source_rate, target_rate)
                } else {
                    mono_f32
                };

                let samples: Vec<i16> = resampled.iter().map(|&s| f32_to_i16(s)).collect();

                // Queue for the consumer; count what does not fit.
                let len = samples.len();
                if tx.try_send(samples).is_err() {
                    dropped.fetch_add(len, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Linear interpolation resampling
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };

        output.push(sample);
    }

    output
}
