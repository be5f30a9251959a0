//! Error types for ansaphone
//!
//! Uses thiserror for ergonomic error definitions. The taxonomy mirrors
//! the fault model of the controller: hardware access problems are fatal,
//! playback-side problems are logged and skipped at the point of detection.

use thiserror::Error;

/// Top-level error type for the ansaphone application
#[derive(Error, Debug)]
pub enum AnsaphoneError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Recording store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the digital input lines
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("Cannot access the GPIO peripheral: {0}\n  Is this running on a Raspberry Pi with /dev/gpiomem readable?")]
    Access(String),

    #[error("Cannot configure BCM pin {pin} as a pull-up input: {reason}")]
    PinSetup { pin: u8, reason: String },
}

/// Errors related to audio capture and playback
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio device not found: '{0}'. List devices with: ansaphone devices")]
    DeviceNotFound(String),

    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Cannot decode audio file {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Errors related to the on-disk recording store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot scan recording directory {dir}: {reason}")]
    Scan { dir: String, reason: String },

    #[error("Cannot write WAV file {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Result type alias using AnsaphoneError
pub type Result<T> = std::result::Result<T, AnsaphoneError>;

impl From<rppal::gpio::Error> for GpioError {
    fn from(e: rppal::gpio::Error) -> Self {
        GpioError::Access(e.to_string())
    }
}
