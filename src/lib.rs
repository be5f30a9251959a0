//! Ansaphone: a two-button GPIO answering machine for Raspberry Pi
//!
//! This library provides the core functionality for:
//! - Sampling the hook and play buttons via GPIO (rppal, active-low pull-ups)
//! - Capturing messages via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Playing the greeting and stored messages via rodio on a named device
//! - Persisting messages as timestamped mono 16-bit WAV files (hound)
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐   raw levels    ┌──────────────┐
//!          │     GPIO     │ ──────────────▶ │    State     │
//!          │   (rppal)    │   every tick    │   Machine    │
//!          └──────────────┘                 └──────────────┘
//!                                              │        │
//!                              capture chunks  │        │  play / wait
//!                                              ▼        ▼
//!                                     ┌──────────────┐ ┌──────────────┐
//!                                     │    Audio     │ │    Device    │
//!                                     │ (cpal/rodio) │ │   Locator    │
//!                                     └──────────────┘ └──────────────┘
//!                                              │
//!                                              ▼ recording buffer
//!                                     ┌──────────────┐
//!                                     │    Store     │
//!                                     │ (hound WAVs) │
//!                                     └──────────────┘
//! ```
//!
//! Hook active with the play line idle means "record a new message":
//! the greeting is fired off and capture runs until the receiver goes
//! back on the hook. Hook and play both active means "play back the
//! last message".

pub mod audio;
pub mod config;
pub mod device;
pub mod error;
pub mod gpio;
pub mod machine;
pub mod store;

pub use config::Config;
pub use error::{AnsaphoneError, Result};
pub use machine::{Machine, MachineState};
