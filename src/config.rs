//! Configuration loading and types for ansaphone
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults (matching the original hardware install)
//! 2. Config file (~/.config/ansaphone/config.toml)
//! 3. CLI arguments (highest priority)

use crate::error::AnsaphoneError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Ansaphone Configuration
#
# Location: ~/.config/ansaphone/config.toml
# All settings can be overridden via CLI flags

[gpio]
# BCM pin numbers for the two buttons. Both lines are sampled as
# active-low inputs with the internal pull-up enabled: an unpressed
# (on-hook) line reads high.
hook_pin = 21
play_pin = 20

# Polling interval of the main loop in milliseconds
poll_interval_ms = 100

[audio]
# Playback device name prefix (case-sensitive, first enumerated match wins)
# List devices with: ansaphone devices
output_device = "Logitech USB Headset"

# Recording sample rate in Hz (mono, 16-bit PCM)
sample_rate = 44100

# Samples fetched from the capture stream per read
chunk_frames = 1024

[storage]
# Directory holding the greeting and all recordings.
# Defaults to the working directory of the process.
# dir = "/home/pi/ansaphone"

# Recording filename prefix: {prefix}_YYYYMMDD_HHMMSS.wav
prefix = "recording"

# Greeting file played when the receiver is picked up
greeting = "hello.wav"
"#;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gpio: GpioConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Digital input configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpioConfig {
    /// BCM pin number of the hook switch (doubles as the record button)
    #[serde(default = "default_hook_pin")]
    pub hook_pin: u8,

    /// BCM pin number of the playback button
    #[serde(default = "default_play_pin")]
    pub play_pin: u8,

    /// Polling interval of the main loop in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl GpioConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Audio capture and playback configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Playback device name prefix, matched case-sensitively against
    /// cpal's enumeration order. Capture always uses the default device.
    #[serde(default = "default_output_device")]
    pub output_device: String,

    /// Recording sample rate in Hz (mono, 16-bit PCM)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples fetched from the capture stream per read
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,
}

/// Recording store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the greeting and all recordings
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,

    /// Recording filename prefix
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Greeting file played when the receiver is picked up
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_hook_pin() -> u8 {
    21
}

fn default_play_pin() -> u8 {
    20
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_output_device() -> String {
    "Logitech USB Headset".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_chunk_frames() -> usize {
    1024
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_prefix() -> String {
    "recording".to_string()
}

fn default_greeting() -> String {
    "hello.wav".to_string()
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            hook_pin: default_hook_pin(),
            play_pin: default_play_pin(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: default_output_device(),
            sample_rate: default_sample_rate(),
            chunk_frames: default_chunk_frames(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            prefix: default_prefix(),
            greeting: default_greeting(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ansaphone")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, AnsaphoneError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| AnsaphoneError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| AnsaphoneError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    Ok(config)
}

/// Write the default config file if it does not exist yet
pub fn init_config_file(path: &Path) -> Result<bool, AnsaphoneError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AnsaphoneError::Config(format!("Failed to create config dir: {}", e)))?;
    }
    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| AnsaphoneError::Config(format!("Failed to write config: {}", e)))?;
    Ok(true)
}
