//! Digital input sampling for the hook and play buttons
//!
//! Both buttons are wired active-low against the internal pull-ups: an
//! unpressed (on-hook) line reads high. The sampler reports raw
//! instantaneous levels; the state machine re-samples every tick, so no
//! debouncing or edge detection happens here.

use crate::config::GpioConfig;
use crate::error::GpioError;
use rppal::gpio::{Gpio, InputPin};

/// The two input lines the controller watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Receiver hook switch, doubles as the record button
    Hook,
    /// Playback request button
    Play,
}

/// Instantaneous logic-level reads of the two lines.
///
/// true = idle/unpressed (pulled up), false = active/pressed.
/// A read failure is fatal for the whole process: once the pins are
/// configured, hardware access is assumed to stay available.
pub trait InputSampler: Send {
    fn read_line(&mut self, line: Line) -> Result<bool, GpioError>;
}

/// rppal-backed sampler holding both pins for the process lifetime.
///
/// Pins are configured once at startup and reset to their default state
/// when the sampler is dropped.
pub struct GpioSampler {
    hook: InputPin,
    play: InputPin,
}

impl GpioSampler {
    pub fn new(config: &GpioConfig) -> Result<Self, GpioError> {
        let gpio = Gpio::new()?;

        let hook = gpio
            .get(config.hook_pin)
            .map_err(|e| GpioError::PinSetup {
                pin: config.hook_pin,
                reason: e.to_string(),
            })?
            .into_input_pullup();

        let play = gpio
            .get(config.play_pin)
            .map_err(|e| GpioError::PinSetup {
                pin: config.play_pin,
                reason: e.to_string(),
            })?
            .into_input_pullup();

        tracing::debug!(
            "GPIO lines configured: hook=BCM{}, play=BCM{}",
            config.hook_pin,
            config.play_pin
        );

        Ok(Self { hook, play })
    }
}

impl InputSampler for GpioSampler {
    fn read_line(&mut self, line: Line) -> Result<bool, GpioError> {
        let pin = match line {
            Line::Hook => &self.hook,
            Line::Play => &self.play,
        };
        Ok(pin.is_high())
    }
}
