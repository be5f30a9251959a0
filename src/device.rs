//! Output device location
//!
//! Playback devices are matched by name prefix against cpal's enumeration
//! order: case-sensitive, first match wins. The order is whatever the
//! backend reports, which is not guaranteed stable across reboots.
//! Capture always uses the system default input device, so only outputs
//! are located here.

use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait};

/// Index of the first name starting with `prefix`, in enumeration order.
pub(crate) fn match_name<S: AsRef<str>>(names: &[S], prefix: &str) -> Option<usize> {
    names.iter().position(|n| n.as_ref().starts_with(prefix))
}

/// Find the first output device whose name starts with `prefix`.
pub fn find_output_device(host: &cpal::Host, prefix: &str) -> Result<cpal::Device, AudioError> {
    let devices: Vec<cpal::Device> = host
        .output_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let names: Vec<String> = devices
        .iter()
        .map(|d| d.name().unwrap_or_else(|_| "unknown".to_string()))
        .collect();

    match match_name(&names, prefix) {
        Some(idx) => {
            tracing::debug!("Found output device by prefix: {}", names[idx]);
            devices
                .into_iter()
                .nth(idx)
                .ok_or_else(|| AudioError::DeviceNotFound(prefix.to_string()))
        }
        None => Err(AudioError::DeviceNotFound(prefix.to_string())),
    }
}

/// Log every capture and playback device cpal can see.
pub fn log_devices(host: &cpal::Host) {
    match host.input_devices() {
        Ok(devices) => {
            for device in devices {
                let name = device.name().unwrap_or_else(|_| "unknown".to_string());
                tracing::info!("Capture device: {}", name);
            }
        }
        Err(e) => tracing::warn!("Cannot enumerate capture devices: {}", e),
    }

    match host.output_devices() {
        Ok(devices) => {
            for device in devices {
                let name = device.name().unwrap_or_else(|_| "unknown".to_string());
                tracing::info!("Playback device: {}", name);
            }
        }
        Err(e) => tracing::warn!("Cannot enumerate playback devices: {}", e),
    }
}
