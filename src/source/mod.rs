//! Frame sources.
//!
//! A `FrameSource` wraps a camera SDK (or a synthetic generator) and produces
//! one `CapturePair` per call. Lifecycle: `open_source` -> `configure` ->
//! `start_streaming` -> `next_capture`* -> `stop_streaming`.
//!
//! `next_capture` error contract:
//! - `Error::CaptureTimeout` / `Error::NullCapture`: transient, caller retries
//! - `Error::CaptureTerminal`: the stream is gone, caller stops
//!
//! Only `stub://` devices are built in. Hardware backends implement the trait
//! outside this crate and are passed to `CaptureLoop` directly.

pub mod options;
pub mod synthetic;

use std::time::Duration;

use crate::error::{Error, Result};
use crate::frame::CapturePair;

pub use options::{ColorResolution, DepthMode, DeviceOptions, SyncMode};
pub use synthetic::{SyntheticConfig, SyntheticLayout, SyntheticSource};

/// Identity reported by a device after open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub hardware_version: String,
    /// Human-readable summary of supported color controls.
    pub color_controls: String,
}

pub trait FrameSource: Send {
    fn info(&self) -> DeviceInfo;

    /// Apply exposure/gain/white-balance and stream geometry. Must be called
    /// before `start_streaming`.
    fn configure(&mut self, options: &DeviceOptions) -> Result<()>;

    fn start_streaming(&mut self) -> Result<()>;

    /// Block for the next synchronized capture. `None` waits indefinitely.
    fn next_capture(&mut self, timeout: Option<Duration>) -> Result<CapturePair>;

    fn stop_streaming(&mut self);

    /// Raw calibration dump, if the device exposes one.
    fn calibration(&self) -> Option<String> {
        None
    }
}

/// Open the device named by `device`.
///
/// `stub://<name>` yields a paced synthetic source whose geometry follows the
/// options passed to `configure`.
pub fn open_source(device: &str) -> Result<Box<dyn FrameSource>> {
    if let Some(name) = device.strip_prefix("stub://") {
        let config = SyntheticConfig {
            serial_number: format!("STUB-{}", name),
            ..SyntheticConfig::default()
        };
        log::info!("FrameSource: opened {} (synthetic)", device);
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    Err(Error::DeviceNotFound(format!(
        "no capture backend for '{}' (only stub:// devices are built in)",
        device
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_devices_open() {
        let source = open_source("stub://kinect").unwrap();
        assert_eq!(source.info().serial_number, "STUB-kinect");
    }

    #[test]
    fn unknown_devices_are_not_found() {
        let err = open_source("k4a://0").err().unwrap();
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }
}
