//! Device configuration record handed to `FrameSource::configure`.
//!
//! Defaults match a wall-powered depth camera recording BGRA32 color at 1080p
//! and unbinned narrow-FOV depth at 30 fps, with manual exposure, gain and
//! white balance.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::frame::Shape;

pub const DEFAULT_EXPOSURE_TIME_USEC: u32 = 8330;
pub const DEFAULT_GAIN: u32 = 128;
pub const DEFAULT_WHITE_BALANCE_KELVIN: u32 = 4500;
pub const DEFAULT_FPS: u32 = 30;

/// Bytes per color pixel (BGRA32).
pub const COLOR_CHANNELS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorResolution {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "720p")]
    Res720p,
    #[serde(rename = "1080p")]
    Res1080p,
    #[serde(rename = "1440p")]
    Res1440p,
    #[serde(rename = "1536p")]
    Res1536p,
    #[serde(rename = "2160p")]
    Res2160p,
    #[serde(rename = "3072p")]
    Res3072p,
}

impl ColorResolution {
    /// `(width, height)` in pixels.
    pub fn dimensions(self) -> Option<(usize, usize)> {
        match self {
            ColorResolution::Off => None,
            ColorResolution::Res720p => Some((1280, 720)),
            ColorResolution::Res1080p => Some((1920, 1080)),
            ColorResolution::Res1440p => Some((2560, 1440)),
            ColorResolution::Res1536p => Some((2048, 1536)),
            ColorResolution::Res2160p => Some((3840, 2160)),
            ColorResolution::Res3072p => Some((4096, 3072)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    Off,
    NfovBinned,
    NfovUnbinned,
    WfovBinned,
    WfovUnbinned,
    PassiveIr,
}

impl DepthMode {
    /// `(width, height)` in pixels.
    pub fn dimensions(self) -> Option<(usize, usize)> {
        match self {
            DepthMode::Off => None,
            DepthMode::NfovBinned => Some((320, 288)),
            DepthMode::NfovUnbinned => Some((640, 576)),
            DepthMode::WfovBinned => Some((512, 512)),
            DepthMode::WfovUnbinned | DepthMode::PassiveIr => Some((1024, 1024)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Standalone,
    Master,
    Subordinate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceOptions {
    pub exposure_time_usec: u32,
    pub gain: u32,
    pub white_balance_kelvin: u32,
    pub color_resolution: ColorResolution,
    pub fps: u32,
    pub depth_mode: DepthMode,
    pub sync_mode: SyncMode,
    pub synchronized_images_only: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            exposure_time_usec: DEFAULT_EXPOSURE_TIME_USEC,
            gain: DEFAULT_GAIN,
            white_balance_kelvin: DEFAULT_WHITE_BALANCE_KELVIN,
            color_resolution: ColorResolution::Res1080p,
            fps: DEFAULT_FPS,
            depth_mode: DepthMode::NfovUnbinned,
            sync_mode: SyncMode::Standalone,
            synchronized_images_only: true,
        }
    }
}

impl DeviceOptions {
    /// Color plane shape `(height, width, 4)`, BGRA32.
    pub fn color_shape(&self) -> Option<Shape> {
        self.color_resolution
            .dimensions()
            .map(|(w, h)| Shape::new(vec![h, w, COLOR_CHANNELS]))
    }

    /// Depth plane shape `(height, width)`, uint16 millimetres.
    pub fn depth_shape(&self) -> Option<Shape> {
        self.depth_mode
            .dimensions()
            .map(|(w, h)| Shape::new(vec![h, w]))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=200_000).contains(&self.exposure_time_usec) {
            return Err(Error::Config(format!(
                "exposure_time_usec {} outside 1..=200000",
                self.exposure_time_usec
            )));
        }
        if self.gain > 255 {
            return Err(Error::Config(format!("gain {} outside 0..=255", self.gain)));
        }
        if !(2500..=12500).contains(&self.white_balance_kelvin)
            || self.white_balance_kelvin % 10 != 0
        {
            return Err(Error::Config(format!(
                "white_balance_kelvin {} must be 2500..=12500 in steps of 10",
                self.white_balance_kelvin
            )));
        }
        if ![5, 15, 30].contains(&self.fps) {
            return Err(Error::Config(format!("fps {} must be 5, 15 or 30", self.fps)));
        }
        if self.fps == 30
            && (self.color_resolution == ColorResolution::Res3072p
                || self.depth_mode == DepthMode::WfovUnbinned)
        {
            return Err(Error::Config(
                "30 fps is not available with 3072p color or unbinned wide-FOV depth".into(),
            ));
        }
        if self.color_resolution == ColorResolution::Off && self.depth_mode == DepthMode::Off {
            return Err(Error::Config("color and depth cannot both be off".into()));
        }
        if self.synchronized_images_only
            && (self.color_resolution == ColorResolution::Off || self.depth_mode == DepthMode::Off)
        {
            return Err(Error::Config(
                "synchronized_images_only requires both color and depth".into(),
            ));
        }
        Ok(())
    }
}
