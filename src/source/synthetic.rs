//! Synthetic frame source (`stub://`) for tests and headless demos.
//!
//! Produces BGRA color and uint16 depth planes with a moving gradient so
//! consecutive frames differ. Can pace itself at the configured frame rate,
//! inject empty captures, and end the stream after a fixed number of frames.

use rand::Rng;
use std::time::{Duration, Instant};

use super::{DeviceInfo, DeviceOptions, FrameSource};
use crate::error::{Error, Result};
use crate::frame::{CapturePair, ElementType, Plane, Shape};

/// Where the synthetic planes get their geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum SyntheticLayout {
    /// Follow `DeviceOptions` passed to `configure`.
    FromOptions,
    /// Fixed shapes; `None` omits that channel. Color must be `(h, w, c)` uint8,
    /// depth `(h, w)` uint16.
    Fixed {
        color: Option<Shape>,
        depth: Option<Shape>,
    },
}

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub serial_number: String,
    pub layout: SyntheticLayout,
    /// Sleep between captures to emulate the sensor frame interval.
    pub pace: bool,
    /// After this many successful captures the source reports a terminal error.
    pub frame_limit: Option<u64>,
    /// Every Nth call returns `NullCapture` instead of a frame.
    pub null_every: Option<u64>,
    /// Depth values sweep between these bounds (millimetres).
    pub depth_range_mm: (u16, u16),
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            serial_number: "STUB-000000000000".to_string(),
            layout: SyntheticLayout::FromOptions,
            pace: true,
            frame_limit: None,
            null_every: None,
            depth_range_mm: (400, 1200),
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    color_shape: Option<Shape>,
    depth_shape: Option<Shape>,
    interval: Duration,
    streaming: bool,
    calls: u64,
    frames_captured: u64,
    last_capture: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let (color_shape, depth_shape) = match &config.layout {
            SyntheticLayout::FromOptions => {
                let defaults = DeviceOptions::default();
                (defaults.color_shape(), defaults.depth_shape())
            }
            SyntheticLayout::Fixed { color, depth } => (color.clone(), depth.clone()),
        };
        Self {
            config,
            color_shape,
            depth_shape,
            interval: Duration::from_secs(1) / super::options::DEFAULT_FPS,
            streaming: false,
            calls: 0,
            frames_captured: 0,
            last_capture: None,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn wait_for_slot(&mut self, timeout: Option<Duration>) -> Result<()> {
        if !self.config.pace {
            return Ok(());
        }
        let Some(last) = self.last_capture else {
            return Ok(());
        };
        let wait = self.interval.saturating_sub(last.elapsed());
        match timeout {
            Some(limit) if wait > limit => {
                std::thread::sleep(limit);
                Err(Error::CaptureTimeout(limit))
            }
            _ => {
                std::thread::sleep(wait);
                Ok(())
            }
        }
    }

    fn color_plane(&self, shape: &Shape) -> Result<Plane> {
        let len = shape.element_count().unwrap_or(0);
        let frame = self.frames_captured;
        let data = (0..len)
            .map(|i| ((i as u64 + frame * 3) % 256) as u8)
            .collect();
        Plane::new(shape.clone(), ElementType::Uint8, data)
    }

    fn depth_plane(&self, shape: &Shape) -> Result<Plane> {
        let (lo, hi) = self.config.depth_range_mm;
        let span = hi.saturating_sub(lo).max(1) as u64;
        let len = shape.element_count().unwrap_or(0);
        let frame = self.frames_captured;
        let mut rng = rand::thread_rng();
        let values: Vec<u16> = (0..len)
            .map(|i| {
                let ramp = (i as u64 + frame * 7) % span;
                lo.saturating_add(ramp as u16)
                    .saturating_add(rng.gen_range(0..4))
            })
            .collect();
        Plane::from_u16(shape.clone(), &values)
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            serial_number: self.config.serial_number.clone(),
            hardware_version: "synthetic".to_string(),
            color_controls: "exposure(manual) gain(manual) white_balance(manual)".to_string(),
        }
    }

    fn configure(&mut self, options: &DeviceOptions) -> Result<()> {
        options.validate()?;
        if self.config.layout == SyntheticLayout::FromOptions {
            self.color_shape = options.color_shape();
            self.depth_shape = options.depth_shape();
        }
        self.interval = Duration::from_secs(1) / options.fps.max(1);
        log::info!(
            "SyntheticSource: exposure={}us gain={} white_balance={}K fps={} sync={:?}",
            options.exposure_time_usec,
            options.gain,
            options.white_balance_kelvin,
            options.fps,
            options.sync_mode
        );
        Ok(())
    }

    fn start_streaming(&mut self) -> Result<()> {
        self.streaming = true;
        Ok(())
    }

    fn next_capture(&mut self, timeout: Option<Duration>) -> Result<CapturePair> {
        if !self.streaming {
            return Err(Error::CaptureTerminal("source is not streaming".into()));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frames_captured >= limit {
                return Err(Error::CaptureTerminal(format!(
                    "synthetic stream ended after {} frames",
                    limit
                )));
            }
        }

        self.calls += 1;
        if let Some(n) = self.config.null_every {
            if n > 0 && self.calls % n == 0 {
                return Err(Error::NullCapture);
            }
        }

        self.wait_for_slot(timeout)?;

        let color = self
            .color_shape
            .as_ref()
            .map(|shape| self.color_plane(shape))
            .transpose()?;
        let depth = self
            .depth_shape
            .as_ref()
            .map(|shape| self.depth_plane(shape))
            .transpose()?;

        self.frames_captured += 1;
        self.last_capture = Some(Instant::now());
        Ok(CapturePair { color, depth })
    }

    fn stop_streaming(&mut self) {
        if self.streaming {
            log::info!(
                "SyntheticSource: stopped after {} frames",
                self.frames_captured
            );
        }
        self.streaming = false;
    }

    fn calibration(&self) -> Option<String> {
        Some(
            "extrinsics: rotation=[[1,0,0][0,0.9951,0.0988][0,-0.0988,0.9951]] \
             translation=[-32.1,-2.0,3.9] intrinsics: type=brown_conrady \
             parameters=cx=638.2, cy=366.4, fx=605.9, fy=605.7, k1=0.51, k2=-2.81, \
             k3=1.62, k4=0.39, k5=-2.63, k6=1.54"
                .to_string(),
        )
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
