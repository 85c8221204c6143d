//! Visualization hook.
//!
//! Capture and replay hand every frame to a `FrameSink`. The sink may ask the
//! loop to stop (the equivalent of pressing `q` in a preview window). The
//! built-in sinks are headless: `NullSink` does nothing, `SnapshotSink`
//! writes PNG previews of the color plane and a false-colored depth map.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::frame::{ElementType, Frame, Plane};

pub const DEFAULT_DEPTH_MIN_MM: f64 = 500.0;
pub const DEFAULT_DEPTH_MAX_MM: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Stop,
}

pub trait FrameSink: Send {
    fn present(&mut self, frame: &Frame) -> SinkControl;

    /// `false` lets the capture loop skip copying frames for this sink.
    fn is_active(&self) -> bool {
        true
    }
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame) -> SinkControl + Send,
{
    fn present(&mut self, frame: &Frame) -> SinkControl {
        self(frame)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &Frame) -> SinkControl {
        SinkControl::Continue
    }

    fn is_active(&self) -> bool {
        false
    }
}

// ----------------------------------------------------------------------------
// Depth colormap
// ----------------------------------------------------------------------------

/// Clip depth to `[min, max]`, scale to 0..=255 and false-color with JET.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthColormap {
    pub min: f64,
    pub max: f64,
}

impl Default for DepthColormap {
    fn default() -> Self {
        Self {
            min: DEFAULT_DEPTH_MIN_MM,
            max: DEFAULT_DEPTH_MAX_MM,
        }
    }
}

impl DepthColormap {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::Config(format!(
                "depth range min {} must be below max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Normalized 8-bit intensity for one depth sample.
    pub fn normalize(&self, value: f64) -> u8 {
        let clipped = value.clamp(self.min, self.max);
        ((clipped - self.min) / (self.max - self.min) * 255.0) as u8
    }

    /// Returns `(width, height, rgb)` for an `(h, w)` depth plane.
    pub fn apply(&self, depth: &Plane) -> Result<(u32, u32, Vec<u8>)> {
        let (h, w) = match depth.shape().dims() {
            [h, w] => (*h, *w),
            _ => {
                return Err(Error::InvalidPlane(format!(
                    "depth colormap needs a 2-D plane, got {}",
                    depth.shape()
                )))
            }
        };
        let mut rgb = Vec::with_capacity(h * w * 3);
        for value in depth.values_f64() {
            rgb.extend_from_slice(&jet(self.normalize(value)));
        }
        Ok((w as u32, h as u32, rgb))
    }
}

fn jet(v: u8) -> [u8; 3] {
    let x = v as f64 / 255.0;
    let channel = |center: f64| ((1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Convert an `(h, w, 4)` BGRA or `(h, w, 3)` BGR uint8 plane to packed RGB.
pub fn bgra_to_rgb(color: &Plane) -> Result<(u32, u32, Vec<u8>)> {
    let (h, w, c) = match color.shape().dims() {
        [h, w, c] if (*c == 3 || *c == 4) && color.element_type() == ElementType::Uint8 => {
            (*h, *w, *c)
        }
        _ => {
            return Err(Error::InvalidPlane(format!(
                "expected (h, w, 3|4) uint8 color plane, got {} {}",
                color.shape(),
                color.element_type()
            )))
        }
    };
    let mut rgb = Vec::with_capacity(h * w * 3);
    for px in color.as_bytes().chunks_exact(c) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    Ok((w as u32, h as u32, rgb))
}

// ----------------------------------------------------------------------------
// Snapshot sink
// ----------------------------------------------------------------------------

/// Writes `color_<seq>.png` and `depth_<seq>.png` for every Nth frame.
pub struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    colormap: DepthColormap,
    seen: u64,
    written: u64,
}

impl SnapshotSink {
    pub fn new(dir: &Path, every: u64, colormap: DepthColormap) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            every: every.max(1),
            colormap,
            seen: 0,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn snapshot(&self, frame: &Frame) -> Result<()> {
        if let Some(color) = &frame.color {
            let (w, h, rgb) = bgra_to_rgb(color)?;
            self.save(&format!("color_{:04}.png", frame.sequence), w, h, rgb)?;
        }
        if let Some(depth) = &frame.depth {
            let (w, h, rgb) = self.colormap.apply(depth)?;
            self.save(&format!("depth_{:04}.png", frame.sequence), w, h, rgb)?;
        }
        Ok(())
    }

    fn save(&self, name: &str, width: u32, height: u32, rgb: Vec<u8>) -> Result<()> {
        let path = self.dir.join(name);
        let img = image::RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| Error::InvalidPlane(format!("{}x{} buffer size mismatch", width, height)))?;
        img.save(&path).map_err(|e| {
            Error::io(&path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })
    }
}

impl FrameSink for SnapshotSink {
    fn present(&mut self, frame: &Frame) -> SinkControl {
        self.seen += 1;
        if (self.seen - 1) % self.every == 0 {
            match self.snapshot(frame) {
                Ok(()) => self.written += 1,
                Err(err) => log::warn!("snapshot of frame {} failed: {}", frame.sequence, err),
            }
        }
        SinkControl::Continue
    }
}
