use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::preview::{DepthColormap, DEFAULT_DEPTH_MAX_MM, DEFAULT_DEPTH_MIN_MM};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::source::{ColorResolution, DepthMode, DeviceOptions, SyncMode};

const DEFAULT_OUTPUT_ROOT: &str = "image_sequence";
const DEFAULT_SESSION_PREFIX: &str = "kinect";
const DEFAULT_DEVICE: &str = "stub://kinect";
const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_REPLAY_LOOKAHEAD: usize = 10;

#[derive(Debug, Deserialize, Default)]
struct RecorderConfigFile {
    output_root: Option<PathBuf>,
    session_prefix: Option<String>,
    device: Option<String>,
    capture: Option<CaptureConfigFile>,
    camera: Option<CameraConfigFile>,
    preview: Option<PreviewConfigFile>,
    replay: Option<ReplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    queue_capacity: Option<usize>,
    timeout_ms: Option<u64>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    exposure_time_usec: Option<u32>,
    gain: Option<u32>,
    white_balance_kelvin: Option<u32>,
    color_resolution: Option<ColorResolution>,
    fps: Option<u32>,
    depth_mode: Option<DepthMode>,
    sync_mode: Option<SyncMode>,
    synchronized_images_only: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct PreviewConfigFile {
    depth_min: Option<f64>,
    depth_max: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ReplayConfigFile {
    lookahead: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub output_root: PathBuf,
    pub session_prefix: String,
    pub device: String,
    pub queue_capacity: usize,
    /// `None` waits indefinitely for each capture.
    pub capture_timeout: Option<Duration>,
    pub max_frames: Option<u64>,
    pub device_options: DeviceOptions,
    pub depth_range: (f64, f64),
    pub replay_lookahead: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from_file(RecorderConfigFile::default())
    }
}

impl RecorderConfig {
    /// Load from `DEPTHREC_CONFIG` (if set), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DEPTHREC_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn colormap(&self) -> Result<DepthColormap> {
        DepthColormap::new(self.depth_range.0, self.depth_range.1)
    }

    fn from_file(file: RecorderConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let preview = file.preview.unwrap_or_default();
        let defaults = DeviceOptions::default();

        let device_options = DeviceOptions {
            exposure_time_usec: camera
                .exposure_time_usec
                .unwrap_or(defaults.exposure_time_usec),
            gain: camera.gain.unwrap_or(defaults.gain),
            white_balance_kelvin: camera
                .white_balance_kelvin
                .unwrap_or(defaults.white_balance_kelvin),
            color_resolution: camera.color_resolution.unwrap_or(defaults.color_resolution),
            fps: camera.fps.unwrap_or(defaults.fps),
            depth_mode: camera.depth_mode.unwrap_or(defaults.depth_mode),
            sync_mode: camera.sync_mode.unwrap_or(defaults.sync_mode),
            synchronized_images_only: camera
                .synchronized_images_only
                .unwrap_or(defaults.synchronized_images_only),
        };

        Self {
            output_root: file
                .output_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            session_prefix: file
                .session_prefix
                .unwrap_or_else(|| DEFAULT_SESSION_PREFIX.to_string()),
            device: file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            queue_capacity: capture.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            capture_timeout: timeout_from_ms(
                capture.timeout_ms.unwrap_or(DEFAULT_CAPTURE_TIMEOUT_MS),
            ),
            max_frames: capture.max_frames,
            device_options,
            depth_range: (
                preview.depth_min.unwrap_or(DEFAULT_DEPTH_MIN_MM),
                preview.depth_max.unwrap_or(DEFAULT_DEPTH_MAX_MM),
            ),
            replay_lookahead: file
                .replay
                .and_then(|replay| replay.lookahead)
                .unwrap_or(DEFAULT_REPLAY_LOOKAHEAD),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("DEPTHREC_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_root = PathBuf::from(dir);
            }
        }
        if let Ok(prefix) = std::env::var("DEPTHREC_SESSION_PREFIX") {
            if !prefix.trim().is_empty() {
                self.session_prefix = prefix.trim().to_string();
            }
        }
        if let Ok(device) = std::env::var("DEPTHREC_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device.trim().to_string();
            }
        }
        if let Ok(capacity) = std::env::var("DEPTHREC_QUEUE_CAPACITY") {
            self.queue_capacity = parse_env("DEPTHREC_QUEUE_CAPACITY", &capacity)?;
        }
        if let Ok(timeout) = std::env::var("DEPTHREC_CAPTURE_TIMEOUT_MS") {
            self.capture_timeout =
                timeout_from_ms(parse_env("DEPTHREC_CAPTURE_TIMEOUT_MS", &timeout)?);
        }
        if let Ok(max_frames) = std::env::var("DEPTHREC_MAX_FRAMES") {
            self.max_frames = if max_frames.trim().is_empty() {
                None
            } else {
                Some(parse_env("DEPTHREC_MAX_FRAMES", &max_frames)?)
            };
        }
        if let Ok(range) = std::env::var("DEPTHREC_DEPTH_RANGE") {
            self.depth_range = parse_depth_range(&range)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".into()));
        }
        if self.replay_lookahead == 0 {
            return Err(Error::Config("replay lookahead must be at least 1".into()));
        }
        if self.session_prefix.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "session prefix '{}' must not contain path separators",
                self.session_prefix
            )));
        }
        self.colormap()?;
        self.device_options.validate()
    }
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}

/// Parse `"min,max"` in millimetres.
pub fn parse_depth_range(value: &str) -> Result<(f64, f64)> {
    let bad = || Error::Config(format!("depth range must be 'min,max', got '{}'", value));
    let (min, max) = value.split_once(',').ok_or_else(bad)?;
    let min: f64 = min.trim().parse().map_err(|_| bad())?;
    let max: f64 = max.trim().parse().map_err(|_| bad())?;
    Ok((min, max))
}

fn read_config_file(path: &Path) -> Result<RecorderConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))
    }
}
