//! Error taxonomy for recording and replay.
//!
//! Capture-side transient failures (`CaptureTimeout`, `NullCapture`) are
//! recovered inside the capture loop. Everything else surfaces to the caller.
//! Queue overflow is not an error: `BoundedFrameQueue::push` hands back the
//! evicted frame and the capture loop counts it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::frame::Channel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),

    #[error("capture timed out after {0:?}")]
    CaptureTimeout(Duration),

    #[error("source returned an empty capture")]
    NullCapture,

    #[error("capture source failed: {0}")]
    CaptureTerminal(String),

    #[error("missing {channel} data for frame {sequence} ({})", path.display())]
    MissingFrameData {
        channel: Channel,
        sequence: u64,
        path: PathBuf,
    },

    #[error("malformed {channel} data for frame {sequence}: expected {expected} bytes, found {actual}")]
    MalformedFrameData {
        channel: Channel,
        sequence: u64,
        expected: usize,
        actual: usize,
    },

    #[error("invalid metadata in {} line {line}: {reason}", path.display())]
    MetadataParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("gap of {seconds}s before frame {sequence} cannot be replayed")]
    InvalidTimestampGap { sequence: u64, seconds: f64 },

    #[error("{channel} plane of frame {sequence} does not match the session metadata")]
    ShapeMismatch { channel: Channel, sequence: u64 },

    #[error("invalid plane: {0}")]
    InvalidPlane(String),

    #[error("invalid calibration data: {0}")]
    Calibration(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} worker thread panicked")]
    WorkerPanicked(&'static str),
}

impl Error {
    /// Transient capture failures are logged and the capture loop continues.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::CaptureTimeout(_) | Error::NullCapture)
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn metadata(path: &Path, line: usize, reason: impl Into<String>) -> Self {
        Error::MetadataParse {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}
