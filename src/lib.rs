//! Depth Recorder
//!
//! Records synchronized color + depth frames from an RGB-D camera to a
//! session directory and replays them at their recorded pace.
//!
//! # Architecture
//!
//! Recording runs two workers joined by a bounded queue:
//!
//! 1. **Capture** blocks on the camera, stamps each frame with a monotonic
//!    timestamp and a gap-free sequence number, and never waits on storage.
//!    When the queue is full the oldest frame is evicted.
//! 2. **Persist** drains the queue and writes raw planes to disk, describing
//!    each channel's shape and dtype once in `metadata.txt`.
//!
//! Replay reads the session back with a small lookahead and presents frames
//! spaced by their recorded timestamp deltas.
//!
//! # Module Structure
//!
//! - `frame`: planes, channels and element types
//! - `queue`: bounded drop-oldest queue
//! - `source`: `FrameSource` trait, device options, synthetic `stub://` source
//! - `session`, `metadata`, `timelog`: on-disk session format
//! - `capture`, `persist`, `recorder`: the recording pipeline
//! - `replay`: loader and paced player
//! - `preview`: visualization hook, depth colormap, PNG snapshots
//! - `calibration`: calibration dump parser
//! - `config`: file + environment configuration

pub mod calibration;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod persist;
pub mod preview;
pub mod queue;
pub mod recorder;
pub mod replay;
pub mod session;
pub mod source;
pub mod timelog;

pub use calibration::{parse_calibration, Calibration, Extrinsics, Intrinsics};
pub use capture::{
    CaptureLoop, CaptureReport, CaptureSettings, CaptureState, MonotonicClock, SequenceGenerator,
    StopReason,
};
pub use config::RecorderConfig;
pub use error::{Error, Result};
pub use frame::{CapturePair, Channel, ElementType, Frame, Plane, Shape};
pub use metadata::{ChannelMetadata, SessionMetadata};
pub use persist::{PersistLoop, PersistReport};
pub use preview::{bgra_to_rgb, DepthColormap, FrameSink, NullSink, SinkControl, SnapshotSink};
pub use queue::{BoundedFrameQueue, PushOutcome, DEFAULT_QUEUE_CAPACITY};
pub use recorder::{Recorder, RecorderSettings, RecordingSummary};
pub use replay::{
    replay_session, PlaybackReport, PlaybackStopReason, ReplayLoader, ReplayMessage, ReplayPlayer,
};
pub use session::RecordingSession;
pub use source::{open_source, DeviceInfo, DeviceOptions, FrameSource};
pub use timelog::{TimestampLog, TimestampRecord};
