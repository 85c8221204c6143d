//! Two-worker recording pipeline.
//!
//! `Recorder::start` spawns a capture thread and a persist thread sharing a
//! bounded drop-oldest queue and a cooperative stop flag. `stop` raises the
//! flag; `join` waits for capture to close the queue and for persist to
//! drain it, then reports both sides.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::{CaptureLoop, CaptureReport, CaptureSettings, CaptureState, StateCell};
use crate::config::RecorderConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::persist::{PersistLoop, PersistReport};
use crate::preview::FrameSink;
use crate::queue::BoundedFrameQueue;
use crate::session::RecordingSession;
use crate::source::FrameSource;
use crate::timelog::TimestampLog;

#[derive(Clone, Debug)]
pub struct RecorderSettings {
    pub queue_capacity: usize,
    pub capture: CaptureSettings,
}

impl RecorderSettings {
    pub fn from_config(cfg: &RecorderConfig) -> Self {
        Self {
            queue_capacity: cfg.queue_capacity,
            capture: CaptureSettings {
                timeout: cfg.capture_timeout,
                max_frames: cfg.max_frames,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordingSummary {
    pub session_dir: PathBuf,
    pub capture: CaptureReport,
    pub persist: PersistReport,
}

pub struct Recorder {
    session: RecordingSession,
    queue: Arc<BoundedFrameQueue<Frame>>,
    stop: Arc<AtomicBool>,
    state: Arc<StateCell>,
    capture: JoinHandle<Result<CaptureReport>>,
    persist: JoinHandle<Result<PersistReport>>,
}

impl Recorder {
    /// Start recording into `session`. `source` must already be configured.
    pub fn start(
        source: Box<dyn FrameSource>,
        session: RecordingSession,
        settings: RecorderSettings,
        sink: Box<dyn FrameSink>,
    ) -> Result<Self> {
        let queue = Arc::new(BoundedFrameQueue::new(settings.queue_capacity));
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(StateCell::new(CaptureState::Running));
        let timelog = TimestampLog::create(&session.timestamp_path())?;

        let persist_loop = PersistLoop::new(queue.clone(), session.clone())
            .with_state(state.clone())
            .with_abort_flag(stop.clone());
        let persist = std::thread::Builder::new()
            .name("persist".into())
            .spawn(move || persist_loop.run())
            .map_err(|e| Error::io(session.dir(), e))?;

        let capture_loop = CaptureLoop::new(
            source,
            queue.clone(),
            timelog,
            stop.clone(),
            settings.capture,
        )
        .with_sink(sink)
        .with_state(state.clone());
        let capture = match std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || capture_loop.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                queue.close();
                let _ = persist.join();
                return Err(Error::io(session.dir(), err));
            }
        };

        log::info!(
            "recorder started: session={} queue_capacity={}",
            session.dir().display(),
            queue.capacity()
        );
        Ok(Self {
            session,
            queue,
            stop,
            state,
            capture,
            persist,
        })
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    /// Shared cooperative stop flag (hand it to a signal handler).
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> CaptureState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.capture.is_finished() && self.persist.is_finished()
    }

    /// Wait for both workers. Frames already queued are persisted before
    /// this returns.
    pub fn join(self) -> Result<RecordingSummary> {
        let capture = self.capture.join();
        if capture.is_err() {
            // A panicked capture thread never closed the queue.
            self.queue.close();
        }
        let persist = self.persist.join();
        self.state.set(CaptureState::Stopped);

        let capture = capture.map_err(|_| Error::WorkerPanicked("capture"))??;
        let persist = persist.map_err(|_| Error::WorkerPanicked("persist"))??;
        Ok(RecordingSummary {
            session_dir: self.session.dir().to_path_buf(),
            capture,
            persist,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StopReason;
    use crate::frame::{Channel, Shape};
    use crate::preview::NullSink;
    use crate::source::{SyntheticConfig, SyntheticLayout, SyntheticSource};
    use crate::timelog::read_timestamps;
    use std::time::Duration;

    fn source(pace: bool) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(SyntheticConfig {
            layout: SyntheticLayout::Fixed {
                color: Some(Shape::new(vec![4, 4, 4])),
                depth: Some(Shape::new(vec![4, 4])),
            },
            pace,
            ..SyntheticConfig::default()
        }))
    }

    #[test]
    fn records_until_frame_limit() {
        let root = tempfile::tempdir().unwrap();
        let session = RecordingSession::create_at(root.path().join("s")).unwrap();
        let recorder = Recorder::start(
            source(false),
            session,
            RecorderSettings {
                queue_capacity: 64,
                capture: CaptureSettings {
                    timeout: None,
                    max_frames: Some(40),
                },
            },
            Box::new(NullSink),
        )
        .unwrap();
        let summary = recorder.join().unwrap();

        assert_eq!(summary.capture.captured, 40);
        assert_eq!(summary.capture.stop_reason, StopReason::FrameLimit);
        assert_eq!(
            summary.persist.frames_written + summary.capture.dropped,
            40
        );

        let session = RecordingSession::open(&summary.session_dir).unwrap();
        let records = read_timestamps(&session.timestamp_path()).unwrap();
        assert_eq!(records.len(), 40);
        assert!(session.frame_path(Channel::Depth, 39).exists());
    }

    #[test]
    fn stop_flag_drains_and_stops() {
        let root = tempfile::tempdir().unwrap();
        let session = RecordingSession::create_at(root.path().join("s")).unwrap();
        let recorder = Recorder::start(
            source(true),
            session,
            RecorderSettings {
                queue_capacity: 8,
                capture: CaptureSettings {
                    timeout: Some(Duration::from_millis(500)),
                    max_frames: None,
                },
            },
            Box::new(NullSink),
        )
        .unwrap();
        assert_eq!(recorder.state(), CaptureState::Running);
        std::thread::sleep(Duration::from_millis(150));
        recorder.stop_flag().store(true, Ordering::SeqCst);

        let summary = recorder.join().unwrap();
        assert_eq!(summary.capture.stop_reason, StopReason::StopRequested);
        assert!(summary.capture.captured > 0);
        assert_eq!(
            summary.persist.frames_written + summary.capture.dropped,
            summary.capture.captured
        );
    }
}
