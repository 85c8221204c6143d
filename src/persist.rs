//! Persist loop (consumer side of a recording).
//!
//! Pops frames until the queue is closed and drained. Each present plane is
//! written raw to `<channel dir>/<stem>_<seq>.bin`; the first plane written
//! for a channel fixes that channel's `metadata.txt` line. Later planes that do not
//! match it are rejected and counted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::{CaptureState, StateCell};
use crate::error::{Error, Result};
use crate::frame::{Channel, Frame};
use crate::metadata::{ChannelMetadata, MetadataWriter};
use crate::queue::BoundedFrameQueue;
use crate::session::RecordingSession;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub rejected_planes: u64,
}

pub struct PersistLoop {
    queue: Arc<BoundedFrameQueue<Frame>>,
    session: RecordingSession,
    state: Option<Arc<StateCell>>,
    abort: Option<Arc<AtomicBool>>,
}

impl PersistLoop {
    pub fn new(queue: Arc<BoundedFrameQueue<Frame>>, session: RecordingSession) -> Self {
        Self {
            queue,
            session,
            state: None,
            abort: None,
        }
    }

    /// Mark `state` as `Stopped` once the queue is drained.
    pub fn with_state(mut self, state: Arc<StateCell>) -> Self {
        self.state = Some(state);
        self
    }

    /// Raise `flag` if persisting fails.
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn run(self) -> Result<PersistReport> {
        let result = self.drain();
        if result.is_err() {
            if let Some(flag) = &self.abort {
                flag.store(true, Ordering::SeqCst);
            }
            // Unblock capture-side pushes and let the queue empty out.
            self.queue.close();
            while self.queue.pop().is_some() {}
        }
        if let Some(state) = &self.state {
            state.set(CaptureState::Stopped);
        }
        result
    }

    fn drain(&self) -> Result<PersistReport> {
        let mut metadata = MetadataWriter::create(&self.session.metadata_path())?;
        let mut report = PersistReport::default();

        while let Some(frame) = self.queue.pop() {
            let mut wrote_any = false;
            for channel in Channel::ALL {
                let Some(plane) = frame.plane(channel) else {
                    continue;
                };
                let first = metadata.described(channel).is_none();
                if let Some(known) = metadata.described(channel) {
                    if !plane.matches(&known.shape, known.element_type) {
                        log::error!(
                            "{}; got {} {}, session has {} {}",
                            Error::ShapeMismatch {
                                channel,
                                sequence: frame.sequence
                            },
                            plane.shape(),
                            plane.element_type(),
                            known.shape,
                            known.element_type
                        );
                        report.rejected_planes += 1;
                        continue;
                    }
                }

                let path = self.session.frame_path(channel, frame.sequence);
                std::fs::write(&path, plane.as_bytes()).map_err(|e| Error::io(&path, e))?;
                if first {
                    metadata.describe(ChannelMetadata::for_plane(channel, plane))?;
                }
                report.bytes_written += plane.byte_len() as u64;
                wrote_any = true;
            }
            if wrote_any {
                report.frames_written += 1;
            }
        }

        log::info!(
            "persist finished: frames={} bytes={} rejected_planes={}",
            report.frames_written,
            report.bytes_written,
            report.rejected_planes
        );
        Ok(report)
    }
}
