//! Timestamp-paced player.
//!
//! For each frame: present it, then sleep for the gap between its recorded
//! timestamp and the previous frame's (clamped at zero). Processing time is
//! not subtracted, so playback runs at or slightly below recorded speed.

use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::loader::ReplayMessage;
use crate::error::{Error, Result};
use crate::preview::{FrameSink, SinkControl};

const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStopReason {
    /// Every playable frame was presented.
    Completed,
    /// The cancel flag was raised.
    Cancelled,
    /// The sink asked to stop.
    SinkRequested,
}

#[derive(Clone, Debug)]
pub struct PlaybackReport {
    pub frames_presented: u64,
    pub elapsed: Duration,
    pub stop_reason: PlaybackStopReason,
}

pub struct ReplayPlayer {
    sink: Box<dyn FrameSink>,
    cancel: Arc<AtomicBool>,
}

impl ReplayPlayer {
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Play until the loader sends `End`, fails, or playback is cancelled.
    /// Dropping `rx` on return stops the loader.
    pub fn run(&mut self, rx: Receiver<ReplayMessage>) -> Result<PlaybackReport> {
        let started = Instant::now();
        let mut presented = 0u64;
        let mut previous: Option<f64> = None;

        let stop_reason = loop {
            if self.cancelled() {
                break PlaybackStopReason::Cancelled;
            }
            let frame = match rx.recv() {
                Ok(ReplayMessage::Frame(frame)) => frame,
                Ok(ReplayMessage::Failed(err)) => return Err(err),
                Ok(ReplayMessage::End) => break PlaybackStopReason::Completed,
                Err(_) => return Err(Error::WorkerPanicked("replay loader")),
            };

            let control = self.sink.present(&frame);
            presented += 1;
            if control == SinkControl::Stop {
                break PlaybackStopReason::SinkRequested;
            }

            if let Some(prev) = previous {
                let delay = frame.timestamp - prev;
                if delay > 0.0 {
                    let gap = Duration::try_from_secs_f64(delay).map_err(|_| {
                        Error::InvalidTimestampGap {
                            sequence: frame.sequence,
                            seconds: delay,
                        }
                    })?;
                    self.sleep(gap);
                }
            }
            previous = Some(frame.timestamp);
        };

        let report = PlaybackReport {
            frames_presented: presented,
            elapsed: started.elapsed(),
            stop_reason,
        };
        log::info!(
            "replay finished: frames={} elapsed={:.3}s reason={:?}",
            report.frames_presented,
            report.elapsed.as_secs_f64(),
            report.stop_reason
        );
        Ok(report)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.cancelled() {
                return;
            }
            std::thread::sleep(remaining.min(CANCEL_POLL));
        }
    }
}
