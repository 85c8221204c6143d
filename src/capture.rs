//! Capture loop (producer side of a recording).
//!
//! Each iteration:
//! 1. Block on `FrameSource::next_capture`
//! 2. Sample the monotonic clock right after a successful capture
//! 3. Assign the next sequence number
//! 4. Push into the bounded queue (drop-oldest on overflow)
//! 5. Append `(sequence, timestamp)` to the timestamp log
//! 6. Hand a copy of the frame to the preview sink, if one is active
//!
//! Every successful capture is logged, including frames the queue later
//! evicts. Replay treats such gaps as missing data.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::frame::Frame;
use crate::preview::{FrameSink, NullSink, SinkControl};
use crate::queue::{BoundedFrameQueue, PushOutcome};
use crate::source::FrameSource;
use crate::timelog::{TimestampLog, TimestampRecord};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Sequence numbers and clock
// ----------------------------------------------------------------------------

/// Hands out strictly increasing sequence numbers, starting at 0.
#[derive(Debug, Default)]
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// The number the next call to `next` will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Monotonic seconds since the clock was started.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

// ----------------------------------------------------------------------------
// Pipeline state
// ----------------------------------------------------------------------------

/// Recording lifecycle shared by the capture and persist workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    /// Capture is producing frames.
    Running,
    /// Capture has stopped and closed the queue; persist is draining it.
    Draining,
    /// Everything queued has been written.
    Stopped,
}

#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> CaptureState {
        match self.0.load(Ordering::SeqCst) {
            0 => CaptureState::Running,
            1 => CaptureState::Draining,
            _ => CaptureState::Stopped,
        }
    }

    pub fn set(&self, state: CaptureState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move from `from` to `to` only if the cell still holds `from`.
    pub fn advance(&self, from: CaptureState, to: CaptureState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

// ----------------------------------------------------------------------------
// Capture loop
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The shared stop flag was raised.
    StopRequested,
    /// The preview sink asked to stop.
    SinkRequested,
    /// `max_frames` captures were taken.
    FrameLimit,
    /// The source reported a terminal error.
    SourceFailed(String),
}

#[derive(Clone, Debug)]
pub struct CaptureReport {
    pub captured: u64,
    pub dropped: u64,
    pub transient_failures: u64,
    pub stop_reason: StopReason,
}

#[derive(Clone, Debug, Default)]
pub struct CaptureSettings {
    /// Per-call wait for the source; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub max_frames: Option<u64>,
}

pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    queue: Arc<BoundedFrameQueue<Frame>>,
    timelog: TimestampLog,
    stop: Arc<AtomicBool>,
    state: Arc<StateCell>,
    settings: CaptureSettings,
    sequence: SequenceGenerator,
    clock: MonotonicClock,
    sink: Box<dyn FrameSink>,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        queue: Arc<BoundedFrameQueue<Frame>>,
        timelog: TimestampLog,
        stop: Arc<AtomicBool>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            source,
            queue,
            timelog,
            stop,
            state: Arc::new(StateCell::new(CaptureState::Running)),
            settings,
            sequence: SequenceGenerator::new(),
            clock: MonotonicClock::start(),
            sink: Box::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_state(mut self, state: Arc<StateCell>) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state.get()
    }

    /// Run until stopped. Always closes the queue and stops the source on the
    /// way out, so a concurrent `PersistLoop` can drain and finish.
    pub fn run(mut self) -> Result<CaptureReport> {
        let mut report = CaptureReport {
            captured: 0,
            dropped: 0,
            transient_failures: 0,
            stop_reason: StopReason::StopRequested,
        };

        let result = self
            .source
            .start_streaming()
            .and_then(|()| self.capture_frames(&mut report));

        // Persist may already have failed and marked the recording stopped.
        self.state.advance(CaptureState::Running, CaptureState::Draining);
        self.queue.close();
        self.source.stop_streaming();
        let synced = self.timelog.sync();

        let reason = result?;
        synced?;
        report.stop_reason = reason;
        log::info!(
            "capture finished: captured={} dropped={} transient_failures={} reason={:?}",
            report.captured,
            report.dropped,
            report.transient_failures,
            report.stop_reason
        );
        Ok(report)
    }

    fn capture_frames(&mut self, report: &mut CaptureReport) -> Result<StopReason> {
        let mut last_health_log = Instant::now();

        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(StopReason::StopRequested);
            }
            if let Some(limit) = self.settings.max_frames {
                if report.captured >= limit {
                    return Ok(StopReason::FrameLimit);
                }
            }

            let pair = match self.source.next_capture(self.settings.timeout) {
                Ok(pair) if pair.is_empty() => {
                    report.transient_failures += 1;
                    log::warn!("no capture frame");
                    continue;
                }
                Ok(pair) => pair,
                Err(err) if err.is_transient() => {
                    report.transient_failures += 1;
                    log::warn!("capture: {}", err);
                    continue;
                }
                Err(err) => {
                    log::error!("capture source failed: {}", err);
                    return Ok(StopReason::SourceFailed(err.to_string()));
                }
            };
            let timestamp = self.clock.now_secs();
            let sequence = self.sequence.next();
            let frame = Frame::new(sequence, timestamp, pair);
            report.captured += 1;

            let preview = self.sink.is_active().then(|| frame.clone());

            match self.queue.push(frame) {
                PushOutcome::Enqueued => {}
                PushOutcome::DroppedOldest(old) => {
                    report.dropped += 1;
                    log::warn!(
                        "queue full ({}), dropped frame {}",
                        self.queue.capacity(),
                        old.sequence
                    );
                }
                PushOutcome::Closed(_) => {
                    log::warn!("frame queue closed under capture, stopping");
                    return Ok(StopReason::StopRequested);
                }
            }

            self.timelog.append(TimestampRecord {
                sequence,
                timestamp,
            })?;

            if let Some(frame) = preview {
                if self.sink.present(&frame) == SinkControl::Stop {
                    return Ok(StopReason::SinkRequested);
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "capture health frames={} dropped={} queue={}/{} next_seq={}",
                    report.captured,
                    report.dropped,
                    self.queue.len(),
                    self.queue.capacity(),
                    self.sequence.peek()
                );
                last_health_log = Instant::now();
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::frame::{CapturePair, Shape};
    use crate::source::{SyntheticConfig, SyntheticLayout, SyntheticSource};
    use crate::timelog::read_timestamps;

    fn synthetic(frame_limit: u64, null_every: Option<u64>) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(SyntheticConfig {
            layout: SyntheticLayout::Fixed {
                color: Some(Shape::new(vec![2, 2, 4])),
                depth: Some(Shape::new(vec![2, 2])),
            },
            pace: false,
            frame_limit: Some(frame_limit),
            null_every,
            ..SyntheticConfig::default()
        }))
    }

    #[test]
    fn sequence_generator_is_strictly_increasing() {
        let seq = SequenceGenerator::new();
        assert_eq!(seq.peek(), 0);
        let taken: Vec<u64> = (0..5).map(|_| seq.next()).collect();
        assert_eq!(taken, vec![0, 1, 2, 3, 4]);
        assert_eq!(seq.peek(), 5);
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = MonotonicClock::start();
        let a = clock.now_secs();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now_secs();
        assert!(b > a);
    }

    #[test]
    fn sequences_have_no_gaps_despite_drops() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("time.stamp");
        let queue = Arc::new(BoundedFrameQueue::new(3));
        let capture = CaptureLoop::new(
            synthetic(20, Some(4)),
            queue.clone(),
            TimestampLog::create(&log_path)?,
            Arc::new(AtomicBool::new(false)),
            CaptureSettings::default(),
        );
        let report = capture.run()?;

        assert_eq!(report.captured, 20);
        assert_eq!(report.dropped, 17);
        assert!(report.transient_failures > 0);
        assert!(matches!(report.stop_reason, StopReason::SourceFailed(_)));

        let records = read_timestamps(&log_path)?;
        let seqs: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, (0..20).collect::<Vec<_>>());
        assert!(records.windows(2).all(|w| w[1].timestamp >= w[0].timestamp));

        let survivors: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|f| f.sequence).collect();
        assert_eq!(survivors, vec![17, 18, 19]);
        assert!(queue.is_closed());
        Ok(())
    }

    #[test]
    fn honours_frame_limit_and_sink_stop() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(BoundedFrameQueue::new(16));
        let report = CaptureLoop::new(
            synthetic(100, None),
            queue.clone(),
            TimestampLog::create(&dir.path().join("a.stamp"))?,
            Arc::new(AtomicBool::new(false)),
            CaptureSettings {
                timeout: None,
                max_frames: Some(4),
            },
        )
        .run()?;
        assert_eq!(report.captured, 4);
        assert_eq!(report.stop_reason, StopReason::FrameLimit);

        let mut presented = 0u32;
        let sink = move |_frame: &Frame| {
            presented += 1;
            if presented == 2 {
                SinkControl::Stop
            } else {
                SinkControl::Continue
            }
        };
        let report = CaptureLoop::new(
            synthetic(100, None),
            Arc::new(BoundedFrameQueue::new(16)),
            TimestampLog::create(&dir.path().join("b.stamp"))?,
            Arc::new(AtomicBool::new(false)),
            CaptureSettings::default(),
        )
        .with_sink(Box::new(sink))
        .run()?;
        assert_eq!(report.captured, 2);
        assert_eq!(report.stop_reason, StopReason::SinkRequested);
        assert_eq!(read_timestamps(&dir.path().join("b.stamp"))?.len(), 2);
        Ok(())
    }

    #[test]
    fn sink_sees_frames_after_they_are_logged() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("time.stamp");
        let sink_path = log_path.clone();
        let logged_first = Arc::new(AtomicU64::new(0));
        let sink_logged = logged_first.clone();
        let sink = move |frame: &Frame| {
            let logged = read_timestamps(&sink_path).unwrap_or_default();
            if logged.last().map(|r| r.sequence) == Some(frame.sequence) {
                sink_logged.fetch_add(1, Ordering::SeqCst);
            }
            SinkControl::Continue
        };
        let report = CaptureLoop::new(
            synthetic(6, None),
            Arc::new(BoundedFrameQueue::new(2)),
            TimestampLog::create(&log_path)?,
            Arc::new(AtomicBool::new(false)),
            CaptureSettings::default(),
        )
        .with_sink(Box::new(sink))
        .run()?;
        assert_eq!(report.captured, 6);
        assert_eq!(logged_first.load(Ordering::SeqCst), 6);
        Ok(())
    }

    #[test]
    fn stop_flag_ends_capture_and_moves_to_draining() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let stop = Arc::new(AtomicBool::new(true));
        let state = Arc::new(StateCell::new(CaptureState::Running));
        let report = CaptureLoop::new(
            synthetic(100, None),
            Arc::new(BoundedFrameQueue::new(4)),
            TimestampLog::create(&dir.path().join("time.stamp"))?,
            stop,
            CaptureSettings::default(),
        )
        .with_state(state.clone())
        .run()?;
        assert_eq!(report.captured, 0);
        assert_eq!(report.stop_reason, StopReason::StopRequested);
        assert_eq!(state.get(), CaptureState::Draining);
        Ok(())
    }

    #[test]
    fn stopped_state_is_not_rewound_by_capture() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(StateCell::new(CaptureState::Stopped));
        CaptureLoop::new(
            synthetic(100, None),
            Arc::new(BoundedFrameQueue::new(4)),
            TimestampLog::create(&dir.path().join("time.stamp"))?,
            Arc::new(AtomicBool::new(true)),
            CaptureSettings::default(),
        )
        .with_state(state.clone())
        .run()?;
        assert_eq!(state.get(), CaptureState::Stopped);

        assert!(!state.advance(CaptureState::Running, CaptureState::Draining));
        let cell = StateCell::new(CaptureState::Running);
        assert!(cell.advance(CaptureState::Running, CaptureState::Draining));
        assert_eq!(cell.get(), CaptureState::Draining);
        Ok(())
    }

    struct EmptyThenFail {
        calls: u32,
    }

    impl FrameSource for EmptyThenFail {
        fn info(&self) -> crate::source::DeviceInfo {
            crate::source::DeviceInfo::default()
        }
        fn configure(&mut self, _options: &crate::source::DeviceOptions) -> Result<()> {
            Ok(())
        }
        fn start_streaming(&mut self) -> Result<()> {
            Ok(())
        }
        fn next_capture(&mut self, timeout: Option<Duration>) -> Result<CapturePair> {
            self.calls += 1;
            match self.calls {
                1 => Ok(CapturePair::default()),
                2 => Err(Error::CaptureTimeout(timeout.unwrap_or_default())),
                _ => Err(Error::CaptureTerminal("device unplugged".into())),
            }
        }
        fn stop_streaming(&mut self) {}
    }

    #[test]
    fn empty_captures_and_timeouts_are_transient() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let report = CaptureLoop::new(
            Box::new(EmptyThenFail { calls: 0 }),
            Arc::new(BoundedFrameQueue::new(4)),
            TimestampLog::create(&dir.path().join("time.stamp"))?,
            Arc::new(AtomicBool::new(false)),
            CaptureSettings {
                timeout: Some(Duration::from_millis(10)),
                max_frames: None,
            },
        )
        .run()?;
        assert_eq!(report.captured, 0);
        assert_eq!(report.transient_failures, 2);
        assert_eq!(
            report.stop_reason,
            StopReason::SourceFailed("capture source failed: device unplugged".into())
        );
        Ok(())
    }
}
