use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use depth_recorder::frame::{Channel, Frame};
use depth_recorder::replay::{replay_session, PlaybackStopReason};
use depth_recorder::session::RecordingSession;
use depth_recorder::{Error, SinkControl};

/// Build a depth-only session of `(2, 2)` uint16 planes. `missing` sequences
/// get a timestamp record but no frame file.
fn write_session(dir: &Path, records: &[(u64, f64)], missing: &[u64]) -> RecordingSession {
    let session = RecordingSession::create_at(dir.to_path_buf()).unwrap();
    std::fs::write(
        session.metadata_path(),
        "Depth - resolution: (2, 2), dtype: uint16\n",
    )
    .unwrap();
    let log: String = records
        .iter()
        .map(|(seq, ts)| format!("{}, {}\n", seq, ts))
        .collect();
    std::fs::write(session.timestamp_path(), log).unwrap();
    for (seq, _) in records {
        if !missing.contains(seq) {
            std::fs::write(session.frame_path(Channel::Depth, *seq), [0u8; 8]).unwrap();
        }
    }
    session
}

fn recording_sink() -> (Arc<Mutex<Vec<(u64, Instant)>>>, Box<dyn depth_recorder::FrameSink>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink = move |frame: &Frame| {
        sink_seen.lock().unwrap().push((frame.sequence, Instant::now()));
        SinkControl::Continue
    };
    (seen, Box::new(sink))
}

#[test]
fn playback_follows_recorded_deltas() {
    let root = tempfile::tempdir().unwrap();
    let session = write_session(
        &root.path().join("s"),
        &[(0, 100.0), (1, 100.033), (2, 100.066), (3, 100.132), (4, 100.2)],
        &[],
    );

    let (seen, sink) = recording_sink();
    let started = Instant::now();
    let report = replay_session(session.dir(), 10, sink, None).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.stop_reason, PlaybackStopReason::Completed);
    // The last record marks the end of the recording and is not played.
    assert_eq!(report.frames_presented, 4);
    assert!(elapsed >= Duration::from_millis(130), "{:?}", elapsed);

    let seen = seen.lock().unwrap();
    let seqs: Vec<u64> = seen.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
    let gap = seen[3].1.duration_since(seen[2].1);
    assert!(gap >= Duration::from_millis(32), "{:?}", gap);
}

#[test]
fn missing_frame_stops_playback_at_the_gap() {
    let root = tempfile::tempdir().unwrap();
    let session = write_session(
        &root.path().join("s"),
        &[(0, 1.0), (1, 1.01), (2, 1.02), (3, 1.03), (4, 1.04), (5, 1.05)],
        &[2],
    );

    let (seen, sink) = recording_sink();
    match replay_session(session.dir(), 3, sink, None) {
        Err(Error::MissingFrameData {
            channel, sequence, ..
        }) => {
            assert_eq!(channel, Channel::Depth);
            assert_eq!(sequence, 2);
        }
        other => panic!("expected MissingFrameData, got {:?}", other),
    }
    let seqs: Vec<u64> = seen.lock().unwrap().iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, vec![0, 1]);
}

#[test]
fn non_monotonic_timestamps_play_immediately() {
    let root = tempfile::tempdir().unwrap();
    let session = write_session(
        &root.path().join("s"),
        &[(0, 50.0), (1, 49.0), (2, 48.5), (3, 10.0)],
        &[],
    );

    let (seen, sink) = recording_sink();
    let started = Instant::now();
    let report = replay_session(session.dir(), 10, sink, None).unwrap();
    assert_eq!(report.frames_presented, 3);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn cancel_flag_stops_long_gaps() {
    let root = tempfile::tempdir().unwrap();
    let session = write_session(
        &root.path().join("s"),
        &[(0, 0.0), (1, 30.0), (2, 60.0), (3, 90.0)],
        &[],
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let trigger = cancel.clone();
    let sink = move |_: &Frame| {
        trigger.store(true, std::sync::atomic::Ordering::SeqCst);
        SinkControl::Continue
    };

    let started = Instant::now();
    let report = replay_session(session.dir(), 10, Box::new(sink), Some(cancel)).unwrap();
    assert_eq!(report.stop_reason, PlaybackStopReason::Cancelled);
    assert!(report.frames_presented <= 2);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn oversized_timestamp_gap_fails_before_playback() {
    let root = tempfile::tempdir().unwrap();
    let session = write_session(
        &root.path().join("s"),
        &[(0, 0.0), (1, 1e300), (2, 1e300)],
        &[],
    );

    let (seen, sink) = recording_sink();
    match replay_session(session.dir(), 4, sink, None) {
        Err(Error::MetadataParse { path, line, .. }) => {
            assert_eq!(path, session.timestamp_path());
            assert_eq!(line, 2);
        }
        other => panic!("expected MetadataParse, got {:?}", other),
    }
    assert!(seen.lock().unwrap().is_empty());
}
