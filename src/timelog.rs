//! Append-only timestamp log (`time.stamp`).
//!
//! Each captured frame appends `"<sequence>, <timestamp>"`. The log is the
//! source of truth for replay pacing, so every append is written through to
//! the file before the capture loop moves on.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimestampRecord {
    pub sequence: u64,
    /// Monotonic capture time in seconds.
    pub timestamp: f64,
}

impl TimestampRecord {
    pub fn to_line(&self) -> String {
        format!("{}, {}", self.sequence, self.timestamp)
    }

    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let (seq, ts) = line
            .split_once(',')
            .ok_or_else(|| format!("expected '<sequence>, <timestamp>', got '{}'", line.trim()))?;
        let sequence = seq
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("bad sequence number '{}': {}", seq.trim(), e))?;
        let timestamp = ts
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("bad timestamp '{}': {}", ts.trim(), e))?;
        if !timestamp.is_finite() {
            return Err(format!("timestamp '{}' is not finite", ts.trim()));
        }
        Ok(Self {
            sequence,
            timestamp,
        })
    }
}

pub struct TimestampLog {
    path: PathBuf,
    file: File,
    appended: u64,
}

impl TimestampLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            appended: 0,
        })
    }

    pub fn append(&mut self, record: TimestampRecord) -> Result<()> {
        writeln!(self.file, "{}", record.to_line()).map_err(|e| Error::io(&self.path, e))?;
        self.file.flush().map_err(|e| Error::io(&self.path, e))?;
        self.appended += 1;
        Ok(())
    }

    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Push appended lines to stable storage. Called once when recording stops.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data().map_err(|e| Error::io(&self.path, e))
    }
}

/// Read the whole log, in file order. Sequence numbers must be strictly
/// increasing; timestamps are returned as written. A forward gap too large
/// to sleep for is rejected here rather than during playback.
pub fn read_timestamps(path: &Path) -> Result<Vec<TimestampRecord>> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut records: Vec<TimestampRecord> = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record =
            TimestampRecord::parse_line(line).map_err(|reason| Error::metadata(path, idx + 1, reason))?;
        if let Some(prev) = records.last() {
            if record.sequence <= prev.sequence {
                return Err(Error::metadata(
                    path,
                    idx + 1,
                    format!(
                        "sequence {} does not follow {}",
                        record.sequence, prev.sequence
                    ),
                ));
            }
            let gap = record.timestamp - prev.timestamp;
            if gap > 0.0 && Duration::try_from_secs_f64(gap).is_err() {
                return Err(Error::metadata(
                    path,
                    idx + 1,
                    format!("gap of {}s before sequence {} is not playable", gap, record.sequence),
                ));
            }
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appended_records_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time.stamp");
        let mut log = TimestampLog::create(&path).unwrap();
        for (seq, ts) in [(0u64, 10.5f64), (1, 10.533), (4, 10.6)] {
            log.append(TimestampRecord {
                sequence: seq,
                timestamp: ts,
            })
            .unwrap();
        }
        assert_eq!(log.appended(), 3);

        let records = read_timestamps(&path).unwrap();
        let seqs: Vec<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 4]);
        assert_eq!(records[1].timestamp, 10.533);
    }

    #[test]
    fn line_format_matches_recorder_output() {
        let rec = TimestampRecord {
            sequence: 12,
            timestamp: 4521.25,
        };
        assert_eq!(rec.to_line(), "12, 4521.25");
        assert_eq!(TimestampRecord::parse_line("12, 4521.25").unwrap(), rec);
    }

    #[test]
    fn rejects_garbage_and_reordered_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time.stamp");

        std::fs::write(&path, "0, 1.0\nnot a record\n").unwrap();
        assert!(matches!(
            read_timestamps(&path),
            Err(Error::MetadataParse { line: 2, .. })
        ));

        std::fs::write(&path, "3, 1.0\n2, 1.1\n").unwrap();
        assert!(matches!(
            read_timestamps(&path),
            Err(Error::MetadataParse { line: 2, .. })
        ));

        std::fs::write(&path, "0, NaN\n").unwrap();
        assert!(read_timestamps(&path).is_err());
    }

    #[test]
    fn non_monotonic_timestamps_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time.stamp");
        std::fs::write(&path, "0, 2.0\n1, 1.5\n").unwrap();
        assert_eq!(read_timestamps(&path).unwrap().len(), 2);
    }

    #[test]
    fn oversized_gaps_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time.stamp");

        std::fs::write(&path, "0, 0.0\n1, 1e300\n").unwrap();
        assert!(matches!(
            read_timestamps(&path),
            Err(Error::MetadataParse { line: 2, .. })
        ));

        // The difference itself overflows to infinity.
        std::fs::write(&path, "0, -1e308\n1, 1e308\n").unwrap();
        assert!(matches!(
            read_timestamps(&path),
            Err(Error::MetadataParse { line: 2, .. })
        ));

        std::fs::write(&path, "0, 1e300\n1, 0.0\n").unwrap();
        assert_eq!(read_timestamps(&path).unwrap().len(), 2);
    }
}
