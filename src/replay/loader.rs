//! Session loader.
//!
//! Metadata and the timestamp log are parsed up front in `open`. Frame data
//! is read lazily, in log order, by a background thread that stays at most
//! `lookahead` frames ahead of the player.
//!
//! The final timestamp record is not played: it is the sentinel for the end
//! of the recording, matching how sessions have always been replayed.

use crossbeam_channel::{bounded, Receiver};
use std::io::ErrorKind;
use std::path::Path;
use std::thread::JoinHandle;

use crate::error::{Error, Result};
use crate::frame::{expected_len, CapturePair, Channel, Frame, Plane};
use crate::metadata::SessionMetadata;
use crate::session::RecordingSession;
use crate::timelog::{read_timestamps, TimestampRecord};

#[derive(Debug)]
pub enum ReplayMessage {
    Frame(Frame),
    /// Loading stopped at this error; nothing follows.
    Failed(Error),
    End,
}

#[derive(Clone, Debug)]
pub struct ReplayLoader {
    session: RecordingSession,
    metadata: SessionMetadata,
    records: Vec<TimestampRecord>,
}

impl ReplayLoader {
    pub fn open(dir: &Path) -> Result<Self> {
        let session = RecordingSession::open(dir)?;
        let records = read_timestamps(&session.timestamp_path())?;
        let metadata_path = session.metadata_path();
        let metadata = if !metadata_path.exists() {
            if !records.is_empty() {
                return Err(Error::metadata(&metadata_path, 0, "metadata file missing"));
            }
            SessionMetadata::default()
        } else {
            SessionMetadata::read(&metadata_path)?
        };
        if !records.is_empty() && metadata.is_empty() {
            return Err(Error::metadata(
                &metadata_path,
                0,
                "session has frames but no channel metadata",
            ));
        }
        log::info!(
            "replay: opened {} ({} timestamp records, channels: {})",
            session.dir().display(),
            records.len(),
            metadata
                .channels()
                .map(|c| c.to_line())
                .collect::<Vec<_>>()
                .join("; ")
        );
        Ok(Self {
            session,
            metadata,
            records,
        })
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Every record in the timestamp log.
    pub fn records(&self) -> &[TimestampRecord] {
        &self.records
    }

    /// Records that will be played (all but the last).
    pub fn playable(&self) -> &[TimestampRecord] {
        let end = self.records.len().saturating_sub(1);
        &self.records[..end]
    }

    /// Read every described channel of one frame from disk.
    pub fn load_frame(&self, record: &TimestampRecord) -> Result<Frame> {
        let mut pair = CapturePair::default();
        for meta in self.metadata.channels() {
            let path = self.session.frame_path(meta.channel, record.sequence);
            let data = std::fs::read(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::MissingFrameData {
                    channel: meta.channel,
                    sequence: record.sequence,
                    path: path.clone(),
                },
                _ => Error::io(&path, e),
            })?;
            let expected = expected_len(&meta.shape, meta.element_type)?;
            if data.len() != expected {
                return Err(Error::MalformedFrameData {
                    channel: meta.channel,
                    sequence: record.sequence,
                    expected,
                    actual: data.len(),
                });
            }
            let plane = Plane::new(meta.shape.clone(), meta.element_type, data)?;
            match meta.channel {
                Channel::Color => pair.color = Some(plane),
                Channel::Depth => pair.depth = Some(plane),
            }
        }
        Ok(Frame::new(record.sequence, record.timestamp, pair))
    }

    /// Start the loader thread. It stops at the first load error, after the
    /// last playable frame, or when the receiver is dropped.
    pub fn spawn(self, lookahead: usize) -> Result<(Receiver<ReplayMessage>, JoinHandle<()>)> {
        let (tx, rx) = bounded(lookahead.max(1));
        let dir = self.session.dir().to_path_buf();
        let handle = std::thread::Builder::new()
            .name("replay-loader".into())
            .spawn(move || {
                for record in self.playable() {
                    let message = match self.load_frame(record) {
                        Ok(frame) => ReplayMessage::Frame(frame),
                        Err(err) => {
                            log::error!("replay: {}", err);
                            let _ = tx.send(ReplayMessage::Failed(err));
                            return;
                        }
                    };
                    if tx.send(message).is_err() {
                        log::debug!("replay: player went away, loader stopping");
                        return;
                    }
                }
                let _ = tx.send(ReplayMessage::End);
            })
            .map_err(|e| Error::io(&dir, e))?;
        Ok((rx, handle))
    }
}
