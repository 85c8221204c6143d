//! Recording session directory layout.
//!
//! ```text
//! <root>/<prefix>_<YYYYmmdd_HHMMSS>/
//!     metadata.txt          one line per channel
//!     time.stamp            "<sequence>, <timestamp>" per captured frame
//!     rgb/color_0000.bin    raw color planes
//!     depth/depth_0000.bin  raw depth planes
//! ```
//!
//! Sequence numbers are zero-padded to four digits; wider numbers keep all
//! their digits so file names stay unique.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::frame::Channel;

pub const METADATA_FILE: &str = "metadata.txt";
pub const TIMESTAMP_FILE: &str = "time.stamp";
pub const SEQUENCE_WIDTH: usize = 4;

#[derive(Clone, Debug)]
pub struct RecordingSession {
    dir: PathBuf,
}

impl RecordingSession {
    /// Create a fresh session directory named after the local start time.
    pub fn create(root: &Path, prefix: &str) -> Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let base = format!("{}_{}", prefix, stamp);
        fs::create_dir_all(root).map_err(|e| Error::io(root, e))?;

        let mut dir = root.join(&base);
        let mut suffix = 1;
        while dir.exists() {
            dir = root.join(format!("{}_{}", base, suffix));
            suffix += 1;
        }
        Self::create_at(dir)
    }

    /// Create a session in an explicit directory (must not hold a session yet).
    pub fn create_at(dir: PathBuf) -> Result<Self> {
        let session = Self { dir };
        if session.timestamp_path().exists() {
            return Err(Error::Config(format!(
                "{} already contains a recording",
                session.dir.display()
            )));
        }
        for channel in Channel::ALL {
            let channel_dir = session.channel_dir(channel);
            fs::create_dir_all(&channel_dir).map_err(|e| Error::io(&channel_dir, e))?;
        }
        log::info!("recording session at {}", session.dir.display());
        Ok(session)
    }

    /// Open an existing session for replay.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "session directory not found"),
            ));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn timestamp_path(&self) -> PathBuf {
        self.dir.join(TIMESTAMP_FILE)
    }

    pub fn channel_dir(&self, channel: Channel) -> PathBuf {
        self.dir.join(channel.dir_name())
    }

    pub fn frame_path(&self, channel: Channel, sequence: u64) -> PathBuf {
        self.channel_dir(channel).join(frame_file_name(channel, sequence))
    }
}

pub fn frame_file_name(channel: Channel, sequence: u64) -> String {
    format!(
        "{}_{:0width$}.bin",
        channel.file_stem(),
        sequence,
        width = SEQUENCE_WIDTH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_are_padded_and_widen() {
        assert_eq!(frame_file_name(Channel::Color, 7), "color_0007.bin");
        assert_eq!(frame_file_name(Channel::Depth, 9999), "depth_9999.bin");
        assert_eq!(frame_file_name(Channel::Depth, 10000), "depth_10000.bin");
        assert_ne!(
            frame_file_name(Channel::Depth, 1000),
            frame_file_name(Channel::Depth, 10000)
        );
    }

    #[test]
    fn create_builds_channel_directories() {
        let root = tempfile::tempdir().unwrap();
        let session = RecordingSession::create(root.path(), "kinect").unwrap();
        let name = session.dir().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("kinect_"), "{name}");
        assert!(session.channel_dir(Channel::Color).is_dir());
        assert!(session.channel_dir(Channel::Depth).is_dir());
        assert_eq!(
            session.frame_path(Channel::Color, 3),
            session.dir().join("rgb").join("color_0003.bin")
        );
    }

    #[test]
    fn sessions_created_in_the_same_second_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = RecordingSession::create(root.path(), "kinect").unwrap();
        std::fs::write(a.timestamp_path(), b"").unwrap();
        let b = RecordingSession::create(root.path(), "kinect").unwrap();
        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn open_requires_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        assert!(RecordingSession::open(&root.path().join("missing")).is_err());
        assert!(RecordingSession::open(root.path()).is_ok());
    }
}
