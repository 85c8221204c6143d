//! Per-channel metadata (`metadata.txt`).
//!
//! One line per channel, written the first time that channel is persisted:
//!
//! ```text
//! RGB - resolution: (1080, 1920, 4), dtype: uint8
//! Depth - resolution: (576, 640), dtype: uint16
//! ```

use regex::Regex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::frame::{Channel, ElementType, Plane, Shape};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMetadata {
    pub channel: Channel,
    pub shape: Shape,
    pub element_type: ElementType,
}

impl ChannelMetadata {
    pub fn for_plane(channel: Channel, plane: &Plane) -> Self {
        Self {
            channel,
            shape: plane.shape().clone(),
            element_type: plane.element_type(),
        }
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} - resolution: {}, dtype: {}",
            self.channel.metadata_name(),
            self.shape,
            self.element_type
        )
    }

    /// Parse one metadata line. Errors carry a reason only; the caller adds
    /// file and line context.
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        static LINE: OnceLock<Regex> = OnceLock::new();
        static DIM: OnceLock<Regex> = OnceLock::new();
        let line_re = LINE.get_or_init(|| {
            Regex::new(r"^\s*(\w+)\s*-\s*resolution:\s*\(([^)]*)\)\s*,\s*dtype:\s*(\w+)\s*$")
                .expect("metadata line regex")
        });
        let dim_re = DIM.get_or_init(|| Regex::new(r"\d+").expect("dimension regex"));

        let caps = line_re
            .captures(line)
            .ok_or_else(|| format!("unrecognized metadata line '{}'", line.trim()))?;
        let channel = Channel::from_metadata_name(&caps[1])
            .ok_or_else(|| format!("unknown channel '{}'", &caps[1]))?;
        let dims = dim_re
            .find_iter(&caps[2])
            .map(|m| {
                m.as_str()
                    .parse::<usize>()
                    .map_err(|e| format!("bad dimension '{}': {}", m.as_str(), e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if dims.is_empty() {
            return Err("resolution has no dimensions".to_string());
        }
        let element_type = caps[3].parse::<ElementType>()?;
        Ok(Self {
            channel,
            shape: Shape::new(dims),
            element_type,
        })
    }
}

/// Metadata for every channel described in a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    channels: BTreeMap<Channel, ChannelMetadata>,
}

impl SessionMetadata {
    pub fn get(&self, channel: Channel) -> Option<&ChannelMetadata> {
        self.channels.get(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelMetadata> {
        self.channels.values()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let mut channels = BTreeMap::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let meta = ChannelMetadata::parse_line(line)
                .map_err(|reason| Error::metadata(path, idx + 1, reason))?;
            if channels.contains_key(&meta.channel) {
                return Err(Error::metadata(
                    path,
                    idx + 1,
                    format!("duplicate metadata for channel {}", meta.channel),
                ));
            }
            channels.insert(meta.channel, meta);
        }
        Ok(Self { channels })
    }
}

/// Appends each channel's metadata line exactly once per session.
pub struct MetadataWriter {
    path: PathBuf,
    file: File,
    described: BTreeMap<Channel, ChannelMetadata>,
}

impl MetadataWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            described: BTreeMap::new(),
        })
    }

    pub fn described(&self, channel: Channel) -> Option<&ChannelMetadata> {
        self.described.get(&channel)
    }

    /// Record `meta` if its channel has not been described yet. Returns
    /// whether a line was written. The file is flushed after every write.
    pub fn describe(&mut self, meta: ChannelMetadata) -> Result<bool> {
        if self.described.contains_key(&meta.channel) {
            return Ok(false);
        }
        writeln!(self.file, "{}", meta.to_line()).map_err(|e| Error::io(&self.path, e))?;
        self.file.flush().map_err(|e| Error::io(&self.path, e))?;
        log::debug!("described channel: {}", meta.to_line());
        self.described.insert(meta.channel, meta);
        Ok(true)
    }
}
