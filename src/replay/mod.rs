//! Session replay: a lookahead loader thread feeding a timestamp-paced player.

pub mod loader;
pub mod player;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::preview::FrameSink;

pub use loader::{ReplayLoader, ReplayMessage};
pub use player::{PlaybackReport, PlaybackStopReason, ReplayPlayer};

/// Replay the session in `dir` through `sink`, blocking until playback ends.
pub fn replay_session(
    dir: &Path,
    lookahead: usize,
    sink: Box<dyn FrameSink>,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<PlaybackReport> {
    let loader = ReplayLoader::open(dir)?;
    let (rx, handle) = loader.spawn(lookahead)?;

    let mut player = ReplayPlayer::new(sink);
    if let Some(cancel) = cancel {
        player = player.with_cancel(cancel);
    }
    let result = player.run(rx);

    let joined = handle.join();
    match (result, joined) {
        (Err(err), _) => Err(err),
        (Ok(_), Err(_)) => Err(Error::WorkerPanicked("replay loader")),
        (Ok(report), Ok(())) => Ok(report),
    }
}
