//! replay - play a recorded session back at its recorded pace

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use depth_recorder::replay::{ReplayLoader, ReplayPlayer};
use depth_recorder::{DepthColormap, Frame, FrameSink, NullSink, RecorderConfig, SnapshotSink};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Session directory produced by `record`.
    session: PathBuf,
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "DEPTHREC_CONFIG")]
    config: Option<PathBuf>,
    /// Frames loaded ahead of playback.
    #[arg(long)]
    lookahead: Option<usize>,
    /// Write PNG previews (color + depth colormap) into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Snapshot every Nth frame.
    #[arg(long, default_value_t = 30)]
    snapshot_every: u64,
    /// Depth colormap range in millimetres, "min,max".
    #[arg(long, value_name = "MIN,MAX")]
    depth_range: Option<String>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::detect(&args.ui);

    let mut cfg = RecorderConfig::load_from(args.config.as_deref())?;
    if let Some(lookahead) = args.lookahead {
        cfg.replay_lookahead = lookahead;
    }
    if let Some(range) = &args.depth_range {
        cfg.depth_range = depth_recorder::config::parse_depth_range(range)?;
    }
    cfg.validate()?;
    let colormap: DepthColormap = cfg.colormap()?;

    let loader = {
        let mut stage = ui.stage(ui::Stage::OpenSession);
        let loader = ReplayLoader::open(&args.session)
            .with_context(|| format!("failed to open session {}", args.session.display()))?;
        stage.detail(format!(
            "{} ({} timestamp records)",
            args.session.display(),
            loader.records().len()
        ));
        loader
    };
    let total = loader.playable().len() as u64;

    let mut preview: Box<dyn FrameSink> = match &args.snapshot_dir {
        Some(dir) => Box::new(SnapshotSink::new(dir, args.snapshot_every, colormap)?),
        None => Box::new(NullSink),
    };
    let progress = ui.replaying(total);
    let counter = progress.clone();
    let sink = move |frame: &Frame| {
        counter.inc();
        preview.present(frame)
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let (rx, loader_thread) = loader.spawn(cfg.replay_lookahead)?;
    let mut player = ReplayPlayer::new(Box::new(sink)).with_cancel(cancel);
    let result = player.run(rx);
    progress.finish();
    if loader_thread.join().is_err() {
        log::error!("replay loader thread panicked");
    }
    let report = result?;

    log::info!(
        "replayed {} of {} frames in {:.2}s ({:?})",
        report.frames_presented,
        total,
        report.elapsed.as_secs_f64(),
        report.stop_reason
    );
    Ok(())
}
