//! record - capture color + depth frames into a new session directory

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use depth_recorder::{
    open_source, Frame, FrameSink, NullSink, Recorder, RecorderConfig, RecorderSettings,
    RecordingSession, SinkControl, SnapshotSink, StopReason,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "DEPTHREC_CONFIG")]
    config: Option<PathBuf>,
    /// Root directory for session folders.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Session folder prefix.
    #[arg(long)]
    prefix: Option<String>,
    /// Device to open (stub://<name> for the synthetic source).
    #[arg(long)]
    device: Option<String>,
    /// Capture queue capacity; the oldest frame is dropped when full.
    #[arg(long)]
    queue_capacity: Option<usize>,
    /// Per-capture timeout in milliseconds (0 waits indefinitely).
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Stop after this many captured frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Write PNG previews (color + depth colormap) into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Snapshot every Nth frame.
    #[arg(long, default_value_t = 30)]
    snapshot_every: u64,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::detect(&args.ui);

    let mut cfg = RecorderConfig::load_from(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        cfg.output_root = dir;
    }
    if let Some(prefix) = args.prefix {
        cfg.session_prefix = prefix;
    }
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if let Some(capacity) = args.queue_capacity {
        cfg.queue_capacity = capacity;
    }
    if let Some(ms) = args.timeout_ms {
        cfg.capture_timeout = (ms > 0).then(|| std::time::Duration::from_millis(ms));
    }
    if args.max_frames.is_some() {
        cfg.max_frames = args.max_frames;
    }
    cfg.validate()?;

    let source = {
        let mut stage = ui.stage(ui::Stage::OpenDevice);
        let mut source = open_source(&cfg.device)?;
        let info = source.info();
        log::info!(
            "device serial={} hardware={} color_controls=[{}]",
            info.serial_number,
            info.hardware_version,
            info.color_controls
        );
        source
            .configure(&cfg.device_options)
            .context("failed to configure device")?;
        stage.detail(format!("{} (serial {})", cfg.device, info.serial_number));
        source
    };

    let session = RecordingSession::create(&cfg.output_root, &cfg.session_prefix)?;

    let mut preview: Box<dyn FrameSink> = match &args.snapshot_dir {
        Some(dir) => Box::new(SnapshotSink::new(dir, args.snapshot_every, cfg.colormap()?)?),
        None => Box::new(NullSink),
    };
    let progress = ui.recording(cfg.max_frames);
    let counter = progress.clone();
    let sink = move |frame: &Frame| -> SinkControl {
        counter.inc();
        preview.present(frame)
    };

    let recorder = Recorder::start(
        source,
        session,
        RecorderSettings::from_config(&cfg),
        Box::new(sink),
    )?;

    let stop = recorder.stop_flag();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;
    log::info!("recording into {} (Ctrl-C to stop)", recorder.session().dir().display());

    let summary = recorder.join()?;
    progress.finish();

    log::info!(
        "session {}: captured={} dropped={} written={} rejected_planes={} transient_failures={}",
        summary.session_dir.display(),
        summary.capture.captured,
        summary.capture.dropped,
        summary.persist.frames_written,
        summary.persist.rejected_planes,
        summary.capture.transient_failures
    );
    println!("{}", summary.session_dir.display());

    if let StopReason::SourceFailed(reason) = summary.capture.stop_reason {
        return Err(anyhow!("recording ended early: {}", reason));
    }
    Ok(())
}
