//! calibration - parse a camera calibration dump and print it as JSON

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use depth_recorder::{open_source, parse_calibration, RecorderConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Calibration dump to parse. Without it the configured device is asked.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Device to query when no input file is given.
    #[arg(long)]
    device: Option<String>,
    /// Write JSON here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let cfg = RecorderConfig::load()?;
            let device = args.device.as_deref().unwrap_or(&cfg.device);
            let source = open_source(device)?;
            source
                .calibration()
                .ok_or_else(|| anyhow!("device {} exposes no calibration data", device))?
        }
    };

    let calibration = parse_calibration(&raw)?;
    if calibration.extrinsics.is_empty() && calibration.intrinsics.is_empty() {
        log::warn!("no extrinsics or intrinsics found in calibration data");
    }
    let json = serde_json::to_string_pretty(&calibration)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("calibration written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
