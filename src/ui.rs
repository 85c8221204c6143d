use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(120);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    /// Unknown values fall back to `Auto`.
    pub fn parse(flag: &str) -> Self {
        match flag {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Setup steps the binaries report before frames start moving.
#[derive(Clone, Copy, Debug)]
pub enum Stage {
    OpenDevice,
    OpenSession,
}

impl Stage {
    fn label(self) -> &'static str {
        match self {
            Stage::OpenDevice => "Opening camera",
            Stage::OpenSession => "Loading session",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    /// Spinners go to stderr. `auto` keeps them off when stdout is piped,
    /// since `record` prints the session path there.
    pub fn detect(flag: &str) -> Self {
        let stderr_tty = std::io::stderr().is_terminal();
        let stdout_tty = std::io::stdout().is_terminal();
        let pretty = stderr_tty
            && match UiMode::parse(flag) {
                UiMode::Pretty => true,
                UiMode::Auto => stdout_tty,
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    pub fn stage(&self, stage: Stage) -> StageGuard {
        let label = stage.label();
        let spinner = if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(TICK);
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{label}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", label);
            None
        };
        StageGuard {
            label,
            detail: None,
            start: Instant::now(),
            spinner,
        }
    }

    /// Capture counter. With a frame limit it renders a bar.
    pub fn recording(&self, max_frames: Option<u64>) -> FrameProgress {
        self.progress("recorded", max_frames)
    }

    pub fn replaying(&self, playable: u64) -> FrameProgress {
        self.progress("replayed", Some(playable))
    }

    fn progress(&self, verb: &'static str, total: Option<u64>) -> FrameProgress {
        let bar = self.pretty.then(|| {
            let (bar, template) = match total {
                Some(len) => (
                    ProgressBar::new(len),
                    "{msg} [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})",
                ),
                None => (ProgressBar::new_spinner(), "{spinner} {msg} {pos} frames"),
            };
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_message(verb);
            if total.is_none() {
                bar.enable_steady_tick(TICK);
            }
            bar
        });
        FrameProgress {
            verb,
            total,
            count: Arc::new(AtomicU64::new(0)),
            started: Instant::now(),
            bar,
        }
    }
}

pub struct StageGuard {
    label: &'static str,
    detail: Option<String>,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    /// Shown after the label when the stage completes, e.g. a device serial.
    pub fn detail(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = format_duration(self.start.elapsed());
        let message = match &self.detail {
            Some(detail) => format!("✔ {}: {} ({})", self.label, detail, elapsed),
            None => format!("✔ {} ({})", self.label, elapsed),
        };
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Shared between the binary and the sink closure running on the capture or
/// replay thread.
#[derive(Clone)]
pub struct FrameProgress {
    verb: &'static str,
    total: Option<u64>,
    count: Arc<AtomicU64>,
    started: Instant,
    bar: Option<ProgressBar>,
}

impl FrameProgress {
    pub fn inc(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn finish(&self) {
        let count = self.count.load(Ordering::Relaxed);
        let elapsed = format_duration(self.started.elapsed());
        let message = match self.total {
            Some(total) => format!("{} {}/{} frames in {}", self.verb, count, total, elapsed),
            None => format!("{} {} frames in {}", self.verb, count, elapsed),
        };
        match &self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("==> {}", message),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
