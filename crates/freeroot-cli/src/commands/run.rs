use super::{spin_fail, spin_ok, spinner, EXIT_INTERRUPTED};
use freeroot_core::{BootstrapOptions, BootstrapReporter, Bootstrapper, RunResult, Stage};
use freeroot_remote::FetchProgress;
use freeroot_schema::BootstrapConfig;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};

pub fn run(config: BootstrapConfig, no_launch: bool) -> Result<u8, String> {
    let workspace = config.workspace.clone();
    let reporter = Arc::new(CliReporter::new());
    let result = Bootstrapper::new(config)
        .with_reporter(Arc::clone(&reporter) as Arc<dyn BootstrapReporter>)
        .with_options(BootstrapOptions {
            no_launch,
            ..BootstrapOptions::default()
        })
        .run();
    reporter.finish_current(false);

    match result {
        RunResult::Success(code) => {
            if no_launch {
                println!("workspace ready: {}", workspace.display());
            }
            Ok(RunResult::Success(code).exit_code())
        }
        RunResult::Failed { stage, cause } => Err(format!("bootstrap failed while {stage}: {cause}")),
        RunResult::Interrupted => {
            eprintln!("interrupted");
            Ok(EXIT_INTERRUPTED)
        }
    }
}

fn in_progress(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::ResolvingArch => Some("detecting architecture..."),
        Stage::Fetching => Some("downloading engine and rootfs..."),
        Stage::Installing => Some("extracting rootfs..."),
        Stage::Normalizing => Some("checking engine binary..."),
        Stage::Composing => Some("composing session..."),
        _ => None,
    }
}

fn done(stage: Stage) -> &'static str {
    match stage {
        Stage::ResolvingArch => "architecture resolved",
        Stage::Fetching => "artifacts downloaded",
        Stage::Installing => "rootfs extracted",
        Stage::Normalizing => "engine ready",
        Stage::Composing => "session composed",
        _ => "done",
    }
}

/// Spinner per stage plus one bar per download, all on stderr.
struct CliReporter {
    multi: MultiProgress,
    current: Mutex<Option<(Stage, ProgressBar)>>,
}

impl CliReporter {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current: Mutex::new(None),
        }
    }

    fn finish_current(&self, failed: bool) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if let Some((stage, pb)) = current.take() {
            if failed {
                spin_fail(&pb, &format!("{stage} failed"));
            } else {
                spin_ok(&pb, done(stage));
            }
        }
    }
}

impl BootstrapReporter for CliReporter {
    fn stage(&self, stage: Stage) {
        self.finish_current(stage == Stage::Failed);
        if let Some(msg) = in_progress(stage) {
            let pb = self.multi.add(spinner(msg));
            if let Ok(mut current) = self.current.lock() {
                *current = Some((stage, pb));
            }
        }
    }

    fn download(&self, label: &str) -> Box<dyn FetchProgress> {
        Box::new(DownloadBar {
            label: label.to_owned(),
            bar: self.multi.add(ProgressBar::new(0)),
        })
    }
}

struct DownloadBar {
    label: String,
    bar: ProgressBar,
}

impl FetchProgress for DownloadBar {
    fn started(&self, _label: &str, total: Option<u64>) {
        self.bar.reset();
        let style = match total {
            Some(len) => {
                self.bar.set_length(len);
                ProgressStyle::with_template(
                    "  {msg:<7} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}",
                )
            }
            None => ProgressStyle::with_template("  {msg:<7} {spinner:.cyan} {bytes} {bytes_per_sec}"),
        };
        self.bar
            .set_style(style.expect("valid template").progress_chars("=> "));
        self.bar.set_message(self.label.clone());
    }

    fn advanced(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn finished(&self) {
        self.bar.finish_and_clear();
    }
}
