pub mod clean;
pub mod doctor;
pub mod run;
pub mod status;

use freeroot_schema::{default_config_path, parse_config_file, BootstrapConfig, ConfigFile, Overrides};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Flags and `FREEROOT_*` variables over the config file over defaults.
///
/// An explicit config path must exist; the default one is optional.
pub fn resolve_config(
    config_path: Option<&Path>,
    overrides: Overrides,
) -> Result<BootstrapConfig, String> {
    let file = match config_path {
        Some(path) => parse_config_file(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => {
                parse_config_file(&path).map_err(|e| format!("{}: {e}", path.display()))?
            }
            None => ConfigFile::default(),
        },
    };
    BootstrapConfig::resolve(&file, overrides).map_err(|e| e.to_string())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "complete" => Style::new().green().apply_to(state).to_string(),
        "incomplete" => Style::new().yellow().apply_to(state).to_string(),
        "missing" => Style::new().dim().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}
