//! Terminal progress for a run.
//!
//! The scan spinner and the lyrics and metadata stage bars are drawn through
//! one `MultiProgress`, so the stage bars stack instead of redrawing over
//! each other. In log-only mode nothing is drawn and the executor logs
//! `[phase] n/total` lines instead, which reads better in a log file.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

const STAGE_TEMPLATE: &str = "{prefix:>8} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{msg} {spinner} [{elapsed_precise}]";

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Log `[phase] current/total` every `interval` settled jobs and at the end.
/// Only in log-only mode; otherwise the bars show the same information.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if is_log_only() && total > 0 && (current % interval == 0 || current == total) {
        let pct = 100.0 * current as f64 / total as f64;
        info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

/// All progress output of one run.
pub struct RunProgress {
    multi: MultiProgress,
}

impl RunProgress {
    pub fn new() -> Self {
        let multi = if is_log_only() {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self { multi }
    }

    /// Bar for one pipeline stage. Its length is set when the stage's batch
    /// starts; until then it reads "waiting".
    pub fn stage(&self, name: &'static str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::with_template(STAGE_TEMPLATE) {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_prefix(name);
        pb.set_message("waiting");
        pb
    }

    /// Spinner for work of unknown size. Call `finish_and_clear` when done.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
            pb.set_style(style);
        }
        if !is_log_only() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        pb.set_message(msg.to_string());
        pb
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}
