//! Safety checks for files the tool creates next to the user's music.
//!
//! The JSON run report is the only file written outside the metadata stage.
//! It is written after every file has been tagged, so a bad report path must
//! be caught before the run starts.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::scan::to_abs;

/// Validates that a report path can be written, returning it resolved.
///
/// Checks:
/// - Report filename must end in `.json`
/// - Report cannot be an existing directory or other non-file
/// - Report's parent directory must already exist
pub fn validate_report_path(report: &Path) -> Result<PathBuf> {
    let is_json = report
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        bail!(
            "Safety check failed: report file '{}' must have a .json extension",
            report.display()
        );
    }

    let resolved = to_abs(report).context("Failed to resolve report path")?;
    if resolved.exists() && !resolved.is_file() {
        bail!(
            "Safety check failed: report '{}' exists and is not a regular file",
            resolved.display()
        );
    }

    match resolved.parent() {
        Some(parent) if parent.is_dir() => Ok(resolved),
        _ => bail!(
            "Safety check failed: directory for report '{}' does not exist",
            resolved.display()
        ),
    }
}
