//! Run summaries and the optional JSON report.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{Classify, ErrorKind};
use crate::models::{FileStatus, Outcome};
use crate::pipeline::FileOutcome;

/// Success/failure counts of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
}

impl Summary {
    pub fn of<T, E>(outcomes: &[Outcome<T, E>]) -> Self {
        let success = outcomes.iter().filter(|o| o.is_ok()).count();
        Self {
            total: outcomes.len(),
            success,
            failure: outcomes.len() - success,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} success, {} failure",
            self.total, self.success, self.failure
        )
    }
}

/// One-line summary of a batch result.
pub fn summarize<T, E>(outcomes: &[Outcome<T, E>]) -> String {
    Summary::of(outcomes).to_string()
}

/// Failure counts per kind, in [`ErrorKind`] order.
pub fn failures_by_kind<T, E: Classify>(outcomes: &[Outcome<T, E>]) -> BTreeMap<ErrorKind, usize> {
    let mut counts = BTreeMap::new();
    for e in outcomes.iter().filter_map(|o| o.as_ref().err()) {
        *counts.entry(e.kind()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Lossy for non-UTF-8 names; JSON strings must be valid UTF-8.
    pub path: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&FileOutcome> for FileReport {
    fn from(f: &FileOutcome) -> Self {
        let (status, error_kind, error) = match &f.result {
            Ok(status) => (Some(*status), None, None),
            Err(e) => (None, Some(e.kind()), Some(e.to_string())),
        };
        Self {
            path: f.path.to_string_lossy().into_owned(),
            query: f.query.clone(),
            status,
            lyrics_len: f.lyrics_len,
            error_kind,
            error,
        }
    }
}

/// Machine-readable record of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub simulate: bool,
    pub summary: Summary,
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn new(simulate: bool, files: &[FileOutcome]) -> Self {
        let results: Vec<_> = files.iter().map(|f| f.result.as_ref()).collect();
        Self {
            simulate,
            summary: Summary::of(&results),
            failures_by_kind: failures_by_kind(&results),
            files: files.iter().map(FileReport::from).collect(),
        }
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create report {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LyricsError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> Vec<Outcome<String, LyricsError>> {
        vec![
            Ok("L1".into()),
            Err(LyricsError::NotFound { query: "b".into() }),
            Err(LyricsError::EmptyResult { query: "c".into() }),
            Err(LyricsError::NotFound { query: "d".into() }),
        ]
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&sample()), "4 total, 1 success, 3 failure");
        assert_eq!(summarize::<(), LyricsError>(&[]), "0 total, 0 success, 0 failure");
    }

    #[test]
    fn test_failures_by_kind() {
        let counts = failures_by_kind(&sample());
        assert_eq!(counts.get(&ErrorKind::NotFound), Some(&2));
        assert_eq!(counts.get(&ErrorKind::EmptyResult), Some(&1));
        assert_eq!(counts.get(&ErrorKind::ProviderError), None);
    }

    #[test]
    fn test_run_report_json() {
        let files = vec![
            FileOutcome {
                path: PathBuf::from("/m/a.mp3"),
                query: "a".into(),
                lyrics_len: Some(2),
                result: Ok(FileStatus::Written),
            },
            FileOutcome {
                path: PathBuf::from("/m/b.mp3"),
                query: "b".into(),
                lyrics_len: None,
                result: Err(LyricsError::NotFound { query: "b".into() }.into()),
            },
        ];
        let report = RunReport::new(false, &files);
        assert_eq!(report.summary.to_string(), "2 total, 1 success, 1 failure");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        report.write_to_file(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["summary"]["failure"], 1);
        assert_eq!(json["failures_by_kind"]["not_found"], 1);
        assert_eq!(json["files"][0]["status"], "written");
        assert_eq!(json["files"][1]["error_kind"], "not_found");
        assert!(json["files"][0].get("error").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_reported() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let files = vec![FileOutcome {
            path: PathBuf::from(OsStr::from_bytes(b"/m/caf\xe9.mp3")),
            query: "caf".into(),
            lyrics_len: Some(2),
            result: Ok(FileStatus::Written),
        }];
        let report = RunReport::new(false, &files);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        report.write_to_file(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["files"][0]["path"], "/m/caf\u{FFFD}.mp3");
    }
}
