//! Core data models for the lyrics tagging pipeline.
//!
//! This module contains the batch result aliases and the plain structs
//! passed between the scanner, the lyrics provider and the tag writer.

use serde::Serialize;
use std::path::PathBuf;

// ============================================================================
// Type Aliases
// ============================================================================

/// Result of processing one job: `Ok` carries the produced value, `Err` the
/// typed failure.
pub type Outcome<T, E> = Result<T, E>;

/// One outcome per input job, index-aligned with the input sequence.
pub type BatchResult<T, E> = Vec<Outcome<T, E>>;

// ============================================================================
// Provider Models
// ============================================================================

/// Search hit returned by a lyrics provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_sec: Option<f64>,
}

// ============================================================================
// Metadata Models
// ============================================================================

/// Lyrics to embed into one audio file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteJob {
    pub path: PathBuf,
    pub lyrics: String,
}

impl WriteJob {
    pub fn new(path: impl Into<PathBuf>, lyrics: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lyrics: lyrics.into(),
        }
    }
}

/// What happened to a file that made it through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Lyrics were embedded into the file.
    Written,
    /// Lyrics were found but the file was left alone (simulate mode).
    Found,
}
