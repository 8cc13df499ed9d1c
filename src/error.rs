//! Error types shared by the pipeline stages.
//!
//! Per-job failures (`LyricsError`, `WriteError`) are values stored in a
//! batch result slot and never abort a batch. `SetupError` covers the
//! preconditions checked before any batch starts.

use serde::Serialize;
use std::any::Any;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Kinds
// ============================================================================

/// Flat failure taxonomy used for reporting and per-kind counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    EmptyResult,
    ProviderError,
    ToolInvocationFailed,
    FileSystemError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::ToolInvocationFailed => "tool_invocation_failed",
            ErrorKind::FileSystemError => "file_system_error",
        }
    }
}

/// Errors that can be reduced to an [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl<E: Classify + ?Sized> Classify for &E {
    fn kind(&self) -> ErrorKind {
        (**self).kind()
    }
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// A lyrics provider lookup failed (transport, HTTP status, bad payload).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);

/// The external tag-writing tool could not produce its output file.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
}

/// A worker panicked while processing the job at `index`.
#[derive(Debug, Clone, Error)]
#[error("job #{index} panicked: {message}")]
pub struct WorkerPanic {
    pub index: usize,
    pub message: String,
}

impl WorkerPanic {
    pub fn new(index: usize, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { index, message }
    }

    /// Slot left empty after the join barrier; only reachable if a worker
    /// thread died outside the per-job panic guard.
    pub(crate) fn unsettled(index: usize) -> Self {
        Self {
            index,
            message: "job never settled".to_string(),
        }
    }
}

// ============================================================================
// Stage Errors
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum LyricsError {
    #[error("no tracks found for query {query:?}")]
    NotFound { query: String },

    #[error("lyrics are empty for query {query:?}")]
    EmptyResult { query: String },

    #[error("lyrics lookup failed for query {query:?}: {source}")]
    Provider {
        query: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Panicked(#[from] WorkerPanic),
}

impl Classify for LyricsError {
    fn kind(&self) -> ErrorKind {
        match self {
            LyricsError::NotFound { .. } => ErrorKind::NotFound,
            LyricsError::EmptyResult { .. } => ErrorKind::EmptyResult,
            LyricsError::Provider { .. } | LyricsError::Panicked(_) => ErrorKind::ProviderError,
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("couldn't write metadata to {}: {source}", .path.display())]
    Tool {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("couldn't {op} {}: {source}", .path.display())]
    FileSystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Panicked(#[from] WorkerPanic),
}

impl Classify for WriteError {
    fn kind(&self) -> ErrorKind {
        match self {
            WriteError::Tool { .. } | WriteError::Panicked(_) => ErrorKind::ToolInvocationFailed,
            WriteError::FileSystem { .. } => ErrorKind::FileSystemError,
        }
    }
}

/// Fatal precondition failures. Reported once; no batch runs afterwards.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("couldn't get current working directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("couldn't get stat of input path {}: {source}", .path.display())]
    InputPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input path {} is neither a regular file nor a directory", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("couldn't read directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no usable ffmpeg executable (tried: {tried})")]
    ToolNotFound { tried: String },
}
