//! Metadata writing stage.
//!
//! For every `(file, lyrics)` job the external tool writes a tagged copy to
//! a temporary path next to the original, then the copy replaces the
//! original. The temporary path is owned by a guard that removes it on every
//! exit path, so no `*.lyrics-tmp.*` file survives a batch.

use indicatif::ProgressBar;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::{Classify, SetupError, ToolError, WriteError};
use crate::executor::{BatchExecutor, Concurrency};
use crate::models::{BatchResult, Outcome, WriteJob};
use crate::scan::to_abs;

/// Inserted between stem and extension to form the temporary output path.
pub const TEMP_INFIX: &str = "lyrics-tmp";

/// Metadata key the lyrics are stored under.
pub const LYRICS_KEY: &str = "lyrics";

/// Executables tried, in order, after a user-supplied path.
const FFMPEG_CANDIDATES: &[&str] = &["ffmpeg", "ffmpeg.exe"];

// ============================================================================
// External Tool
// ============================================================================

/// Out-of-process tag writer.
///
/// Must write a tagged copy of `input` to `output` without modifying
/// `input`, and report failure as an error.
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, input: &Path, tags: &[(String, String)], output: &Path) -> Result<(), ToolError>;
}

impl<W: TagWriter + ?Sized> TagWriter for &W {
    fn write_tags(&self, input: &Path, tags: &[(String, String)], output: &Path) -> Result<(), ToolError> {
        (**self).write_tags(input, tags, output)
    }
}

/// [`TagWriter`] backed by an `ffmpeg` executable. Streams are copied, not
/// re-encoded.
#[derive(Debug, Clone)]
pub struct FfmpegTagWriter {
    program: PathBuf,
}

impl FfmpegTagWriter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Find a working ffmpeg: `preferred` first, then the PATH candidates.
    /// Each candidate is probed with `-version`.
    pub fn discover(preferred: Option<&Path>) -> Result<Self, SetupError> {
        let candidates: Vec<PathBuf> = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(FFMPEG_CANDIDATES.iter().map(PathBuf::from))
            .collect();
        Self::discover_from(&candidates)
    }

    /// First candidate that answers `-version` successfully.
    fn discover_from(candidates: &[PathBuf]) -> Result<Self, SetupError> {
        for candidate in candidates {
            let probe = Command::new(candidate)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match probe {
                Ok(status) if status.success() => return Ok(Self::new(candidate)),
                Ok(status) => debug!(candidate = %candidate.display(), %status, "ffmpeg probe failed"),
                Err(e) => debug!(candidate = %candidate.display(), error = %e, "ffmpeg probe failed"),
            }
        }

        Err(SetupError::ToolNotFound {
            tried: candidates
                .iter()
                .map(|c| c.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Arguments for one invocation. Tags are emitted in the given order.
    pub fn command_args(input: &Path, tags: &[(String, String)], output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        for flag in ["-map", "0", "-c", "copy"] {
            args.push(flag.into());
        }
        for (key, value) in tags {
            args.push("-metadata:s:0".into());
            args.push(format!("{key}={value}").into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl TagWriter for FfmpegTagWriter {
    fn write_tags(&self, input: &Path, tags: &[(String, String)], output: &Path) -> Result<(), ToolError> {
        let program = self.program.display().to_string();
        let result = Command::new(&self.program)
            .args(Self::command_args(input, tags, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ToolError::Launch {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(ToolError::Exit {
                program,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Temporary Output
// ============================================================================

/// `/dir/song.mp3` → `/dir/song.lyrics-tmp.mp3`. The extension is kept so
/// the tool can pick the output container from it.
pub fn temp_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let mut name = OsString::from(stem);
    name.push(".");
    name.push(TEMP_INFIX);
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    input.with_file_name(name)
}

/// True for names produced by [`temp_output_path`]. Such files are only ever
/// leftovers of an interrupted run, never inputs.
pub fn is_temp_output(path: &Path) -> bool {
    let infix = format!(".{TEMP_INFIX}");
    path.file_name()
        .map(|n| n.to_string_lossy())
        .map(|n| n.ends_with(&infix) || n.contains(&format!("{infix}.")))
        .unwrap_or(false)
}

/// Owns a temporary path and removes it when dropped.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "couldn't remove temporary file"),
        }
    }
}

// ============================================================================
// Replace
// ============================================================================

/// How the tagged copy takes the original's place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReplaceStrategy {
    /// Single rename over the original. If the rename fails the original is
    /// still in place.
    #[default]
    RenameOver,
    /// Remove the original, then rename. If the rename fails after the
    /// removal, the original is gone and only the tagged copy existed.
    RemoveThenRename,
}

fn replace_file(tagged: &Path, original: &Path, strategy: ReplaceStrategy) -> Result<(), WriteError> {
    if strategy == ReplaceStrategy::RemoveThenRename {
        fs::remove_file(original).map_err(|source| WriteError::FileSystem {
            op: "remove",
            path: original.to_path_buf(),
            source,
        })?;
    }
    fs::rename(tagged, original).map_err(|source| WriteError::FileSystem {
        op: "rename",
        path: tagged.to_path_buf(),
        source,
    })
}

// ============================================================================
// Stage
// ============================================================================

pub struct MetadataStage<W> {
    writer: W,
    executor: BatchExecutor,
    strategy: ReplaceStrategy,
}

impl<W: TagWriter> MetadataStage<W> {
    pub fn new(writer: W, concurrency: Concurrency) -> Self {
        Self {
            writer,
            executor: BatchExecutor::new(concurrency),
            strategy: ReplaceStrategy::default(),
        }
    }

    pub fn with_replace_strategy(mut self, strategy: ReplaceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.executor = self.executor.with_progress("metadata", pb);
        self
    }

    /// Embed lyrics into every file; `result[i]` answers `jobs[i]`.
    pub fn write_all(&self, jobs: Vec<WriteJob>) -> BatchResult<(), WriteError> {
        self.executor.run(jobs, |job| {
            let path = job.path.clone();
            let outcome = self.write_one(job);
            match &outcome {
                Ok(()) => info!(path = %path.display(), "metadata written"),
                Err(e) => warn!(path = %path.display(), kind = e.kind().as_str(), "{}", e),
            }
            outcome
        })
    }

    pub fn write_one(&self, job: WriteJob) -> Outcome<(), WriteError> {
        let path = to_abs(&job.path).map_err(|source| WriteError::FileSystem {
            op: "resolve",
            path: job.path.clone(),
            source,
        })?;
        // Another job's temp output would land on this file.
        if is_temp_output(&path) {
            return Err(WriteError::FileSystem {
                op: "tag",
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "name is reserved for temporary output"),
            });
        }

        let temp = TempFile::new(temp_output_path(&path));
        let tags = [(LYRICS_KEY.to_string(), job.lyrics)];
        self.writer
            .write_tags(&path, &tags, temp.path())
            .map_err(|source| WriteError::Tool {
                path: path.clone(),
                source,
            })?;

        replace_file(temp.path(), &path, self.strategy)
    }
}
