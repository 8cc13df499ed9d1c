//! Two-phase run: every lyrics lookup settles before any file is written.
//!
//! Files whose lookup failed never reach the metadata stage. In simulate mode
//! there is no metadata stage at all and found lyrics are only reported.

use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::error::{Classify, ErrorKind, LyricsError, WriteError};
use crate::lyrics::{LyricsProvider, LyricsStage};
use crate::metadata::{MetadataStage, TagWriter};
use crate::models::{FileStatus, Outcome, WriteJob};
use crate::query::queries_for;
use crate::report::summarize;

/// Why a file did not end up tagged.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(transparent)]
    Lyrics(#[from] LyricsError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl Classify for FileError {
    fn kind(&self) -> ErrorKind {
        match self {
            FileError::Lyrics(e) => e.kind(),
            FileError::Write(e) => e.kind(),
        }
    }
}

/// End state of one input file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub query: String,
    /// Byte length of the lyrics found, if any.
    pub lyrics_len: Option<usize>,
    pub result: Outcome<FileStatus, FileError>,
}

pub struct Pipeline<P, W> {
    lyrics: LyricsStage<P>,
    /// `None` in simulate mode.
    metadata: Option<MetadataStage<W>>,
}

impl<P: LyricsProvider, W: TagWriter> Pipeline<P, W> {
    pub fn new(lyrics: LyricsStage<P>, metadata: MetadataStage<W>) -> Self {
        Self {
            lyrics,
            metadata: Some(metadata),
        }
    }

    pub fn simulate(lyrics: LyricsStage<P>) -> Self {
        Self { lyrics, metadata: None }
    }

    pub fn is_simulate(&self) -> bool {
        self.metadata.is_none()
    }

    /// Process `files`; the returned outcomes are index-aligned with it.
    pub fn run(&self, files: Vec<PathBuf>) -> Vec<FileOutcome> {
        let queries = queries_for(&files);
        let fetched = self.lyrics.fetch_all(queries.clone());
        info!("lyrics: {}", summarize(&fetched));

        let mut outcomes: Vec<FileOutcome> = Vec::with_capacity(files.len());
        let mut jobs = Vec::new();
        let mut job_index = Vec::new();

        for (i, ((path, query), lyrics)) in files.into_iter().zip(queries).zip(fetched).enumerate() {
            let (lyrics_len, result) = match lyrics {
                Ok(text) => {
                    let len = text.len();
                    if self.metadata.is_some() {
                        jobs.push(WriteJob::new(path.clone(), text));
                        job_index.push(i);
                    }
                    (Some(len), Ok(FileStatus::Found))
                }
                Err(e) => (None, Err(FileError::from(e))),
            };
            outcomes.push(FileOutcome {
                path,
                query,
                lyrics_len,
                result,
            });
        }

        if let Some(metadata) = &self.metadata {
            let written = metadata.write_all(jobs);
            info!("metadata: {}", summarize(&written));
            for (i, result) in job_index.into_iter().zip(written) {
                outcomes[i].result = result.map(|()| FileStatus::Written).map_err(FileError::from);
            }
        }

        outcomes
    }
}
