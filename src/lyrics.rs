//! Lyrics retrieval stage.
//!
//! Maps every query of a batch to either lyrics text or a typed failure,
//! using a shared [`LyricsProvider`] under a fixed concurrency policy.

use indicatif::ProgressBar;
use std::num::NonZeroUsize;
use tracing::{info, warn};

use crate::error::{Classify, LyricsError, ProviderError};
use crate::executor::{BatchExecutor, Concurrency};
use crate::models::{BatchResult, Outcome, Track};

/// Concurrent provider lookups per batch.
pub const LYRICS_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => panic!("lyrics concurrency must be non-zero"),
};

/// Query → text contract of an external lyrics source.
///
/// Implementations are shared by all concurrent lookups of a batch, so they
/// must be safe for concurrent use.
pub trait LyricsProvider: Send + Sync {
    /// Search matches for `query`, best first.
    fn search(&self, query: &str) -> Result<Vec<Track>, ProviderError>;

    /// Lyrics text of the track with id `track_id`; may be empty.
    fn lyrics(&self, track_id: &str) -> Result<String, ProviderError>;
}

impl<P: LyricsProvider + ?Sized> LyricsProvider for &P {
    fn search(&self, query: &str) -> Result<Vec<Track>, ProviderError> {
        (**self).search(query)
    }

    fn lyrics(&self, track_id: &str) -> Result<String, ProviderError> {
        (**self).lyrics(track_id)
    }
}

pub struct LyricsStage<P> {
    provider: P,
    executor: BatchExecutor,
}

impl<P: LyricsProvider> LyricsStage<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            executor: BatchExecutor::new(Concurrency::Bounded(LYRICS_CONCURRENCY)),
        }
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.executor = self.executor.with_progress("lyrics", pb);
        self
    }

    /// Look up lyrics for every query; `result[i]` answers `queries[i]`.
    pub fn fetch_all(&self, queries: Vec<String>) -> BatchResult<String, LyricsError> {
        self.executor.run(queries, |query| {
            let outcome = self.fetch_one(&query);
            match &outcome {
                Ok(lyrics) => info!(query = %query, len = lyrics.len(), "lyrics found"),
                Err(e) => warn!(query = %query, kind = e.kind().as_str(), "{}", e),
            }
            outcome
        })
    }

    /// Top search match, then its lyrics.
    pub fn fetch_one(&self, query: &str) -> Outcome<String, LyricsError> {
        let tracks = self.provider.search(query).map_err(|source| LyricsError::Provider {
            query: query.to_string(),
            source,
        })?;
        let track = tracks.into_iter().next().ok_or_else(|| LyricsError::NotFound {
            query: query.to_string(),
        })?;

        let lyrics = self.provider.lyrics(&track.id).map_err(|source| LyricsError::Provider {
            query: query.to_string(),
            source,
        })?;
        if lyrics.trim().is_empty() {
            return Err(LyricsError::EmptyResult {
                query: query.to_string(),
            });
        }
        Ok(lyrics)
    }
}
