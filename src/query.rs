//! Search query derivation from audio file names.
//!
//! File names usually look like `03 - Artist - Title (Official Video).mp3`.
//! The provider search works best on the bare `Artist - Title`, so common
//! numbering and decoration patterns are stripped. Case is preserved.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Matches track number prefixes like "03 - ", "Track 5 - ", "01. ", etc.
static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:track\s*)?\d{1,4}\s*[-–—._]\s*").unwrap());

/// Matches track number in brackets: "[01] Song", "[12] Title"
static TRACK_NUMBER_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d{1,2}\]\s*").unwrap());

/// Matches bracket suffixes like [Mono], [RM1], [Live], etc.
static BRACKET_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\]]+\]\s*$").unwrap());

/// Matches year suffix like (1964), (2009), etc.
static YEAR_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d{4}\)\s*$").unwrap());

/// Matches mojibake replacement characters at end of string
static MOJIBAKE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{FFFD}]+$").unwrap());

/// Video/upload decorations that never belong to a track title.
static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // "(Official Video)", "(Lyric Video)", "(Visualiser)", "(Audio)"
        Regex::new(r"(?i)\s*[\(\[](?:official\s+)?(?:music\s+|lyric\s+)?(?:video|audio|visuali[sz]er)(?:\s+\d{4})?[\)\]]").unwrap(),
        // "(HD)", "[HQ]", "(4K)"
        Regex::new(r"(?i)\s*[\(\[](?:hd|hq|4k)[\)\]]").unwrap(),
        // URL suffixes: "Song - SongsLover.com"
        Regex::new(r"(?i)\s*[-–—_]?\s*[a-z0-9]+\.(?:com|net|org|io|ru)\s*$").unwrap(),
    ]
});

/// Regex to collapse multiple whitespace into single space
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// QUERY DERIVATION
// ============================================================================

/// Strip numbering and decorations from a raw file stem.
pub fn clean_query(raw: &str) -> String {
    let mut s = raw.replace('_', " ");

    s = MOJIBAKE_SUFFIX.replace(&s, "").to_string();
    s = TRACK_NUMBER_BRACKET.replace(&s, "").to_string();
    s = TRACK_NUMBER_PREFIX.replace(&s, "").to_string();
    for pattern in NOISE_PATTERNS.iter() {
        s = pattern.replace_all(&s, "").to_string();
    }
    s = BRACKET_SUFFIX.replace(&s, "").to_string();
    s = YEAR_SUFFIX.replace(&s, "").to_string();

    MULTI_SPACE.replace_all(&s, " ").trim().to_string()
}

/// Search query for one audio file. Falls back to the raw stem when
/// cleaning would leave nothing to search for.
pub fn query_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned = clean_query(&stem);
    if cleaned.is_empty() {
        stem.trim().to_string()
    } else {
        cleaned
    }
}

/// Queries for a batch of files, index-aligned with `paths`.
pub fn queries_for(paths: &[PathBuf]) -> Vec<String> {
    paths.par_iter().map(|p| query_from_path(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_unchanged() {
        assert_eq!(
            query_from_path(Path::new("/mnt/d/Ayano Mashiro - Gentou.mp3")),
            "Ayano Mashiro - Gentou"
        );
    }

    #[test]
    fn test_track_numbers_stripped() {
        assert_eq!(clean_query("03 - Artist - Song"), "Artist - Song");
        assert_eq!(clean_query("Track 5 - Song"), "Song");
        assert_eq!(clean_query("01. Song"), "Song");
        assert_eq!(clean_query("[01] Song"), "Song");
        // No separator: "1979" is a title, not a track number
        assert_eq!(clean_query("1979"), "1979");
    }

    #[test]
    fn test_decorations_stripped() {
        assert_eq!(
            query_from_path(Path::new("Artist_-_Song_(Official Video).ogg")),
            "Artist - Song"
        );
        assert_eq!(clean_query("Song [Live]"), "Song");
        assert_eq!(clean_query("Song (1999)"), "Song");
        assert_eq!(clean_query("Artist - Song (Lyric Video) (HD)"), "Artist - Song");
        assert_eq!(clean_query("Artist - Song - SongsLover.com"), "Artist - Song");
    }

    #[test]
    fn test_fallback_to_raw_stem() {
        assert_eq!(query_from_path(Path::new("/m/[01].mp3")), "[01]");
        assert_eq!(query_from_path(Path::new("/")), "");
    }

    #[test]
    fn test_queries_for_preserves_order() {
        let paths: Vec<PathBuf> = (0..50).map(|i| PathBuf::from(format!("/m/Song {i}.mp3"))).collect();
        let queries = queries_for(&paths);
        assert_eq!(queries.len(), 50);
        for (i, q) in queries.iter().enumerate() {
            assert_eq!(q, &format!("Song {i}"));
        }
    }
}
