//! Lyrics tagger library - shared modules for the binary and its tests.

pub mod error;
pub mod executor;
pub mod lrclib;
pub mod lyrics;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod query;
pub mod report;
pub mod safety;
pub mod scan;
