//! Input discovery: path resolution, directory walking and audio filtering.

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::SetupError;
use crate::metadata::is_temp_output;

/// Extensions (lowercase, without dot) recognized as taggable audio files.
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "ogg"];

/// Lexically normalize a path: drop `.` segments and resolve `..` against
/// preceding segments without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Resolve `path` against the current working directory and clean it.
/// An empty path resolves to the working directory itself.
pub fn to_abs(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(clean_path(path));
    }
    Ok(clean_path(&env::current_dir()?.join(path)))
}

pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MUSIC_EXTENSIONS.iter().any(|m| e.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

/// Keep audio files, dropping temp outputs left behind by an interrupted run.
pub fn filter_music_files(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|p| is_music_file(p) && !is_temp_output(p))
        .collect()
}

/// Source of candidate files under a root directory.
pub trait FileScanner {
    /// Regular files under `root` as absolute paths, in a stable order.
    /// Sub-directories are only entered when `recursive` is set.
    fn scan(&self, root: &Path, recursive: bool) -> Result<Vec<PathBuf>, SetupError>;
}

/// [`FileScanner`] over the local filesystem. Symlinks are not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirScanner;

impl FileScanner for DirScanner {
    fn scan(&self, root: &Path, recursive: bool) -> Result<Vec<PathBuf>, SetupError> {
        let root = to_abs(root).map_err(SetupError::CurrentDir)?;
        let max_depth = if recursive { usize::MAX } else { 1 };

        let mut files = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| SetupError::ReadDir {
                path: source.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone()),
                source,
            })?;
            if entry.file_type().is_file() {
                files.push(clean_path(entry.path()));
            }
        }
        Ok(files)
    }
}

/// Resolve the user's input path into the ordered list of audio files to
/// process. A regular file is taken as-is (still subject to the extension
/// filter); a directory is scanned.
pub fn collect_music_files(
    scanner: &dyn FileScanner,
    input: &Path,
    recursive: bool,
) -> Result<Vec<PathBuf>, SetupError> {
    let input = to_abs(input).map_err(SetupError::CurrentDir)?;
    let meta = fs::metadata(&input).map_err(|source| SetupError::InputPath {
        path: input.clone(),
        source,
    })?;

    let candidates = if meta.is_file() {
        vec![input]
    } else if meta.is_dir() {
        scanner.scan(&input, recursive)?
    } else {
        return Err(SetupError::UnsupportedInput(input));
    };
    Ok(filter_music_files(candidates))
}
