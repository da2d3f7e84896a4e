//! Batch discovery.
//!
//! Resolves an input path (single video or a directory tree of videos) into the
//! ordered list of work items for a run.

use crate::error::{Result, VidnotesError};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Accepted video container extensions (matched case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpeg", "mpg", "3gp",
];

/// A source video and the key that names all of its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    source: PathBuf,
    key: String,
}

impl WorkItem {
    /// Create a work item for an eligible video file.
    pub fn new(source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        if !is_video_file(&source) {
            return Err(VidnotesError::InvalidInput(format!(
                "Not a supported video file: {} (expected one of: {})",
                source.display(),
                VIDEO_EXTENSIONS.join(", ")
            )));
        }

        let key = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                VidnotesError::InvalidInput(format!("Cannot derive a name from {}", source.display()))
            })?;

        Ok(Self { source, key })
    }

    /// Path of the source video.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Stable key derived from the source filename.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Check if path has a supported video extension.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Resolve an input path into work items.
///
/// A directory is walked recursively and yields its eligible files in
/// lexicographic order of their path relative to `input`. Hidden entries are
/// skipped. Fails when the path does not exist, a single file is not a
/// supported video, a directory tree holds no supported videos, or two
/// videos would share an item key (compared case-insensitively).
pub fn discover(input: &Path) -> Result<Vec<WorkItem>> {
    if !input.exists() {
        return Err(VidnotesError::InvalidInput(format!(
            "Input path does not exist: {}",
            input.display()
        )));
    }

    if input.is_file() {
        return Ok(vec![WorkItem::new(input)?]);
    }

    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort_by(|a, b| a.strip_prefix(input).ok().cmp(&b.strip_prefix(input).ok()));

    if files.is_empty() {
        return Err(VidnotesError::InvalidInput(format!(
            "No supported video files found in {}",
            input.display()
        )));
    }

    let items = files
        .into_iter()
        .map(WorkItem::new)
        .collect::<Result<Vec<_>>>()?;

    // keys name files, so compare them the way case-insensitive filesystems do
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for item in &items {
        if let Some(other) = seen.insert(item.key().to_lowercase(), item.source()) {
            return Err(VidnotesError::InvalidInput(format!(
                "{} and {} would both produce artifacts named '{}'",
                other.display(),
                item.source().display(),
                item.key()
            )));
        }
    }

    debug!("Discovered {} videos in {}", items.len(), input.display());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"video").unwrap();
        path
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file(Path::new("lecture.mp4")));
        assert!(is_video_file(Path::new("lecture.MKV")));
        assert!(is_video_file(Path::new("/path/to/talk.Mov")));
        assert!(!is_video_file(Path::new("audio.mp3")));
        assert!(!is_video_file(Path::new("notes")));
    }

    #[test]
    fn test_directory_order_is_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "lec2.mp4");
        touch(dir.path(), "lec10.mkv");
        touch(dir.path(), "lec1.MP4");
        touch(dir.path(), "readme.txt");

        let items = discover(dir.path()).unwrap();
        let keys: Vec<_> = items.iter().map(|i| i.key()).collect();
        assert_eq!(keys, ["lec1", "lec10", "lec2"]);
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = touch(dir.path(), "week 3.webm");

        let items = discover(&video).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key(), "week 3");
        assert_eq!(items[0].source(), video.as_path());
    }

    #[test]
    fn test_single_unsupported_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = touch(dir.path(), "slides.pdf");
        assert!(matches!(discover(&doc), Err(VidnotesError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(discover(dir.path()), Err(VidnotesError::InvalidInput(_))));
    }

    #[test]
    fn test_directory_with_only_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "lecture.wav");
        assert!(matches!(discover(dir.path()), Err(VidnotesError::InvalidInput(_))));
    }

    #[test]
    fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        assert!(matches!(discover(&missing), Err(VidnotesError::InvalidInput(_))));
    }

    #[test]
    fn test_nested_directories_are_walked() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("week2")).unwrap();
        std::fs::create_dir_all(dir.path().join("week1/extra")).unwrap();
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        touch(&dir.path().join("week2"), "intro.mp4");
        touch(&dir.path().join("week1"), "lec1.mp4");
        touch(&dir.path().join("week1/extra"), "bonus.mkv");
        touch(&dir.path().join(".cache"), "thumb.mp4");

        let items = discover(dir.path()).unwrap();
        let keys: Vec<_> = items.iter().map(|i| i.key()).collect();
        assert_eq!(keys, ["bonus", "lec1", "intro"]);
        assert_eq!(items[1].source(), dir.path().join("week1/lec1.mp4").as_path());
    }

    #[test]
    fn test_only_nested_video() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("week1")).unwrap();
        touch(&dir.path().join("week1"), "lec1.mp4");

        let items = discover(dir.path()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key(), "lec1");
    }

    #[test]
    fn test_keys_colliding_by_case_rejected() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Lec1.mp4");
        touch(dir.path(), "lec1.mkv");

        assert!(matches!(discover(dir.path()), Err(VidnotesError::InvalidInput(_))));
    }

    #[test]
    fn test_keys_colliding_across_folders_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        touch(&dir.path().join("a"), "intro.mp4");
        touch(&dir.path().join("b"), "intro.mp4");

        assert!(matches!(discover(dir.path()), Err(VidnotesError::InvalidInput(_))));
    }

    #[test]
    fn test_colliding_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "intro.mp4");
        touch(dir.path(), "intro.mkv");

        let err = discover(dir.path()).unwrap_err();
        assert!(err.to_string().contains("intro"));
    }
}
