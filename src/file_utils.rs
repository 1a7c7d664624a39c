use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::fs::OpenOptions;
use std::io::Write;
use chrono::Local;
use log::warn;
use tempfile::NamedTempFile;

// @module: File and directory utilities

/// Video file extensions recognized by the matcher (lowercase, no dot)
pub const VIDEO_EXTENSIONS: [&str; 12] = [
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v",
    "mpg", "mpeg", "ts", "m2ts",
];

/// Subtitle file extensions recognized by the matcher (lowercase, no dot)
pub const SUBTITLE_EXTENSIONS: [&str; 7] = ["srt", "ass", "ssa", "sub", "idx", "vtt", "sup"];

/// Subtitle formats stored as text, the only ones the sanitizer touches
pub const TEXT_SUBTITLE_EXTENSIONS: [&str; 4] = ["srt", "ass", "ssa", "vtt"];

/// Extension of every produced video file
pub const OUTPUT_EXTENSION: &str = "mkv";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @checks: Directory has no entries left
    pub fn is_dir_empty<P: AsRef<Path>>(path: P) -> std::io::Result<bool> {
        Ok(fs::read_dir(path)?.next().is_none())
    }

    /// Append `.ext` to a path without touching any dot already in the file name
    pub fn with_appended_extension<P: AsRef<Path>>(path: P, extension: &str) -> PathBuf {
        let mut raw = path.as_ref().as_os_str().to_os_string();
        raw.push(".");
        raw.push(extension);
        PathBuf::from(raw)
    }

    /// Lowercase extension of a path, if any
    pub fn extension_lowercase<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Replace a file's content through a temp file in the same directory.
    ///
    /// Readers see either the old content or the new content, never a partial write.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> std::io::Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;

        // Keep the original permissions on the replacement
        if let Ok(metadata) = fs::metadata(path) {
            if let Err(e) = fs::set_permissions(temp.path(), metadata.permissions()) {
                warn!("Could not copy permissions of {:?} to the rewritten file: {}", path, e);
            }
        }

        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Append content to a log file with timestamp
    pub fn append_to_log_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Get current timestamp
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        // Open file in append mode, create if it doesn't exist
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path.as_ref()))?;

        writeln!(file, "[{}] {}", timestamp, content)
            .with_context(|| format!("Failed to write to log file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Text subtitle formats (bitmap formats such as VobSub or PGS are not)
    pub fn is_text_subtitle<P: AsRef<Path>>(path: P) -> bool {
        Self::extension_lowercase(path)
            .is_some_and(|ext| TEXT_SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Classify a path by its extension
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> FileType {
        match Self::extension_lowercase(path) {
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => FileType::Video,
            Some(ext) if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) => FileType::Subtitle,
            _ => FileType::Unknown,
        }
    }
}

/// Enum representing different file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Subtitle file
    Subtitle,
    /// Video file the external tool can read
    Video,
    /// Anything else
    Unknown,
}
