/*!
 * Output path resolution.
 *
 * Computes where a produced video goes: alongside its source in
 * same-as-source mode, otherwise under the output directory (optionally
 * mirroring the input layout). A numeric disambiguator is appended to the
 * stem until no file with the output extension exists there.
 *
 * The existence check and the later write are not atomic. Batches run one
 * pair at a time, so only an outside writer can race it.
 */

use std::path::{Path, PathBuf};

use crate::file_utils::{FileManager, OUTPUT_EXTENSION};

/// Paths computed for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    /// Extension-less path the output would take without disambiguation
    pub original_stem: PathBuf,
    /// Final, collision-free output file (with extension)
    pub video_path: PathBuf,
    /// Directory subtitle tracks are extracted into
    pub subtitle_dir: PathBuf,
}

impl ResolvedOutput {
    /// `original_stem` with the output extension, the name taken over on cleanup
    pub fn original_video_path(&self) -> PathBuf {
        FileManager::with_appended_extension(&self.original_stem, OUTPUT_EXTENSION)
    }
}

/// Resolves output paths for a batch
#[derive(Debug, Clone)]
pub struct PathResolver {
    extension: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(OUTPUT_EXTENSION)
    }
}

impl PathResolver {
    /// Create a resolver producing files with the given extension
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Directory of `video` relative to `input_root`, empty when it sits in the root
    pub fn relative_subpath(video: &Path, input_root: &Path) -> PathBuf {
        video
            .parent()
            .and_then(|parent| parent.strip_prefix(input_root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Resolve where the output for `video_input` is written.
    ///
    /// `relative_subpath` is only joined in when the output tree mirrors the input.
    pub fn resolve_output_path(
        &self,
        video_input: &Path,
        output_dir: &Path,
        relative_subpath: &Path,
        same_as_source: bool,
    ) -> ResolvedOutput {
        let stem = video_input.file_stem().unwrap_or_default();

        let (original_stem, subtitle_dir) = if same_as_source {
            let dir = video_input.parent().map(Path::to_path_buf).unwrap_or_default();
            (dir.join(stem), dir)
        } else {
            let dir = output_dir.join(relative_subpath);
            (dir.join(stem), dir)
        };

        let unique_stem = self.unique_stem(&original_stem);
        let video_path = FileManager::with_appended_extension(&unique_stem, &self.extension);

        ResolvedOutput {
            original_stem,
            video_path,
            subtitle_dir,
        }
    }

    /// First of `stem`, `stem (1)`, `stem (2)`, ... whose output file does not exist.
    ///
    /// The disambiguator goes on the stem, so the extension is never split.
    pub fn unique_stem(&self, stem: &Path) -> PathBuf {
        let candidate = FileManager::with_appended_extension(stem, &self.extension);
        if !candidate.exists() {
            return stem.to_path_buf();
        }

        let mut index: u32 = 1;
        loop {
            let mut numbered = stem.as_os_str().to_os_string();
            numbered.push(format!(" ({})", index));
            let numbered = PathBuf::from(numbered);

            let candidate = FileManager::with_appended_extension(&numbered, &self.extension);
            if !candidate.exists() {
                return numbered;
            }
            index += 1;
        }
    }
}
