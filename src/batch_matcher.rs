/*!
 * Video/subtitle pairing.
 *
 * Walks an input tree and pairs every video with the subtitles sharing its
 * directory and stem. Pairs come out grouped by directory in path order,
 * files in name order, so identical trees always give the same sequence.
 */

use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::BatchError;
use crate::file_utils::{FileManager, FileType};

/// One video and the subtitles that belong to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePair {
    /// Video file
    pub video: PathBuf,
    /// Matching subtitle files in name order; empty for video-only operations
    pub subtitles: Vec<PathBuf>,
}

/// Matcher output
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Pairs in processing order
    pub files: Vec<FilePair>,
    /// Set when matching degraded (skipped videos, orphan subtitles, nothing found)
    pub warning: Option<String>,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Directory walker producing file pairs
#[derive(Debug, Clone, Default)]
pub struct BatchMatcher;

#[derive(Default)]
struct DirectoryListing {
    videos: Vec<PathBuf>,
    subtitles: Vec<PathBuf>,
}

impl BatchMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Pair videos with subtitles under `directory`.
    ///
    /// With `video_only`, subtitles are neither required nor attached. Otherwise
    /// videos without any subtitle are left out and reported in the warning.
    pub fn get_files<P: AsRef<Path>>(&self, directory: P, video_only: bool) -> Result<BatchResult, BatchError> {
        let directory = directory.as_ref();

        if !FileManager::dir_exists(directory) {
            return Err(BatchError::InputDirectory {
                path: directory.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        // Keyed by directory so pairs come out sorted by path
        let mut listings: BTreeMap<PathBuf, DirectoryListing> = BTreeMap::new();

        let walker = WalkDir::new(directory)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

            match FileManager::detect_file_type(&path) {
                FileType::Video => listings.entry(parent).or_default().videos.push(path),
                FileType::Subtitle => listings.entry(parent).or_default().subtitles.push(path),
                FileType::Unknown => {}
            }
        }

        let mut files = Vec::new();
        let mut skipped_videos = 0usize;
        let mut orphan_subtitles = 0usize;

        for (dir, listing) in &listings {
            let owners: Vec<Option<usize>> = listing
                .subtitles
                .iter()
                .map(|subtitle| Self::owning_video(&listing.videos, subtitle))
                .collect();
            let mut claimed = vec![false; listing.subtitles.len()];

            for (video_index, video) in listing.videos.iter().enumerate() {
                if video_only {
                    files.push(FilePair {
                        video: video.clone(),
                        subtitles: Vec::new(),
                    });
                    continue;
                }

                let subtitles: Vec<PathBuf> = listing
                    .subtitles
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| owners[*index] == Some(video_index))
                    .map(|(index, subtitle)| {
                        claimed[index] = true;
                        subtitle.clone()
                    })
                    .collect();

                if subtitles.is_empty() {
                    debug!("No subtitle found for {:?}", video);
                    skipped_videos += 1;
                    continue;
                }

                files.push(FilePair {
                    video: video.clone(),
                    subtitles,
                });
            }

            if !video_only {
                let orphans = claimed.iter().filter(|c| !**c).count();
                if orphans > 0 {
                    debug!("{} subtitle(s) without a video in {:?}", orphans, dir);
                }
                orphan_subtitles += orphans;
            }
        }

        let warning = if files.is_empty() {
            Some(if video_only {
                "No video files were found in the selected directory.".to_string()
            } else {
                "No video files with matching subtitles were found in the selected directory.".to_string()
            })
        } else {
            Self::degraded_warning(skipped_videos, orphan_subtitles)
        };

        Ok(BatchResult { files, warning })
    }

    /// `movie.srt`, `movie.en.srt` and `movie.en.forced.srt` all belong to `movie.*`
    fn subtitle_matches(video_stem: &str, subtitle: &Path) -> bool {
        let file_name = match subtitle.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };

        match file_name.strip_prefix(video_stem) {
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }

    /// Index of the video a subtitle belongs to. With overlapping stems
    /// (`Show` and `Show.Extended`) the longest matching stem wins.
    fn owning_video(videos: &[PathBuf], subtitle: &Path) -> Option<usize> {
        videos
            .iter()
            .enumerate()
            .filter_map(|(index, video)| {
                let stem = video.file_stem()?.to_string_lossy().to_string();
                Self::subtitle_matches(&stem, subtitle).then_some((index, stem.len()))
            })
            // Ties (same stem, different container) go to the first video in name order
            .max_by(|(a_index, a_len), (b_index, b_len)| a_len.cmp(b_len).then(b_index.cmp(a_index)))
            .map(|(index, _)| index)
    }

    fn degraded_warning(skipped_videos: usize, orphan_subtitles: usize) -> Option<String> {
        let mut parts = Vec::new();
        if skipped_videos > 0 {
            parts.push(format!("{} video file(s) had no matching subtitles and were skipped", skipped_videos));
        }
        if orphan_subtitles > 0 {
            parts.push(format!("{} subtitle file(s) had no matching video", orphan_subtitles));
        }

        if parts.is_empty() {
            None
        } else {
            Some(format!("{}.", parts.join("; ")))
        }
    }
}
