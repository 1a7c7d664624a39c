use log::{debug, error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::{BatchRequest, Config, Settings};
use crate::batch_matcher::{BatchMatcher, FilePair};
use crate::errors::BatchError;
use crate::file_utils::FileManager;
use crate::language_utils::{self, LanguageSelection};
use crate::mux::{MkvToolNix, SubtitleTrack};
use crate::path_resolver::{PathResolver, ResolvedOutput};
use crate::progress::{LogProgress, ProgressReporter};
use crate::subtitle_sanitizer::SubtitleSanitizer;

// @module: Batch orchestration

/// Operation applied to every pair of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Copy videos without their subtitle tracks
    Remove,
    /// Pull subtitle tracks out of videos
    Extract,
    /// Add subtitle files to videos
    Merge,
}

impl Operation {
    /// Remove wins over extract, merge is the default
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.remove_subtitles {
            Operation::Remove
        } else if settings.extract_subtitles {
            Operation::Extract
        } else {
            Operation::Merge
        }
    }
}

/// Overall batch status as reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    #[serde(rename = "Batch complete")]
    Complete,
    #[serde(rename = "Warning")]
    Warning,
    #[serde(rename = "Error")]
    Error,
}

/// Result of one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairStatus {
    Success,
    Failed(String),
}

/// What happened to one pair
#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub video: PathBuf,
    /// Produced video (or extraction directory)
    pub output: Option<PathBuf>,
    pub status: PairStatus,
}

impl PairOutcome {
    fn success(video: &Path, output: PathBuf) -> Self {
        Self {
            video: video.to_path_buf(),
            output: Some(output),
            status: PairStatus::Success,
        }
    }

    fn failed(video: &Path, reason: String) -> Self {
        Self {
            video: video.to_path_buf(),
            output: None,
            status: PairStatus::Failed(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PairStatus::Success
    }
}

/// A failed pair as reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct PairFailure {
    pub video: PathBuf,
    pub reason: String,
}

/// Response of a batch call
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub status: BatchStatus,
    pub warning: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PairFailure>,
    /// Per-pair details, in processing order
    #[serde(skip)]
    pub outcomes: Vec<PairOutcome>,
}

impl BatchResponse {
    fn error(message: String, warning: Option<String>, outcomes: Vec<PairOutcome>) -> Self {
        let failures = Self::collect_failures(&outcomes);
        Self {
            status: BatchStatus::Error,
            warning,
            error: Some(message),
            failures,
            outcomes,
        }
    }

    fn from_outcomes(matcher_warning: Option<String>, outcomes: Vec<PairOutcome>) -> Self {
        let failures = Self::collect_failures(&outcomes);

        let mut warnings: Vec<String> = matcher_warning.into_iter().collect();
        if !failures.is_empty() {
            warnings.push(format!("{} of {} file(s) failed to process.", failures.len(), outcomes.len()));
        }

        let (status, warning) = if warnings.is_empty() {
            (BatchStatus::Complete, None)
        } else {
            (BatchStatus::Warning, Some(warnings.join(" ")))
        };

        Self {
            status,
            warning,
            error: None,
            failures,
            outcomes,
        }
    }

    fn collect_failures(outcomes: &[PairOutcome]) -> Vec<PairFailure> {
        outcomes
            .iter()
            .filter_map(|outcome| match &outcome.status {
                PairStatus::Failed(reason) => Some(PairFailure {
                    video: outcome.video.clone(),
                    reason: reason.clone(),
                }),
                PairStatus::Success => None,
            })
            .collect()
    }
}

/// Drives a batch: matching, per-pair operation, cleanup and reporting
#[derive(Debug)]
pub struct Controller {
    matcher: BatchMatcher,
    resolver: PathResolver,
    sanitizer: SubtitleSanitizer,
    mux: MkvToolNix,
    progress: Arc<dyn ProgressReporter>,
    error_log: Option<PathBuf>,
}

impl Controller {
    /// Create a controller from explicit collaborators
    pub fn new(mux: MkvToolNix, sanitizer: SubtitleSanitizer) -> Self {
        Self {
            matcher: BatchMatcher::new(),
            resolver: PathResolver::default(),
            sanitizer,
            mux,
            progress: Arc::new(LogProgress),
            error_log: None,
        }
    }

    // @method: Create a controller wired to real tools from the configuration
    pub fn with_config(config: &Config) -> Self {
        let mux = MkvToolNix::from_config(&config.tools);
        let sanitizer = SubtitleSanitizer::new(
            Box::new(crate::subtitle_sanitizer::StatisticalDetector),
            &config.sanitizer,
        );
        Self::new(mux, sanitizer).with_error_log(config.resolved_error_log_path())
    }

    /// Send progress events to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Append terminal errors to `path`
    pub fn with_error_log(mut self, path: PathBuf) -> Self {
        self.error_log = Some(path);
        self
    }

    /// Languages offered for merged subtitle tracks
    pub fn supported_languages(&self) -> &'static [LanguageSelection] {
        language_utils::supported_languages()
    }

    /// Process one batch request.
    ///
    /// Never fails: terminal errors are logged and turned into an "Error" response.
    pub async fn process_batch(&self, request: &BatchRequest) -> BatchResponse {
        if let Err(e) = request.validate() {
            let message = format!("{:#}", e);
            self.log_terminal_error("request", &message);
            return BatchResponse::error(message, None, Vec::new());
        }

        let selected = Self::selected_language(&request.settings.language);
        let operation = Operation::from_settings(&request.settings);
        info!("Starting {:?} batch for {}", operation, request.input.display());

        let batch = match self.matcher.get_files(&request.input, request.settings.is_video_only()) {
            Ok(batch) => batch,
            Err(e) => {
                let message = e.to_string();
                self.log_terminal_error("matcher", &message);
                return BatchResponse::error(message, None, Vec::new());
            }
        };

        self.progress.batch_size(batch.files.len());

        if batch.is_empty() {
            self.progress.finished();
            let message = BatchError::NoFilesFound.to_string();
            warn!("{}", message);
            return BatchResponse::error(message, batch.warning, Vec::new());
        }

        if let Some(warning) = &batch.warning {
            warn!("{}", warning);
        }

        let mut outcomes = Vec::with_capacity(batch.files.len());
        for (index, pair) in batch.files.iter().enumerate() {
            self.progress.processing_next(index, pair);

            match self.process_pair(request, operation, &selected, pair).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if !e.is_fatal() => {
                    error!("Skipping {:?}: {}", pair.video, e);
                    outcomes.push(PairOutcome::failed(&pair.video, e.to_string()));
                }
                Err(e) => {
                    // The tree is in an unknown state; stop here
                    let message = e.to_string();
                    self.log_terminal_error("batch", &message);
                    self.progress.finished();
                    return BatchResponse::error(message, batch.warning, outcomes);
                }
            }
        }

        self.progress.finished();

        let response = BatchResponse::from_outcomes(batch.warning, outcomes);
        info!(
            "Batch finished: {} processed, {} failed",
            response.outcomes.len(),
            response.failures.len()
        );
        response
    }

    /// Run the batch operation on one pair.
    ///
    /// Tool and encoding errors only fail this pair; filesystem errors
    /// (`BatchError::is_fatal`) stop the batch.
    async fn process_pair(
        &self,
        request: &BatchRequest,
        operation: Operation,
        selected: &LanguageSelection,
        pair: &FilePair,
    ) -> Result<PairOutcome, BatchError> {
        let settings = &request.settings;

        let relative_subpath = if settings.remember_output_dir {
            PathResolver::relative_subpath(&pair.video, &request.input)
        } else {
            PathBuf::new()
        };

        let resolved = self.resolver.resolve_output_path(
            &pair.video,
            &request.output,
            &relative_subpath,
            settings.same_as_source,
        );

        let consumed_subtitles: Vec<PathBuf> = match operation {
            Operation::Remove => {
                Self::ensure_parent(&resolved.video_path)?;
                self.mux
                    .remove_subtitles(&pair.video, &resolved.video_path)
                    .await
                    .inspect_err(|_| Self::discard_partial_output(&resolved.video_path))?;
                pair.subtitles.clone()
            }
            Operation::Extract => {
                if !settings.same_as_source {
                    fs::create_dir_all(&resolved.subtitle_dir)
                        .map_err(|e| BatchError::filesystem("create directory", &resolved.subtitle_dir, e))?;
                }
                let files = self.mux.extract_subtitles(&pair.video, &resolved.subtitle_dir).await?;
                debug!("Extracted {} track(s) from {:?}", files.len(), pair.video);
                return Ok(PairOutcome::success(&pair.video, resolved.subtitle_dir.clone()));
            }
            Operation::Merge => {
                if settings.remove_ads {
                    for subtitle in pair.subtitles.iter().filter(|s| FileManager::is_text_subtitle(s)) {
                        let report = self.sanitizer.sanitize(subtitle)?;
                        debug!("Sanitized {:?}: {:?}", subtitle, report);
                    }
                }

                let tracks = Self::subtitle_tracks(pair, selected);
                Self::ensure_parent(&resolved.video_path)?;
                self.mux
                    .merge(&pair.video, &resolved.video_path, settings.remove_existing_subtitles, &tracks)
                    .await
                    .inspect_err(|_| Self::discard_partial_output(&resolved.video_path))?;
                pair.subtitles.clone()
            }
        };

        let output = if settings.remove_old {
            self.cleanup(pair, &resolved, &consumed_subtitles, settings.same_as_source)?
        } else {
            resolved.video_path.clone()
        };

        info!("Success: {}", output.display());
        Ok(PairOutcome::success(&pair.video, output))
    }

    /// Settings language as an ISO 639-2/T code with a display name
    fn selected_language(language: &LanguageSelection) -> LanguageSelection {
        let code = language_utils::normalize_to_part2t(&language.code).unwrap_or_else(|_| language.code.clone());
        let text = if language.text.trim().is_empty() {
            language_utils::get_language_name(&code).unwrap_or_else(|_| code.clone())
        } else {
            language.text.clone()
        };
        LanguageSelection { code, text }
    }

    /// Attach every subtitle; the one in the selected language becomes the default track
    fn subtitle_tracks(pair: &FilePair, selected: &LanguageSelection) -> Vec<SubtitleTrack> {
        let video_stem = pair
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut tracks: Vec<SubtitleTrack> = pair
            .subtitles
            .iter()
            .filter(|path| !Self::is_vobsub_data(path, &pair.subtitles))
            .map(|path| {
                let file_name = path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_default();
                let language = language_utils::language_from_subtitle_name(&video_stem, &file_name)
                    .unwrap_or_else(|| selected.clone());
                SubtitleTrack {
                    path: path.clone(),
                    language,
                    default_track: false,
                }
            })
            .collect();

        let primary = tracks
            .iter()
            .position(|track| language_utils::language_codes_match(&track.language.code, &selected.code))
            .unwrap_or(0);
        if let Some(track) = tracks.get_mut(primary) {
            track.default_track = true;
        }

        tracks
    }

    /// A `.sub` with a sibling `.idx` is VobSub data; mkvmerge reads it through the `.idx`
    fn is_vobsub_data(path: &Path, subtitles: &[PathBuf]) -> bool {
        let has_extension = |p: &Path, ext: &str| {
            p.extension()
                .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        };

        has_extension(path, "sub")
            && subtitles
                .iter()
                .any(|other| has_extension(other, "idx") && other.with_extension("") == path.with_extension(""))
    }

    /// Replace the originals with the new output.
    ///
    /// The original video is deleted before the rename so its name is free.
    fn cleanup(
        &self,
        pair: &FilePair,
        resolved: &ResolvedOutput,
        consumed_subtitles: &[PathBuf],
        same_as_source: bool,
    ) -> Result<PathBuf, BatchError> {
        fs::remove_file(&pair.video).map_err(|e| BatchError::filesystem("delete", &pair.video, e))?;

        let target = resolved.original_video_path();
        let output = if target == resolved.video_path {
            target
        } else if target.exists() {
            warn!(
                "{} already exists, keeping output as {}",
                target.display(),
                resolved.video_path.display()
            );
            resolved.video_path.clone()
        } else {
            fs::rename(&resolved.video_path, &target)
                .map_err(|e| BatchError::filesystem("rename", &resolved.video_path, e))?;
            target
        };

        for subtitle in consumed_subtitles {
            fs::remove_file(subtitle).map_err(|e| BatchError::filesystem("delete", subtitle, e))?;
        }

        if !same_as_source {
            if let Some(directory) = pair.video.parent() {
                let empty = FileManager::is_dir_empty(directory)
                    .map_err(|e| BatchError::filesystem("inspect", directory, e))?;
                if empty {
                    fs::remove_dir(directory)
                        .map_err(|e| BatchError::filesystem("remove directory", directory, e))?;
                    debug!("Removed empty directory {:?}", directory);
                }
            }
        }

        Ok(output)
    }

    /// Delete what a failed tool run left at `path` so the next run can reuse the name
    fn discard_partial_output(path: &Path) {
        if FileManager::file_exists(path) {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed partial output {:?}", path),
                Err(e) => warn!("Could not remove partial output {:?}: {}", path, e),
            }
        }
    }

    fn ensure_parent(path: &Path) -> Result<(), BatchError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| BatchError::filesystem("create directory", parent, e))?;
            }
        }
        Ok(())
    }

    fn log_terminal_error(&self, origin: &str, message: &str) {
        error!("{}: {}", origin, message);

        if let Some(path) = &self.error_log {
            let line = format!("ERROR [{}] {}", origin, message);
            if let Err(e) = FileManager::append_to_log_file(path, &line) {
                warn!("Failed to write error log {}: {}", path.display(), e);
            }
        }
    }
}
