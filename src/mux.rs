/*!
 * MKVToolNix invocations.
 *
 * Builds structured argument lists for mkvmerge/mkvextract and runs them
 * through a `ProcessRunner`. Arguments are never joined into a shell string,
 * so paths with spaces or shell metacharacters pass through untouched.
 *
 * Exit status is authoritative: mkvmerge and mkvextract return 0 on success,
 * 1 when they finished with warnings and 2 on error.
 */

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::ToolConfig;
use crate::errors::MuxError;
use crate::language_utils::LanguageSelection;
use crate::path_resolver::PathResolver;

/// Longest tool output excerpt carried in an error
const MAX_MESSAGE_CHARS: usize = 2000;

/// A program and its discrete arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Arguments as lossy strings, for logging and assertions
    pub fn args_lossy(&self) -> Vec<String> {
        self.args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs
#[async_trait]
pub trait ProcessRunner: Send + Sync + Debug {
    /// Run `invocation` to completion and capture its output
    ///
    /// # Returns
    /// * `Err` only when the program could not be run at all; a non-zero exit
    ///   is reported through `ProcessOutput::code`
    async fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutput, MuxError>;
}

/// Runs programs with tokio, killing them after a timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ProcessOutput, MuxError> {
        debug!("Running {} {:?}", invocation.program, invocation.args_lossy());

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MuxError::ToolNotFound(invocation.program.clone()));
            }
            Ok(Err(e)) => {
                return Err(MuxError::Spawn {
                    tool: invocation.program.clone(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(MuxError::Timeout {
                    tool: invocation.program.clone(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// One subtitle file to attach in a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub language: LanguageSelection,
    pub default_track: bool,
}

/// A subtitle track found inside a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSubtitle {
    pub id: u64,
    pub codec_id: String,
    pub language: Option<String>,
}

impl EmbeddedSubtitle {
    /// File extension mkvextract output should carry for this codec
    pub fn file_extension(&self) -> &'static str {
        match self.codec_id.as_str() {
            "S_TEXT/UTF8" | "S_TEXT/ASCII" => "srt",
            "S_TEXT/ASS" | "S_ASS" => "ass",
            "S_TEXT/SSA" | "S_SSA" => "ssa",
            "S_TEXT/WEBVTT" => "vtt",
            "S_HDMV/PGS" => "sup",
            "S_VOBSUB" => "sub",
            _ => "bin",
        }
    }
}

/// Adapter over mkvmerge and mkvextract
#[derive(Debug, Clone)]
pub struct MkvToolNix {
    runner: Arc<dyn ProcessRunner>,
    mkvmerge: String,
    mkvextract: String,
}

impl MkvToolNix {
    pub fn new(runner: Arc<dyn ProcessRunner>, tools: &ToolConfig) -> Self {
        Self {
            runner,
            mkvmerge: tools.mkvmerge.clone(),
            mkvextract: tools.mkvextract.clone(),
        }
    }

    /// Adapter running real processes with the configured timeout
    pub fn from_config(tools: &ToolConfig) -> Self {
        let runner = SystemRunner::new(Duration::from_secs(tools.timeout_secs));
        Self::new(Arc::new(runner), tools)
    }

    /// `mkvmerge -o OUT [--no-subtitles] IN {--language 0:L --track-name 0:N [--default-track-flag 0:yes] SUB}...`
    pub fn merge_invocation(
        &self,
        video_input: &Path,
        video_output: &Path,
        remove_existing_subtitles: bool,
        tracks: &[SubtitleTrack],
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.mkvmerge)
            .arg("-o")
            .arg(video_output);

        if remove_existing_subtitles {
            invocation = invocation.arg("--no-subtitles");
        }
        invocation = invocation.arg(video_input);

        for track in tracks {
            invocation = invocation
                .arg("--language")
                .arg(format!("0:{}", track.language.code))
                .arg("--track-name")
                .arg(format!("0:{}", track.language.text));
            if track.default_track {
                invocation = invocation.arg("--default-track-flag").arg("0:yes");
            }
            invocation = invocation.arg(&track.path);
        }

        invocation
    }

    /// `mkvmerge -o OUT --no-subtitles IN`
    pub fn remove_invocation(&self, video_input: &Path, video_output: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.mkvmerge)
            .arg("-o")
            .arg(video_output)
            .arg("--no-subtitles")
            .arg(video_input)
    }

    /// `mkvmerge -J IN`
    pub fn identify_invocation(&self, video_input: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.mkvmerge).arg("-J").arg(video_input)
    }

    /// `mkvextract IN tracks ID:OUT...`
    pub fn extract_invocation(&self, video_input: &Path, targets: &[(u64, PathBuf)]) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.mkvextract)
            .arg(video_input)
            .arg("tracks");

        for (id, target) in targets {
            let mut track_arg = OsString::from(format!("{}:", id));
            track_arg.push(target.as_os_str());
            invocation = invocation.arg(track_arg);
        }

        invocation
    }

    /// Merge subtitle files into a new container
    pub async fn merge(
        &self,
        video_input: &Path,
        video_output: &Path,
        remove_existing_subtitles: bool,
        tracks: &[SubtitleTrack],
    ) -> Result<(), MuxError> {
        let invocation = self.merge_invocation(video_input, video_output, remove_existing_subtitles, tracks);
        self.execute(&invocation).await.map(|_| ())
    }

    /// Copy a container without its subtitle tracks
    pub async fn remove_subtitles(&self, video_input: &Path, video_output: &Path) -> Result<(), MuxError> {
        let invocation = self.remove_invocation(video_input, video_output);
        self.execute(&invocation).await.map(|_| ())
    }

    /// List subtitle tracks inside a container
    pub async fn identify_subtitle_tracks(&self, video_input: &Path) -> Result<Vec<EmbeddedSubtitle>, MuxError> {
        let invocation = self.identify_invocation(video_input);
        let output = self.execute(&invocation).await?;
        parse_identification(&output.stdout)
    }

    /// Extract every subtitle track of `video_input` into `target_dir`.
    ///
    /// Returns the files written; a video without subtitle tracks yields none.
    pub async fn extract_subtitles(&self, video_input: &Path, target_dir: &Path) -> Result<Vec<PathBuf>, MuxError> {
        let tracks = self.identify_subtitle_tracks(video_input).await?;
        if tracks.is_empty() {
            warn!("No subtitle tracks found in {:?}", video_input);
            return Ok(Vec::new());
        }

        let stem = video_input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "subtitle".to_string());

        let targets: Vec<(u64, PathBuf)> = tracks
            .iter()
            .map(|track| {
                let language = track.language.as_deref().unwrap_or("und");
                let base = target_dir.join(format!("{}.{}.{}", stem, track.id, language));
                let resolver = PathResolver::new(track.file_extension());
                let unique = resolver.unique_stem(&base);
                let mut file = unique.into_os_string();
                file.push(".");
                file.push(track.file_extension());
                (track.id, PathBuf::from(file))
            })
            .collect();

        let invocation = self.extract_invocation(video_input, &targets);
        self.execute(&invocation).await?;

        Ok(targets.into_iter().map(|(_, path)| path).collect())
    }

    async fn execute(&self, invocation: &ToolInvocation) -> Result<ProcessOutput, MuxError> {
        let output = self.runner.run(invocation).await?;

        match output.code {
            Some(0) => Ok(output),
            Some(1) => {
                warn!("{} finished with warnings: {}", invocation.program, excerpt(&output));
                Ok(output)
            }
            code => Err(MuxError::Failed {
                tool: invocation.program.clone(),
                code,
                message: excerpt(&output),
            }),
        }
    }
}

/// mkvtoolnix prints its diagnostics to stdout, so fall back to it
fn excerpt(output: &ProcessOutput) -> String {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Parse `mkvmerge -J` output into its subtitle tracks
pub fn parse_identification(json: &str) -> Result<Vec<EmbeddedSubtitle>, MuxError> {
    let value: Value = serde_json::from_str(json).map_err(|e| MuxError::Parse(e.to_string()))?;

    let tracks = match value.get("tracks").and_then(|t| t.as_array()) {
        Some(tracks) => tracks,
        None => return Ok(Vec::new()),
    };

    let mut subtitles = Vec::new();
    for track in tracks {
        if track.get("type").and_then(|t| t.as_str()) != Some("subtitles") {
            continue;
        }

        let id = track
            .get("id")
            .and_then(|id| id.as_u64())
            .ok_or_else(|| MuxError::Parse("subtitle track without an id".to_string()))?;
        let properties = track.get("properties");
        let codec_id = properties
            .and_then(|p| p.get("codec_id"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        let language = properties
            .and_then(|p| p.get("language"))
            .and_then(|l| l.as_str())
            .map(str::to_string);

        subtitles.push(EmbeddedSubtitle { id, codec_id, language });
    }

    Ok(subtitles)
}
