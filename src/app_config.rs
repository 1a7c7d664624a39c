use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::language_utils::{self, LanguageSelection};

/// Application configuration module
/// This module handles the configuration file, the per-batch settings and
/// the request type handed to the controller.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Default settings for every batch (CLI flags override them)
    #[serde(default)]
    pub settings: Settings,

    /// External tool configuration
    #[serde(default)]
    pub tools: ToolConfig,

    /// Subtitle sanitizer configuration
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Where terminal errors are appended; defaults to the platform data directory
    #[serde(default)]
    pub error_log_path: Option<PathBuf>,
}

/// User-selected options for one batch
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Language assigned to merged subtitle tracks
    #[serde(default)]
    pub language: LanguageSelection,

    /// Blank out advertisement lines before merging
    #[serde(default, alias = "isRemoveAds")]
    pub remove_ads: bool,

    /// Drop subtitle tracks already inside the video when merging
    #[serde(default, alias = "isRemoveExistingSubtitles")]
    pub remove_existing_subtitles: bool,

    /// Delete originals and take over their name after a successful run
    #[serde(default, alias = "isRemoveOld")]
    pub remove_old: bool,

    /// Produce copies of the videos without any subtitle track
    #[serde(default, alias = "isRemoveSubtitles")]
    pub remove_subtitles: bool,

    /// Pull subtitle tracks out of the videos
    #[serde(default, alias = "isExtractSubtitles")]
    pub extract_subtitles: bool,

    /// Write outputs next to their inputs instead of the output directory
    #[serde(default, alias = "isSameAsSource")]
    pub same_as_source: bool,

    /// Mirror the input directory structure under the output directory
    #[serde(default, alias = "isRememberOutputDir")]
    pub remember_output_dir: bool,
}

impl Settings {
    /// Remove and extract operate on videos alone
    pub fn is_video_only(&self) -> bool {
        self.remove_subtitles || self.extract_subtitles
    }
}

/// One incoming batch call
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchRequest {
    /// Directory scanned for videos and subtitles
    pub input: PathBuf,

    /// Root of the output tree (ignored in same-as-source mode)
    #[serde(default)]
    pub output: PathBuf,

    /// Options for this batch
    #[serde(default)]
    pub settings: Settings,
}

impl BatchRequest {
    /// Create a request
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            settings,
        }
    }

    /// Check the request before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(anyhow!("Input directory is required"));
        }
        if !self.settings.same_as_source && self.output.as_os_str().is_empty() {
            return Err(anyhow!("Output directory is required unless output is same as source"));
        }
        language_utils::normalize_to_part2t(&self.settings.language.code)
            .with_context(|| format!("Unsupported subtitle language: {}", self.settings.language.code))?;
        Ok(())
    }
}

/// External tool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolConfig {
    /// mkvmerge program (name on PATH or absolute path)
    #[serde(default = "default_mkvmerge")]
    pub mkvmerge: String,

    /// mkvextract program (name on PATH or absolute path)
    #[serde(default = "default_mkvextract")]
    pub mkvextract: String,

    /// Timeout for a single tool invocation in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            mkvmerge: default_mkvmerge(),
            mkvextract: default_mkvextract(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Subtitle sanitizer configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SanitizerConfig {
    /// Phrases treated as advertisements on top of the built-in ones
    #[serde(default)]
    pub extra_ad_phrases: Vec<String>,

    /// Number of leading bytes fed to the encoding detector
    #[serde(default = "default_detection_prefix_bytes")]
    pub detection_prefix_bytes: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            extra_ad_phrases: Vec::new(),
            detection_prefix_bytes: default_detection_prefix_bytes(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_mkvmerge() -> String {
    "mkvmerge".to_string()
}

fn default_mkvextract() -> String {
    "mkvextract".to_string()
}

fn default_timeout_secs() -> u64 {
    3600 // Remuxing a large file can take a while
}

fn default_detection_prefix_bytes() -> usize {
    64 * 1024
}

impl Config {
    /// Load a configuration file, writing the defaults first if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        language_utils::get_language_name(&self.settings.language.code)
            .with_context(|| format!("Invalid default language: {}", self.settings.language.code))?;

        if self.tools.timeout_secs == 0 {
            return Err(anyhow!("tools.timeout_secs must be greater than zero"));
        }
        if self.tools.mkvmerge.trim().is_empty() || self.tools.mkvextract.trim().is_empty() {
            return Err(anyhow!("Tool programs must not be empty"));
        }
        if self.sanitizer.detection_prefix_bytes == 0 {
            return Err(anyhow!("sanitizer.detection_prefix_bytes must be greater than zero"));
        }

        Ok(())
    }

    /// Error log location, configured or under the platform data directory
    pub fn resolved_error_log_path(&self) -> PathBuf {
        if let Some(path) = &self.error_log_path {
            return path.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("mkvbatch")
            .join("error.log")
    }
}
