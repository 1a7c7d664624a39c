/*!
 * # mkvbatch - batch subtitle muxing with MKVToolNix
 *
 * A Rust library that pairs videos with their subtitle files across a
 * directory tree and drives mkvmerge/mkvextract over every pair.
 *
 * ## Features
 *
 * - Merge one or more subtitle files into a Matroska container
 * - Remove every subtitle track from videos
 * - Extract embedded subtitle tracks to files
 * - Re-encode non-UTF-8 subtitles and strip advertisement lines
 * - Collision-free output naming, optional mirroring of the input layout
 * - Optional replacement of the originals once a pair succeeded
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration, per-batch settings and requests
 * - `batch_matcher`: Video/subtitle discovery and pairing
 * - `path_resolver`: Output path computation
 * - `subtitle_sanitizer`: Encoding normalization and ad stripping
 * - `mux`: mkvmerge/mkvextract invocations behind a process runner
 * - `progress`: Batch progress notifications
 * - `app_controller`: Batch orchestration
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod batch_matcher;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod mux;
pub mod path_resolver;
pub mod progress;
pub mod subtitle_sanitizer;

// Re-export main types for easier usage
pub use app_config::{BatchRequest, Config, Settings};
pub use app_controller::{BatchResponse, BatchStatus, Controller, Operation};
pub use batch_matcher::{BatchMatcher, BatchResult, FilePair};
pub use errors::{AppError, BatchError, MuxError, SanitizeError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t, LanguageSelection};
pub use mux::{MkvToolNix, ProcessRunner};
pub use path_resolver::PathResolver;
pub use progress::ProgressReporter;
pub use subtitle_sanitizer::SubtitleSanitizer;
