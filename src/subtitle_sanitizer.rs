/*!
 * In-place subtitle clean-up.
 *
 * Two operations, meant to run in this order on the same file:
 * - `normalize_encoding`: re-encodes non-UTF-8 subtitles to UTF-8
 * - `strip_ads`: blanks out lines carrying known advertisement phrases
 *
 * Both rewrite the file through a temp file and a rename. Ad stripping
 * replaces lines instead of removing them so the line count never changes.
 */

use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use std::fmt::Debug;
use std::fs;
use std::path::Path;

use crate::app_config::SanitizerConfig;
use crate::errors::SanitizeError;
use crate::file_utils::FileManager;

/// Advertisement phrases commonly injected into downloaded subtitles (lowercase)
pub const DEFAULT_AD_PHRASES: [&str; 3] = ["mkv player", "opensubtitles", "yify"];

/// Guesses the character encoding of raw subtitle bytes
pub trait EncodingDetector: Send + Sync + Debug {
    /// Best guess for `prefix`, `None` when no guess can be made
    fn detect(&self, prefix: &[u8]) -> Option<&'static Encoding>;
}

/// Statistical detector backed by chardetng
#[derive(Debug, Default, Clone, Copy)]
pub struct StatisticalDetector;

impl EncodingDetector for StatisticalDetector {
    fn detect(&self, prefix: &[u8]) -> Option<&'static Encoding> {
        if prefix.is_empty() {
            return None;
        }
        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(prefix, true);
        Some(detector.guess(None, true))
    }
}

/// What `normalize_encoding` did to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingOutcome {
    /// File was already UTF-8 (or ASCII) and left alone
    AlreadyUtf8,
    /// Detector had no answer; file left alone
    Undetected,
    /// File was decoded with the named encoding and rewritten as UTF-8
    Converted(&'static str),
}

/// Result of a full sanitize pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeReport {
    pub encoding: EncodingOutcome,
    pub ad_lines_removed: usize,
}

/// Normalizes encoding and strips advertisement lines from subtitle files
#[derive(Debug)]
pub struct SubtitleSanitizer {
    detector: Box<dyn EncodingDetector>,
    ad_phrases: Vec<String>,
    prefix_bytes: usize,
}

impl Default for SubtitleSanitizer {
    fn default() -> Self {
        Self::new(Box::new(StatisticalDetector), &SanitizerConfig::default())
    }
}

impl SubtitleSanitizer {
    /// Create a sanitizer using `detector` and the built-in plus configured phrases
    pub fn new(detector: Box<dyn EncodingDetector>, config: &SanitizerConfig) -> Self {
        let mut ad_phrases: Vec<String> = DEFAULT_AD_PHRASES.iter().map(|p| p.to_string()).collect();
        for phrase in &config.extra_ad_phrases {
            let phrase = phrase.trim().to_lowercase();
            if !phrase.is_empty() && !ad_phrases.contains(&phrase) {
                ad_phrases.push(phrase);
            }
        }

        Self {
            detector,
            ad_phrases,
            prefix_bytes: config.detection_prefix_bytes.max(1),
        }
    }

    /// Phrases currently treated as advertisements
    pub fn ad_phrases(&self) -> &[String] {
        &self.ad_phrases
    }

    /// Normalize the encoding, then strip ads
    pub fn sanitize(&self, path: &Path) -> Result<SanitizeReport, SanitizeError> {
        let encoding = self.normalize_encoding(path)?;
        let ad_lines_removed = self.strip_ads(path)?;
        Ok(SanitizeReport {
            encoding,
            ad_lines_removed,
        })
    }

    /// Rewrite `path` as UTF-8 if it is in another encoding.
    ///
    /// A decode failure leaves the file untouched and is returned as
    /// `SanitizeError::EncodingDecode`.
    pub fn normalize_encoding(&self, path: &Path) -> Result<EncodingOutcome, SanitizeError> {
        let bytes = fs::read(path).map_err(|source| SanitizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // A byte-order mark is authoritative
        if let Some((encoding, bom_length)) = Encoding::for_bom(&bytes) {
            if encoding == UTF_8 {
                return Ok(EncodingOutcome::AlreadyUtf8);
            }
            return self.rewrite_as_utf8(path, &bytes[bom_length..], encoding);
        }

        if std::str::from_utf8(&bytes).is_ok() {
            return Ok(EncodingOutcome::AlreadyUtf8);
        }

        let prefix = &bytes[..bytes.len().min(self.prefix_bytes)];
        match self.detector.detect(prefix) {
            Some(encoding) if encoding == UTF_8 => {
                // The detector trusts the prefix but the whole file is not valid UTF-8
                Err(SanitizeError::EncodingDecode {
                    path: path.to_path_buf(),
                    encoding: encoding.name().to_string(),
                })
            }
            Some(encoding) => self.rewrite_as_utf8(path, &bytes, encoding),
            None => {
                warn!("Could not detect the encoding of {:?}, leaving it unchanged", path);
                Ok(EncodingOutcome::Undetected)
            }
        }
    }

    fn rewrite_as_utf8(
        &self,
        path: &Path,
        bytes: &[u8],
        encoding: &'static Encoding,
    ) -> Result<EncodingOutcome, SanitizeError> {
        let text = encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .ok_or_else(|| SanitizeError::EncodingDecode {
                path: path.to_path_buf(),
                encoding: encoding.name().to_string(),
            })?;

        FileManager::write_atomic(path, text.as_bytes()).map_err(|source| SanitizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Converted {:?} from {} to UTF-8", path, encoding.name());
        Ok(EncodingOutcome::Converted(encoding.name()))
    }

    /// Replace every line containing an ad phrase with an empty line.
    ///
    /// Returns the number of lines blanked. Untouched lines keep their exact bytes.
    pub fn strip_ads(&self, path: &Path) -> Result<usize, SanitizeError> {
        let bytes = fs::read(path).map_err(|source| SanitizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let (content, removed) = self.strip_ads_from_bytes(&bytes);
        if removed == 0 {
            return Ok(0);
        }

        FileManager::write_atomic(path, &content).map_err(|source| SanitizeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Removed {} advertisement line(s) from {:?}", removed, path);
        Ok(removed)
    }

    /// Byte-level core of `strip_ads`
    pub fn strip_ads_from_bytes(&self, bytes: &[u8]) -> (Vec<u8>, usize) {
        let mut output = Vec::with_capacity(bytes.len());
        let mut removed = 0;

        for line in bytes.split_inclusive(|b| *b == b'\n') {
            let (body, terminator) = split_terminator(line);
            if self.is_ad_line(body) {
                // An unterminated last line still needs a terminator to stay a line
                let replacement: &[u8] = if terminator.is_empty() { b"\n" } else { terminator };
                output.extend_from_slice(replacement);
                removed += 1;
            } else {
                output.extend_from_slice(line);
            }
        }

        (output, removed)
    }

    fn is_ad_line(&self, body: &[u8]) -> bool {
        if body.is_empty() {
            return false;
        }
        let text = String::from_utf8_lossy(body).to_lowercase();
        self.ad_phrases.iter().any(|phrase| text.contains(phrase.as_str()))
    }
}

fn split_terminator(line: &[u8]) -> (&[u8], &[u8]) {
    if line.ends_with(b"\r\n") {
        line.split_at(line.len() - 2)
    } else if line.ends_with(b"\n") {
        line.split_at(line.len() - 1)
    } else {
        (line, &line[line.len()..])
    }
}
