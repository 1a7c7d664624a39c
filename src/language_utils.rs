use anyhow::{Result, anyhow};
use isolang::Language;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Language utilities for ISO language code handling
///
/// This module validates and normalizes ISO 639-1 (2-letter) and
/// ISO 639-2 (3-letter) language codes, builds the list of languages offered
/// for subtitle tracks, and recognizes language suffixes in subtitle file names.
/// Language code type
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-2/T (3-letter) code
    Part2T,
    /// ISO 639-2/B (3-letter) code
    Part2B,
}

/// ISO 639-2/B codes that differ from their ISO 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: [(&str, &str); 18] = [
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// ISO 639-1 codes offered as subtitle track languages
const SUBTITLE_LANGUAGES: [&str; 58] = [
    "ar", "bg", "bn", "bs", "ca", "cs", "cy", "da", "de", "el",
    "en", "es", "et", "eu", "fa", "fi", "fr", "ga", "gl", "he",
    "hi", "hr", "hu", "hy", "id", "is", "it", "ja", "ka", "kk",
    "ko", "lt", "lv", "mk", "ml", "mn", "ms", "nb", "nl", "no",
    "pl", "pt", "ro", "ru", "sk", "sl", "sq", "sr", "sv", "sw",
    "ta", "te", "th", "tl", "tr", "uk", "vi", "zh",
];

/// Release tags that look like ISO 639 codes but describe a variant
const VARIANT_TAGS: [&str; 5] = ["sdh", "cc", "dub", "sub", "ext"];

/// A language offered for subtitle tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSelection {
    /// ISO 639-2/T code passed to the muxer
    pub code: String,
    /// Display name, also used as the track name
    pub text: String,
}

impl LanguageSelection {
    /// Build a selection from any valid ISO 639 code
    pub fn from_code(code: &str) -> Result<Self> {
        let code = normalize_to_part2t(code)?;
        let text = get_language_name(&code)?;
        Ok(Self { code, text })
    }
}

impl Default for LanguageSelection {
    fn default() -> Self {
        Self {
            code: "eng".to_string(),
            text: "English".to_string(),
        }
    }
}

static SUPPORTED_LANGUAGES: Lazy<Vec<LanguageSelection>> = Lazy::new(|| {
    let mut languages: Vec<LanguageSelection> = SUBTITLE_LANGUAGES
        .iter()
        .filter_map(|code| Language::from_639_1(code))
        .map(|lang| LanguageSelection {
            code: lang.to_639_3().to_string(),
            text: lang.to_name().to_string(),
        })
        .collect();
    languages.sort_by(|a, b| a.text.cmp(&b.text));
    languages.dedup_by(|a, b| a.code == b.code);
    languages
});

/// Languages that can be assigned to a merged subtitle track, sorted by name
pub fn supported_languages() -> &'static [LanguageSelection] {
    &SUPPORTED_LANGUAGES
}

fn bibliographic_to_terminology(code: &str) -> Option<&'static str> {
    BIBLIOGRAPHIC_CODES
        .iter()
        .find(|(b, _)| *b == code)
        .map(|(_, t)| *t)
}

/// Validate if a language code is a valid ISO 639-1 or ISO 639-2 code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 if Language::from_639_1(&normalized_code).is_some() => Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(&normalized_code).is_some() => Ok(LanguageCodeType::Part2T),
        3 if bibliographic_to_terminology(&normalized_code).is_some() => Ok(LanguageCodeType::Part2B),
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let normalized_code = code.trim().to_lowercase();

    match validate_language_code(&normalized_code) {
        Ok(LanguageCodeType::Part1) => Language::from_639_1(&normalized_code)
            .map(|lang| lang.to_639_3().to_string())
            .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code)),
        Ok(LanguageCodeType::Part2T) => Ok(normalized_code),
        Ok(LanguageCodeType::Part2B) => bibliographic_to_terminology(&normalized_code)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code)),
        Err(_) => Err(anyhow!("Cannot normalize invalid language code: {}", code)),
    }
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (normalize_to_part2t(code1), normalize_to_part2t(code2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = normalize_to_part2t(code)?;
    let lang = Language::from_639_3(&normalized)
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", normalized))?;

    Ok(lang.to_name().to_string())
}

/// Find a language tag in a subtitle file name.
///
/// Looks at the dot-separated parts between the video stem and the extension,
/// from the last one backwards, so `movie.fr.srt` and `movie.fre.forced.srt`
/// both resolve to French. Only 2- and 3-letter parts are considered.
pub fn language_from_subtitle_name(video_stem: &str, subtitle_file_name: &str) -> Option<LanguageSelection> {
    let rest = subtitle_file_name.strip_prefix(video_stem)?;
    let rest = rest.strip_prefix('.')?;

    // Drop the extension
    let tags = match rest.rfind('.') {
        Some(pos) => &rest[..pos],
        None => return None,
    };

    tags.rsplit('.')
        .filter(|tag| tag.len() == 2 || tag.len() == 3)
        .filter(|tag| !VARIANT_TAGS.contains(&tag.to_lowercase().as_str()))
        .find_map(|tag| LanguageSelection::from_code(tag).ok())
}
