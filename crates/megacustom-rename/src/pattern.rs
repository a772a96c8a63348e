//! Rename patterns and the name transformation pipeline
//!
//! A [`RenamePattern`] is a plain value describing every transformation to
//! apply to a file name. The pipeline order is fixed: extension split,
//! regex replacement, case conversion, literal character replacements,
//! filesystem sanitization, extension re-attach. Sequential numbering and
//! date insertion run per-file on top, driven by the renamer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

/// Case transformation applied after the regex step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseConversion {
    #[default]
    None,
    Lower,
    Upper,
    Title,
    Sentence,
    Camel,
    Snake,
    Kebab,
}

/// Full rename configuration
///
/// Serialized inside exported rule files; field names are part of that
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenamePattern {
    #[serde(rename = "searchPattern")]
    pub search: String,
    #[serde(rename = "replacePattern")]
    pub replace: String,
    pub case_sensitive: bool,
    /// Extended regex syntax; both modes are served by the same engine
    #[serde(rename = "useExtendedRegex")]
    pub extended: bool,
    pub preserve_extension: bool,
    pub apply_to_extension: bool,
    /// `None` replaces every occurrence
    pub max_replacements: Option<u32>,
    #[serde(rename = "useSequentialNumbering")]
    pub sequential_numbering: bool,
    #[serde(rename = "numberingStart")]
    pub number_start: u32,
    #[serde(rename = "numberingPadding")]
    pub number_padding: usize,
    #[serde(rename = "numberingFormat")]
    pub number_format: Option<String>,
    pub insert_datetime: bool,
    #[serde(rename = "dateTimeFormat")]
    pub datetime_format: String,
    #[serde(rename = "useFileModTime")]
    pub use_file_mtime: bool,
    pub case_conversion: CaseConversion,
    pub character_replacements: BTreeMap<String, String>,
    pub sanitize_for_filesystem: bool,
    pub normalize_unicode: bool,
}

impl Default for RenamePattern {
    fn default() -> Self {
        Self {
            search: String::new(),
            replace: String::new(),
            case_sensitive: true,
            extended: true,
            preserve_extension: true,
            apply_to_extension: false,
            max_replacements: None,
            sequential_numbering: false,
            number_start: 1,
            number_padding: 3,
            number_format: None,
            insert_datetime: false,
            datetime_format: "%Y%m%d_%H%M%S".to_string(),
            use_file_mtime: true,
            case_conversion: CaseConversion::None,
            character_replacements: BTreeMap::new(),
            sanitize_for_filesystem: false,
            normalize_unicode: false,
        }
    }
}

impl RenamePattern {
    /// Simple search/replace pattern with the default options
    pub fn substitution(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
            ..Default::default()
        }
    }

    /// Run the core pipeline on one name
    pub fn apply(&self, input: &str) -> String {
        let (mut result, extension) = if self.preserve_extension && !self.apply_to_extension {
            let (stem, ext) = split_extension(input);
            (stem.to_string(), ext.to_string())
        } else {
            (input.to_string(), String::new())
        };

        if !self.search.is_empty() {
            result = self.apply_regex(&result);
        }
        result = apply_case_conversion(&result, self.case_conversion);
        for (search, replace) in &self.character_replacements {
            result = result.replace(search.as_str(), replace);
        }
        if self.normalize_unicode {
            result = result.nfc().collect();
        }
        if self.sanitize_for_filesystem {
            result = sanitize_filename(&result, '_');
        }

        result.push_str(&extension);
        result
    }

    fn apply_regex(&self, input: &str) -> String {
        let regex = RegexBuilder::new(&self.search)
            .case_insensitive(!self.case_sensitive)
            .build();
        match regex {
            Ok(regex) => {
                let limit = self.max_replacements.unwrap_or(0) as usize;
                regex.replacen(input, limit, self.replace.as_str()).into_owned()
            }
            Err(e) => {
                warn!(pattern = %self.search, error = %e, "Rename regex failed to compile");
                input.to_string()
            }
        }
    }

    /// Substitute `{num}`-style placeholders, or append `_NNN` when the name
    /// carries no placeholder
    pub fn apply_numbering(&self, input: &str, index: u32) -> String {
        let number = format!("{:0width$}", index, width = self.number_padding);
        let placeholder = regex::Regex::new(r"\{num(?::0?\d+d)?\}").unwrap();
        if placeholder.is_match(input) {
            placeholder.replace_all(input, number.as_str()).into_owned()
        } else {
            let (stem, ext) = split_extension(input);
            format!("{stem}_{number}{ext}")
        }
    }

    /// Prefix the formatted timestamp
    pub fn apply_datetime(&self, input: &str, mtime: Option<DateTime<Utc>>) -> String {
        let ts = if self.use_file_mtime {
            mtime.unwrap_or_else(Utc::now)
        } else {
            Utc::now()
        };
        let prefix = ts.format(&self.datetime_format).to_string();
        let (stem, ext) = split_extension(input);
        format!("{prefix}{stem}{ext}")
    }
}

/// Validate a regex pattern for UI-side linting
pub fn validate_regex(pattern: &str) -> Result<(), String> {
    regex::Regex::new(pattern).map(|_| ()).map_err(|e| e.to_string())
}

/// Apply a pattern to sample text, for interactive experimentation
pub fn test_pattern(pattern: &str, sample: &str, replacement: &str) -> String {
    match regex::Regex::new(pattern) {
        Ok(regex) => regex.replace_all(sample, replacement).into_owned(),
        Err(e) => format!("Error: {e}"),
    }
}

/// Split into `(stem, extension-with-dot)`; hidden files and names without
/// a dot have no extension
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Generate a name not present in `existing` by appending `_N`
pub fn generate_unique_name(base: &str, existing: &[String]) -> String {
    if !existing.iter().any(|e| e == base) {
        return base.to_string();
    }
    let (stem, ext) = split_extension(base);
    for n in 1..1000 {
        let candidate = format!("{stem}_{n}{ext}");
        if !existing.iter().any(|e| *e == candidate) {
            return candidate;
        }
    }
    format!("{stem}_{}{ext}", Utc::now().timestamp_millis())
}

/// Strip characters that are illegal in file names
///
/// Replaces `<>:"/\|?*` and control characters, trims leading/trailing dots
/// and spaces, and maps an empty result to `renamed_file`.
pub fn sanitize_filename(name: &str, replacement: char) -> String {
    const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let mut result: String = name
        .chars()
        .map(|c| {
            if ILLEGAL.contains(&c) || c.is_control() {
                replacement
            } else {
                c
            }
        })
        .collect();

    result = result
        .trim_end_matches(['.', ' '])
        .trim_start_matches(['.', ' '])
        .to_string();

    if result.is_empty() {
        result = "renamed_file".to_string();
    }
    result
}

fn apply_case_conversion(input: &str, conversion: CaseConversion) -> String {
    match conversion {
        CaseConversion::None => input.to_string(),
        CaseConversion::Lower => input.to_lowercase(),
        CaseConversion::Upper => input.to_uppercase(),
        CaseConversion::Title => {
            let mut out = String::with_capacity(input.len());
            let mut new_word = true;
            for c in input.chars() {
                if c.is_alphabetic() {
                    if new_word {
                        out.extend(c.to_uppercase());
                        new_word = false;
                    } else {
                        out.extend(c.to_lowercase());
                    }
                } else {
                    if c.is_whitespace() || c == '_' || c == '-' {
                        new_word = true;
                    }
                    out.push(c);
                }
            }
            out
        }
        CaseConversion::Sentence => {
            let mut out = String::with_capacity(input.len());
            let mut new_sentence = true;
            for c in input.chars() {
                if c.is_alphabetic() {
                    if new_sentence {
                        out.extend(c.to_uppercase());
                        new_sentence = false;
                    } else {
                        out.extend(c.to_lowercase());
                    }
                } else {
                    if matches!(c, '.' | '!' | '?') {
                        new_sentence = true;
                    }
                    out.push(c);
                }
            }
            out
        }
        CaseConversion::Camel => {
            let mut out = String::with_capacity(input.len());
            let mut capitalize_next = false;
            for c in input.chars() {
                if c.is_alphanumeric() {
                    if capitalize_next {
                        out.extend(c.to_uppercase());
                        capitalize_next = false;
                    } else {
                        out.extend(c.to_lowercase());
                    }
                } else {
                    capitalize_next = true;
                }
            }
            out
        }
        CaseConversion::Snake => {
            let mut out = String::with_capacity(input.len());
            for c in input.chars() {
                if c.is_alphanumeric() {
                    out.extend(c.to_lowercase());
                } else if c.is_whitespace() || c == '-' {
                    out.push('_');
                }
            }
            out
        }
        CaseConversion::Kebab => {
            let mut out = String::with_capacity(input.len());
            for c in input.chars() {
                if c.is_alphanumeric() {
                    out.extend(c.to_lowercase());
                } else if c.is_whitespace() || c == '_' {
                    out.push('-');
                }
            }
            out
        }
    }
}
