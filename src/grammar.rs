//! Filename decomposition grammar
//!
//! A sequence member's filename is split into five parts:
//!
//! ```text
//! prefix  delimiter  frame  suffix  . extension
//! render  .          0001   _beauty . exr
//! ```
//!
//! The frame number is the last run of ASCII digits outside the extension.
//! The delimiter is at most one non-alphanumeric character directly before
//! the frame. The suffix never contains digits, since a digit there would
//! itself have been the last digit run.

use crate::error::{Error, Result};
use crate::item::Item;
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

/// Compound extensions recognised when no configuration is supplied
pub const DEFAULT_COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "tar.bz2", "log.gz"];

/// Stem pattern: lazily-matched head, last digit run, digit-free tail
static FRAME_PATTERN: OnceLock<Regex> = OnceLock::new();

static DEFAULT_PARSER: OnceLock<FilenameParser> = OnceLock::new();

fn frame_pattern() -> &'static Regex {
    FRAME_PATTERN.get_or_init(|| {
        Regex::new(r"^(?s)(?P<head>.*?)(?P<frame>[0-9]+)(?P<tail>[^0-9]*)$").unwrap()
    })
}

/// Parses bare filenames into [`Item`]s
#[derive(Debug, Clone)]
pub struct FilenameParser {
    /// Lowercased, longest first so `tar.bz2` wins over a shorter overlap
    compound_extensions: Vec<String>,
}

impl Default for FilenameParser {
    fn default() -> Self {
        Self::with_compound_extensions(DEFAULT_COMPOUND_EXTENSIONS.iter().map(|s| s.to_string()))
    }
}

impl FilenameParser {
    /// Create a parser with the default compound extension set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with a custom compound extension set
    pub fn with_compound_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut compound_extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        compound_extensions.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        compound_extensions.dedup();
        Self { compound_extensions }
    }

    /// The compound extensions this parser consumes whole
    pub fn compound_extensions(&self) -> &[String] {
        &self.compound_extensions
    }

    /// Parse a bare filename.
    ///
    /// Returns `Ok(None)` when the name holds no frame number or cannot be
    /// represented faithfully by the grammar. Names containing a directory
    /// separator are rejected with [`Error::InvalidFilename`].
    pub fn parse(&self, filename: &str) -> Result<Option<Item>> {
        if filename.is_empty() {
            return Err(Error::InvalidFilename {
                name: filename.to_string(),
                reason: "filename is empty".into(),
            });
        }
        if filename.contains(['/', '\\']) {
            return Err(Error::InvalidFilename {
                name: filename.to_string(),
                reason: "expected a bare filename, found a path".into(),
            });
        }

        let (stem, extension) = self.split_extension(filename);

        let Some(caps) = frame_pattern().captures(stem) else {
            trace!(filename, "No frame number found");
            return Ok(None);
        };

        let head = caps.name("head").map_or("", |m| m.as_str());
        let frame = caps.name("frame").map_or("", |m| m.as_str());
        let tail = caps.name("tail").map_or("", |m| m.as_str());

        // "shot.0001..exr" cannot be rebuilt from its parts
        if tail.ends_with('.') {
            trace!(filename, "Suffix ends with a dot, not representable");
            return Ok(None);
        }

        let (prefix, delimiter) = split_delimiter(head);

        if frame.parse::<u64>().is_err() {
            trace!(filename, frame, "Frame number out of range");
            return Ok(None);
        }

        let item = Item::new(prefix, delimiter, frame, tail, extension)?;
        trace!(filename, prefix, delimiter, frame, suffix = tail, extension, "Parsed filename");
        Ok(Some(item))
    }

    /// Split a filename into `(stem, extension)`.
    ///
    /// Compound extensions are matched case-insensitively. A trailing segment
    /// made only of digits is a frame number, not an extension, and a single
    /// leading dot marks a hidden file rather than an extension.
    pub fn split_extension<'a>(&self, filename: &'a str) -> (&'a str, &'a str) {
        let lower = filename.to_ascii_lowercase();
        for compound in &self.compound_extensions {
            let cut = filename.len().saturating_sub(compound.len() + 1);
            if filename.len() > compound.len() + 1
                && lower.ends_with(compound.as_str())
                && lower.as_bytes()[cut] == b'.'
            {
                return (&filename[..cut], &filename[cut + 1..]);
            }
        }

        match filename.rfind('.') {
            Some(0) | None => (filename, ""),
            Some(dot) => {
                let candidate = &filename[dot + 1..];
                if candidate.is_empty() || candidate.bytes().all(|b| b.is_ascii_digit()) {
                    (filename, "")
                } else {
                    (&filename[..dot], candidate)
                }
            }
        }
    }
}

/// Parse a bare filename with the default parser
pub fn parse_filename(filename: &str) -> Result<Option<Item>> {
    DEFAULT_PARSER
        .get_or_init(FilenameParser::default)
        .parse(filename)
}

/// Number of decimal digits needed to print `n`
pub fn digit_count(n: u64) -> usize {
    let mut n = n;
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Split the text before a frame number into `(prefix, delimiter)`
fn split_delimiter(head: &str) -> (&str, &str) {
    match head.char_indices().next_back() {
        Some((idx, c)) if !c.is_alphanumeric() => (&head[..idx], &head[idx..]),
        _ => (head, ""),
    }
}

fn check_no_separator(field: &str, value: &str) -> Result<()> {
    if value.contains(['/', '\\']) {
        return Err(Error::Grammar(format!(
            "{} '{}' contains a path separator",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    check_no_separator("prefix", prefix)
}

pub(crate) fn validate_delimiter(delimiter: &str) -> Result<()> {
    check_no_separator("delimiter", delimiter)?;
    let mut chars = delimiter.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(()),
        (Some(c), None) if !c.is_alphanumeric() => Ok(()),
        (Some(_), None) => Err(Error::Grammar(format!(
            "delimiter '{}' must not be alphanumeric",
            delimiter
        ))),
        _ => Err(Error::Grammar(format!(
            "delimiter '{}' must be at most one character",
            delimiter
        ))),
    }
}

pub(crate) fn validate_suffix(suffix: &str) -> Result<()> {
    check_no_separator("suffix", suffix)?;
    if suffix.bytes().any(|b| b.is_ascii_digit()) {
        return Err(Error::Grammar(format!(
            "suffix '{}' must not contain digits",
            suffix
        )));
    }
    if suffix.ends_with('.') {
        return Err(Error::Grammar(format!(
            "suffix '{}' must not end with a dot",
            suffix
        )));
    }
    Ok(())
}

pub(crate) fn validate_extension(extension: &str) -> Result<()> {
    check_no_separator("extension", extension)?;
    if extension.starts_with('.') || extension.ends_with('.') {
        return Err(Error::Grammar(format!(
            "extension '{}' must not start or end with a dot",
            extension
        )));
    }
    if !extension.is_empty() && extension.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Grammar(format!(
            "extension '{}' must contain a non-digit character",
            extension
        )));
    }
    Ok(())
}

pub(crate) fn validate_frame_string(frame: &str) -> Result<u64> {
    if frame.is_empty() || !frame.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Grammar(format!(
            "frame '{}' must be a non-empty run of digits",
            frame
        )));
    }
    frame
        .parse::<u64>()
        .map_err(|_| Error::Grammar(format!("frame '{}' is out of range", frame)))
}

/// Checks that only make sense once all parts are known
pub(crate) fn validate_boundaries(
    prefix: &str,
    delimiter: &str,
    suffix: &str,
    extension: &str,
) -> Result<()> {
    if delimiter.is_empty() {
        if let Some(last) = prefix.chars().next_back() {
            if last.is_ascii_digit() || !last.is_alphanumeric() {
                return Err(Error::Grammar(format!(
                    "prefix '{}' without a delimiter must end in a letter",
                    prefix
                )));
            }
        }
    }
    if extension.is_empty() {
        // Without an extension, the text after the last non-leading dot must
        // not read as one, or the frame would be lost when parsed back
        let name = format!("{}{}0{}", prefix, delimiter, suffix);
        if let Some(dot) = name.rfind('.').filter(|&dot| dot > 0) {
            let tail = &name[dot + 1..];
            if !tail.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Grammar(format!(
                    "'{}' would parse as an extension but the item has none",
                    tail
                )));
            }
        }
    }
    Ok(())
}
