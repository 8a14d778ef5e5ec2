//! Sequence string patterns
//!
//! `render.####.exr` is the display form of a sequence: the `#` run length
//! is the padding. Pipeline tools often write the same thing printf-style as
//! `render.%04d.exr`; both forms are accepted wherever a pattern is parsed.

use crate::grammar::FilenameParser;
use crate::sequence::FileSequence;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

static PRINTF_TOKEN: OnceLock<Regex> = OnceLock::new();
static HASH_RUN: OnceLock<Regex> = OnceLock::new();

fn printf_token() -> &'static Regex {
    PRINTF_TOKEN.get_or_init(|| Regex::new(r"%(?:0?([0-9]+))?d").unwrap())
}

fn hash_run() -> &'static Regex {
    HASH_RUN.get_or_init(|| Regex::new(r"#+").unwrap())
}

/// Replace `%0Nd` / `%d` tokens with `#` runs of the same width
pub fn printf_to_hashes(pattern: &str) -> String {
    printf_token()
        .replace_all(pattern, |caps: &regex::Captures| {
            let width = caps
                .get(1)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            "#".repeat(width)
        })
        .into_owned()
}

/// Replace `#` runs with `%0Nd` tokens
pub fn hashes_to_printf(pattern: &str) -> String {
    hash_run()
        .replace_all(pattern, |caps: &regex::Captures| format!("%0{}d", caps[0].len()))
        .into_owned()
}

/// A parsed sequence pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePattern {
    pub prefix: String,
    pub delimiter: String,
    pub padding: usize,
    pub suffix: String,
    pub extension: String,
}

impl SequencePattern {
    /// Parse a `#`-run or printf pattern with the default parser
    pub fn parse(pattern: &str) -> Option<Self> {
        Self::parse_with(&FilenameParser::default(), pattern)
    }

    /// Parse a pattern; `None` when it has no frame placeholder or does not
    /// fit the filename grammar
    pub fn parse_with(parser: &FilenameParser, pattern: &str) -> Option<Self> {
        let hashed = printf_to_hashes(pattern);
        let last_run = hash_run().find_iter(&hashed).last()?;

        // Stand zeros in for the placeholder and let the grammar split it
        let mut candidate = String::with_capacity(hashed.len());
        candidate.push_str(&hashed[..last_run.start()]);
        candidate.push_str(&"0".repeat(last_run.len()));
        candidate.push_str(&hashed[last_run.end()..]);

        let item = parser.parse(&candidate).ok()??;
        if item.padding() != last_run.len() {
            return None;
        }

        Some(Self {
            prefix: item.prefix().to_string(),
            delimiter: item.delimiter().to_string(),
            padding: item.padding(),
            suffix: item.suffix().to_string(),
            extension: item.extension().to_string(),
        })
    }

    /// Whether `sequence` has this name and nominal padding
    pub fn matches(&self, sequence: &FileSequence) -> bool {
        sequence.prefix() == Some(self.prefix.as_str())
            && sequence.delimiter() == Some(self.delimiter.as_str())
            && sequence.suffix() == Some(self.suffix.as_str())
            && sequence.extension() == Some(self.extension.as_str())
            && sequence.padding() == Some(self.padding)
    }

    pub fn to_printf(&self) -> String {
        hashes_to_printf(&self.to_string())
    }
}

impl fmt::Display for SequencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            self.prefix,
            self.delimiter,
            "#".repeat(self.padding),
            self.suffix
        )?;
        if !self.extension.is_empty() {
            write!(f, ".{}", self.extension)?;
        }
        Ok(())
    }
}

impl FileSequence {
    /// Whether this sequence is described by `pattern` (`#` run or `%0Nd`)
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        SequencePattern::parse(pattern).is_some_and(|p| p.matches(self))
    }
}

/// First sequence described by `pattern`
pub fn find_sequence<'a>(sequences: &'a [FileSequence], pattern: &str) -> Option<&'a FileSequence> {
    let pattern = SequencePattern::parse(pattern)?;
    sequences.iter().find(|s| pattern.matches(s))
}
