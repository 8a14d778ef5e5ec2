//! Error types for frame sequence handling

use crate::config::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for frameseq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for frameseq
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid filename '{name}': {reason}")]
    InvalidFilename { name: String, reason: String },

    #[error("Grammar violation: {0}")]
    Grammar(String),

    #[error("Anomalous item data: {field} is '{expected}' on the first item but '{found}' on {filename}")]
    AnomalousItem {
        field: &'static str,
        expected: String,
        found: String,
        filename: String,
    },

    #[error("Cannot {operation} an empty sequence")]
    EmptySequence { operation: &'static str },

    #[error("Offset would produce negative frame number {frame}")]
    NegativeFrame { frame: i128 },

    #[error("Frame number {frame} is out of range")]
    FrameOverflow { frame: i128 },

    #[error("Item {filename} has no directory; filesystem operations need a linked item")]
    UnlinkedItem { filename: String },

    #[error("Destination already exists: {}", display_paths(.paths))]
    AlreadyExists { paths: Vec<PathBuf> },

    #[error("Operations form a cycle and cannot be ordered: {}", display_paths(.paths))]
    CyclicPlan { paths: Vec<PathBuf> },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p: &PathBuf| Path::display(p).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
