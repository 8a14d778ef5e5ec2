//! frameseq - frame sequence detection and safe batch file operations
//!
//! This library groups numbered files (`render.0001.exr` ... `render.0100.exr`)
//! into sequences and plans filesystem operations over them:
//! - Filename grammar parsing with compound extension support
//! - Order-independent grouping with duplicate-padding resolution
//! - Rename, move, copy, re-pad, frame offset, folderize and delete proposals
//! - Conflict detection against the plan itself and the live filesystem
//! - Execution with per-operation success and failure reporting

pub mod cli;
pub mod components;
pub mod config;
pub mod detect;
pub mod error;
pub mod grammar;
pub mod item;
pub mod pattern;
pub mod plan;
pub mod sequence;

pub use cli::Cli;
pub use components::{Components, ComponentsBuilder};
pub use config::{Config, ConfigError};
pub use detect::{Detection, DirectoryScan, SequenceDetector, detect_file_sequences, scan_directory};
pub use error::{Error, Result};
pub use grammar::{FilenameParser, parse_filename};
pub use item::Item;
pub use pattern::{SequencePattern, find_sequence, hashes_to_printf, printf_to_hashes};
pub use plan::{
    Conflict, ConflictKind, ExecutionResult, FailedOperation, FailureKind, Operation,
    OperationKind, OperationPlan,
};
pub use sequence::{FileSequence, Problem, Problems};
