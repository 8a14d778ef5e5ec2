//! CLI argument parsing with clap

use crate::components::Components;
use crate::config::Config;
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// frameseq - find and manipulate numbered frame sequences
///
/// Groups numbered files such as render.0001.exr into sequences and
/// renames, moves, copies, re-pads, offsets or deletes them as a unit.
/// Every operation is planned and checked for conflicts before any file
/// is touched.
#[derive(Parser, Debug)]
#[command(name = "frameseq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML format)
    ///
    /// CLI flags override config file settings.
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Show the plan and its conflicts without touching any file
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Overwrite conflicting destinations
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Create missing target directories
    #[arg(long, global = true)]
    pub create_dirs: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output log format as JSON
    #[arg(long, global = true)]
    pub json_log: bool,

    /// Also write a timestamped log file into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the sequences, rogue files and movies in a directory
    List {
        directory: PathBuf,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename a sequence in place
    Rename {
        #[command(flatten)]
        target: SequenceTarget,

        #[command(flatten)]
        components: ComponentArgs,
    },

    /// Shift every frame number by a delta
    Offset {
        #[command(flatten)]
        target: SequenceTarget,

        /// Frames to add; may be negative
        #[arg(allow_negative_numbers = true)]
        delta: i64,

        /// Padding of the shifted frames (defaults to the sequence padding)
        #[arg(long)]
        padding: Option<usize>,
    },

    /// Re-pad every frame number
    Pad {
        #[command(flatten)]
        target: SequenceTarget,

        padding: usize,
    },

    /// Copy a sequence, optionally renamed and/or into another directory
    Copy {
        #[command(flatten)]
        target: SequenceTarget,

        /// Target directory
        #[arg(long)]
        to: Option<PathBuf>,

        #[command(flatten)]
        components: ComponentArgs,
    },

    /// Move a sequence into another directory
    Move {
        #[command(flatten)]
        target: SequenceTarget,

        destination: PathBuf,
    },

    /// Move a sequence into a new subdirectory of its directory
    Folderize {
        #[command(flatten)]
        target: SequenceTarget,

        name: String,
    },

    /// Delete every file of a sequence
    Delete {
        #[command(flatten)]
        target: SequenceTarget,
    },
}

/// Which sequence a command works on
#[derive(Args, Debug, Clone)]
pub struct SequenceTarget {
    /// Directory holding the sequence
    pub directory: PathBuf,

    /// Sequence pattern, e.g. render.####.exr or render.%04d.exr
    pub pattern: String,
}

/// Filename component overrides
#[derive(Args, Debug, Clone, Default)]
pub struct ComponentArgs {
    /// New prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// New delimiter (one non-alphanumeric character, or empty)
    #[arg(long)]
    pub delimiter: Option<String>,

    /// New padding
    #[arg(long)]
    pub padding: Option<usize>,

    /// New suffix (no digits)
    #[arg(long)]
    pub suffix: Option<String>,

    /// New extension
    #[arg(long)]
    pub extension: Option<String>,
}

impl ComponentArgs {
    /// Validated overrides, or `None` when no flag was given
    pub fn to_components(&self) -> Result<Option<Components>> {
        let mut builder = Components::builder();
        if let Some(ref prefix) = self.prefix {
            builder = builder.prefix(prefix.clone());
        }
        if let Some(ref delimiter) = self.delimiter {
            builder = builder.delimiter(delimiter.clone());
        }
        if let Some(padding) = self.padding {
            builder = builder.padding(padding);
        }
        if let Some(ref suffix) = self.suffix {
            builder = builder.suffix(suffix.clone());
        }
        if let Some(ref extension) = self.extension {
            builder = builder.extension(extension.clone());
        }
        let components = builder.build()?;
        Ok((!components.is_empty()).then_some(components))
    }
}

impl Cli {
    /// Merge CLI flags with config from file
    /// CLI flags take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if self.force {
            config.force = true;
        }
        if self.create_dirs {
            config.create_directories = true;
        }
        config
    }

    /// Convert CLI flags to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
