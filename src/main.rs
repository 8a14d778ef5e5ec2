//! frameseq - frame sequence management tool
//!
//! Lists the sequences in a directory and plans, previews and executes
//! rename, move, copy, offset, re-pad, folderize and delete operations.

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use frameseq::cli::{Command, SequenceTarget};
use frameseq::{
    Cli, Config, ConflictKind, DirectoryScan, ExecutionResult, FileSequence, OperationPlan,
    Problem, find_sequence, scan_directory,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{Level, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "frameseq starting");

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Run the selected command; `Ok(false)` means some operation failed
fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;

    if cli.verbose {
        info!(?config, "Configuration loaded");
    }

    if let Command::List { directory, json } = &cli.command {
        let scan = scan_directory(directory, &config)
            .with_context(|| format!("Failed to scan {}", directory.display()))?;
        print_listing(&scan, *json)?;
        return Ok(true);
    }

    let plan = build_plan(&cli.command, &config)?;
    let create = plan.creates_directories() || config.create_directories;
    let plan = plan.create_directories(create);
    print_plan(&plan);

    if cli.dry_run {
        println!("Dry run: no files were changed");
        return Ok(!plan.has_conflicts());
    }

    let result = plan.execute(config.force)?;
    print_result(&result);
    Ok(result.success())
}

/// Build the operation plan for a mutating command
fn build_plan(command: &Command, config: &Config) -> Result<OperationPlan> {
    let plan = match command {
        Command::List { .. } => OperationPlan::new(),
        Command::Rename { target, components } => {
            let sequence = resolve_sequence(target, config)?;
            match components.to_components()? {
                Some(components) => sequence.rename(&components)?.1,
                None => bail!("rename needs at least one of --prefix, --delimiter, --padding, --suffix, --extension"),
            }
        }
        Command::Offset { target, delta, padding } => {
            resolve_sequence(target, config)?.offset_frames(*delta, *padding)?.1
        }
        Command::Pad { target, padding } => resolve_sequence(target, config)?.set_padding(*padding)?.1,
        Command::Copy { target, to, components } => {
            let components = components.to_components()?;
            resolve_sequence(target, config)?
                .copy_to(components.as_ref(), to.as_deref())?
                .1
        }
        Command::Move { target, destination } => {
            resolve_sequence(target, config)?.move_to(destination)?.1
        }
        Command::Folderize { target, name } => resolve_sequence(target, config)?.folderize(name)?.1,
        Command::Delete { target } => resolve_sequence(target, config)?.delete()?,
    };
    Ok(plan)
}

/// Scan the target directory and pick the sequence matching the pattern
fn resolve_sequence(target: &SequenceTarget, config: &Config) -> Result<FileSequence> {
    let scan = scan_directory(&target.directory, config)
        .with_context(|| format!("Failed to scan {}", target.directory.display()))?;
    match find_sequence(&scan.sequences, &target.pattern) {
        Some(sequence) => {
            info!(sequence = %sequence, "Resolved sequence");
            Ok(sequence.clone())
        }
        None => bail!(
            "No sequence matching '{}' in {}",
            target.pattern,
            target.directory.display()
        ),
    }
}

#[derive(Serialize)]
struct SequenceSummary {
    pattern: String,
    directory: Option<PathBuf>,
    frames: String,
    first_frame: Option<u64>,
    last_frame: Option<u64>,
    frame_count: u64,
    actual_frame_count: usize,
    /// Gaps as `first-last` spans
    missing_frames: Vec<String>,
    padding: Option<usize>,
    problems: Vec<String>,
}

#[derive(Serialize)]
struct Listing {
    sequences: Vec<SequenceSummary>,
    rogues: Vec<PathBuf>,
    movies: Vec<PathBuf>,
}

fn problem_label(problem: Problem) -> &'static str {
    match problem {
        Problem::MissingFrames => "missing_frames",
        Problem::InconsistentPadding => "inconsistent_padding",
        Problem::FilenameIncludesSpaces => "filename_includes_spaces",
        Problem::DuplicateFramesWithInconsistentPadding => {
            "duplicate_frames_with_inconsistent_padding"
        }
    }
}

fn summarize(sequence: &FileSequence) -> SequenceSummary {
    SequenceSummary {
        pattern: sequence.sequence_string().unwrap_or_default(),
        directory: sequence.directory().map(Path::to_path_buf),
        frames: sequence.frame_range_string(),
        first_frame: sequence.first_frame(),
        last_frame: sequence.last_frame(),
        frame_count: sequence.frame_count(),
        actual_frame_count: sequence.actual_frame_count(),
        missing_frames: sequence
            .missing_ranges()
            .into_iter()
            .map(|gap| {
                if gap.start() == gap.end() {
                    gap.start().to_string()
                } else {
                    format!("{}-{}", gap.start(), gap.end())
                }
            })
            .collect(),
        padding: sequence.padding(),
        problems: sequence
            .problems()
            .iter()
            .map(|p| problem_label(p).to_string())
            .collect(),
    }
}

fn print_listing(scan: &DirectoryScan, json: bool) -> Result<()> {
    let listing = Listing {
        sequences: scan.sequences.iter().map(summarize).collect(),
        rogues: scan.rogues.clone(),
        movies: scan.movies.clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.sequences.is_empty() {
        println!("No sequences found.");
    } else {
        println!("Sequences:");
        for summary in &listing.sequences {
            print!(
                "  {} [{}] ({} of {} frames)",
                summary.pattern, summary.frames, summary.actual_frame_count, summary.frame_count
            );
            if !summary.problems.is_empty() {
                print!("  ! {}", summary.problems.join(", "));
            }
            println!();
        }
    }
    if !listing.movies.is_empty() {
        println!("Movies:");
        for movie in &listing.movies {
            println!("  {}", movie.display());
        }
    }
    if !listing.rogues.is_empty() {
        println!("Other files:");
        for rogue in &listing.rogues {
            println!("  {}", rogue.display());
        }
    }
    Ok(())
}

fn print_plan(plan: &OperationPlan) {
    if plan.is_empty() {
        println!("Nothing to do");
        return;
    }
    println!("Plan ({} operations):", plan.len());
    for op in plan.operations() {
        println!("  {}", op);
    }

    let conflicts = plan.conflicts();
    if !conflicts.is_empty() {
        println!("Conflicts ({}):", conflicts.len());
        for conflict in &conflicts {
            let reason = match conflict.kind {
                ConflictKind::External => "destination exists",
                ConflictKind::Internal => "destination is moved later in this plan",
                ConflictKind::DuplicateDestination => "destination written twice",
            };
            println!("  ✗ {} ({})", conflict.operation, reason);
        }
    }
}

fn print_result(result: &ExecutionResult) {
    println!("{}", result.summary());
    for failed in &result.failed {
        println!("  ✗ {}: {}", failed.operation, failed.message);
    }
}

/// Load configuration from file or CLI flags
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        info!(config_file = %config_path.display(), "Loading configuration from file");
        let file_config = Config::load_from_file(config_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };
    Ok(config)
}

/// Setup logging: stderr always, plus a timestamped file when --log-dir is given
fn setup_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let Some(ref log_dir) = cli.log_dir else {
        if cli.json_log {
            subscriber
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            subscriber
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("frameseq_{}.log", timestamp));

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(Some(guard))
}
