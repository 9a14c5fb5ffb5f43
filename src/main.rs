use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use line_patcher::config::{
    apply_edit, check_patch, load_from_path, resolve_edit, ApplicationError, LoadedSpec, Metadata,
    PatchConfig, PatchDefinition,
};
use line_patcher::{EditError, EditResult, MarkerPolicy, MarkerWarning, WorkspaceGuard};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "line-patcher")]
#[command(about = "Replace a marker-verified line range in a text file", long_about = None)]
#[command(version)]
struct Cli {
    /// Log each step to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a line range and rewrite the file
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Verify markers and print the range hash without writing
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Patch spec (TOML) describing the edit
    #[arg(
        short,
        long,
        conflicts_with_all = [
            "file",
            "start",
            "end",
            "start_marker",
            "end_marker",
            "replacement",
            "replacement_file",
        ]
    )]
    patch: Option<PathBuf>,

    /// File to edit
    #[arg(short, long, required_unless_present = "patch")]
    file: Option<PathBuf>,

    /// First line of the range (1-indexed, inclusive)
    #[arg(long, required_unless_present = "patch")]
    start: Option<usize>,

    /// Last line of the range (1-indexed, inclusive)
    #[arg(long, required_unless_present = "patch")]
    end: Option<usize>,

    /// Text expected in the first line of the range
    #[arg(long, required_unless_present = "patch")]
    start_marker: Option<String>,

    /// Text expected in the last line of the range
    #[arg(long, required_unless_present = "patch")]
    end_marker: Option<String>,

    /// Replacement block, used verbatim
    #[arg(long, conflicts_with = "replacement_file")]
    replacement: Option<String>,

    /// Read the replacement block from a file
    #[arg(long)]
    replacement_file: Option<PathBuf>,

    /// Abort when the end marker is missing instead of warning
    #[arg(long)]
    strict: bool,

    /// Refuse to edit files outside this directory
    #[arg(short, long)]
    workspace: Option<PathBuf>,
}

/// A patch spec ready to run: config, base directory, optional guard.
struct Target {
    config: PatchConfig,
    base_dir: PathBuf,
    guard: Option<WorkspaceGuard>,
}

impl TargetArgs {
    fn resolve(self) -> Result<Target> {
        let (mut config, base_dir) = match self.patch {
            Some(path) => {
                let LoadedSpec { config, base_dir } = load_from_path(&path)?;
                (config, base_dir)
            }
            None => {
                let patch = PatchDefinition {
                    file: lossy(self.file.context("--file is required without --patch")?),
                    start_line: self.start.context("--start is required without --patch")?,
                    end_line: self.end.context("--end is required without --patch")?,
                    start_marker: self
                        .start_marker
                        .context("--start-marker is required without --patch")?,
                    end_marker: self
                        .end_marker
                        .context("--end-marker is required without --patch")?,
                    replacement: self.replacement,
                    replacement_file: self.replacement_file.map(lossy),
                    policy: MarkerPolicy::default(),
                    verify: None,
                };
                let config = PatchConfig {
                    meta: Metadata::default(),
                    patch,
                };
                config.validate()?;
                (config, PathBuf::from("."))
            }
        };

        if self.strict {
            config.patch.policy = MarkerPolicy::Strict;
        }

        let guard = self.workspace.map(WorkspaceGuard::new).transpose()?;

        Ok(Target {
            config,
            base_dir,
            guard,
        })
    }
}

fn lossy(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

/// The end-marker warning is printed by `report_warning`; the library's own
/// `warn!` for it stays hidden unless `-v` or `RUST_LOG` asks for it.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply { target, diff } => cmd_apply(target.resolve()?, diff),
        Commands::Check { target } => cmd_check(target.resolve()?),
    }
}

/// Print a marker mismatch the way users expect: `Mismatch at <line>: <content>`.
fn report_mismatch(error: &EditError) {
    eprintln!("{}", error.to_string().red());
    if let EditError::StartMismatch { file, marker, .. }
    | EditError::EndMismatch { file, marker, .. } = error
    {
        eprintln!("  File: {}", file.display());
        eprintln!("  Expected marker: {}", marker);
    }
    if let Some(line) = error.hint() {
        eprintln!("  {}", format!("Marker found nearby at line {}", line).yellow());
    }
}

fn report_warning(warning: &MarkerWarning) {
    eprintln!("{}", warning.to_string().yellow());
    if let Some(line) = warning.hint() {
        eprintln!("  {}", format!("Marker found nearby at line {}", line).dimmed());
    }
    eprintln!("  {}", "Continuing anyway (use --strict to abort)".dimmed());
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(target: Target, show_diff: bool) -> Result<()> {
    let Target {
        config,
        base_dir,
        guard,
    } = target;

    let edit = resolve_edit(&config, &base_dir, guard.as_ref())?;
    let before = if show_diff {
        fs::read_to_string(&edit.file).ok()
    } else {
        None
    };

    match apply_edit(&edit, guard.as_ref()) {
        Ok(result) => {
            for warning in result.warnings() {
                report_warning(warning);
            }

            match &result {
                EditResult::Applied {
                    file,
                    lines_removed,
                    ..
                } => {
                    println!(
                        "{} Replaced {} line(s) starting at line {} in {}",
                        "✓".green(),
                        lines_removed,
                        config.patch.start_line,
                        file.display()
                    );
                    if let Some(before) = &before {
                        if let Ok(after) = fs::read_to_string(file) {
                            display_diff(file, before, &after);
                        }
                    }
                }
                EditResult::Unchanged { file, .. } => {
                    println!(
                        "{} Replacement matches current content of {}",
                        "⊙".yellow(),
                        file.display()
                    );
                }
            }

            println!("{}", "Success".green());
            Ok(())
        }
        Err(ApplicationError::Edit(
            error @ (EditError::StartMismatch { .. } | EditError::EndMismatch { .. }),
        )) => {
            report_mismatch(&error);
            std::process::exit(1);
        }
        Err(error) => Err(error.into()),
    }
}

fn cmd_check(target: Target) -> Result<()> {
    let Target {
        config,
        base_dir,
        guard,
    } = target;

    println!("{}", "Checking patch...".bold());
    println!("Patch: {}", config.display_name());
    if let Some(description) = &config.meta.description {
        println!("Description: {}", description);
    }
    println!("Policy: {}", config.patch.policy);
    println!();

    match check_patch(&config, &base_dir, guard.as_ref()) {
        Ok(report) => {
            for warning in &report.warnings {
                report_warning(warning);
            }

            println!(
                "{} Lines {}-{} of {} ({} line(s))",
                "✓".green(),
                config.patch.start_line,
                config.patch.end_line,
                report.line_count,
                report.range_lines
            );
            println!("  Range hash (xxh3): {:016x}", report.range_hash);
            Ok(())
        }
        Err(ApplicationError::Edit(
            error @ (EditError::StartMismatch { .. } | EditError::EndMismatch { .. }),
        )) => {
            report_mismatch(&error);
            std::process::exit(1);
        }
        Err(error) => Err(error.into()),
    }
}
