//! Treeline - feature workflow orchestrator.
//!
//! Drives features from spec to merge through isolated worktrees:
//! create a feature, advance it through the pipeline, schedule its
//! tasks, and archive it back into the base branch.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use treeline::{Config, Feature, Orchestrator, TaskOutcome};

/// Feature workflow orchestrator
#[derive(Parser)]
#[command(name = "treeline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Repository root (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    repo: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new feature from a name hint
    New {
        /// Feature name (e.g. "user authentication")
        name: String,
    },

    /// Advance a feature to its next phase
    Advance {
        /// Feature id
        id: u32,
    },

    /// Show the next batch of dispatchable tasks
    Tasks {
        /// Feature id
        id: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Report the outcome of a dispatched task
    Report {
        /// Feature id
        id: u32,

        /// Task id (e.g. T001)
        task: String,

        /// Outcome (completed, skipped)
        outcome: TaskOutcome,

        /// Optional reason, recorded as the task summary
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Merge a reviewed feature and archive it
    Archive {
        /// Feature id
        id: u32,

        /// Target branch (defaults to the configured base branch)
        #[arg(short, long)]
        target: Option<String>,

        /// Merge even if the trial merge reports conflicts
        #[arg(short, long)]
        force: bool,
    },

    /// Discard a feature without merging
    Discard {
        /// Feature id
        id: u32,

        /// Discard even with uncommitted modifications
        #[arg(short, long)]
        force: bool,
    },

    /// List active features
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    let repo_root = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    match cli.command {
        Commands::New { name } => cmd_new(&repo_root, &name)?,
        Commands::Advance { id } => cmd_advance(&repo_root, id)?,
        Commands::Tasks { id, format } => cmd_tasks(&repo_root, id, &format)?,
        Commands::Report { id, task, outcome, reason } => {
            cmd_report(&repo_root, id, &task, outcome, reason.as_deref())?;
        }
        Commands::Archive { id, target, force } => {
            cmd_archive(&repo_root, id, target.as_deref(), force)?;
        }
        Commands::Discard { id, force } => cmd_discard(&repo_root, id, force)?,
        Commands::List { format } => cmd_list(&repo_root, &format)?,
        Commands::Config { path } => cmd_config(&repo_root, path)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

/// Start a new feature.
fn cmd_new(repo_root: &Path, name: &str) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    let feature = orchestrator.create_feature(name)?;

    println!("Created feature {:03}: {}", feature.id, feature.name());
    println!("  Branch:    {}", feature.branch);
    if let Some(path) = &feature.workspace_path {
        println!("  Workspace: {}", path.display());
    }
    println!("  Phase:     {}", feature.phase);
    Ok(())
}

/// Advance a feature to its next phase.
fn cmd_advance(repo_root: &Path, id: u32) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    let feature = orchestrator.advance_phase(id)?;

    println!("Feature {:03} advanced to phase '{}'", feature.id, feature.phase);
    if !feature.tasks.is_empty() {
        println!("  Tasks: {}", feature.progress_string());
    }
    Ok(())
}

/// Show the next batch of dispatchable tasks.
fn cmd_tasks(repo_root: &Path, id: u32, format: &str) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    let batch = orchestrator.next_tasks(id)?;
    let feature = orchestrator.feature(id)?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&batch)?;
            println!("{json}");
        }
        _ => {
            if batch.is_empty() {
                println!("No dispatchable tasks ({})", feature.progress_string());
            } else {
                for task_id in &batch {
                    if let Some(task) = feature.task(task_id) {
                        let marker = if task.is_parallel_safe { "[P]" } else { "   " };
                        println!("{task_id} {marker} {}", task.description);
                    } else {
                        println!("{task_id}");
                    }
                }
            }
        }
    }
    Ok(())
}

/// Report a task outcome.
fn cmd_report(
    repo_root: &Path,
    id: u32,
    task: &str,
    outcome: TaskOutcome,
    reason: Option<&str>,
) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    let feature = orchestrator.report_task(id, task, outcome, reason)?;

    println!("Task {task} reported ({})", feature.progress_string());
    Ok(())
}

/// Merge and archive a feature.
fn cmd_archive(repo_root: &Path, id: u32, target: Option<&str>, force: bool) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    let report = orchestrator.archive_feature(id, target, force)?;

    println!("Feature {id:03} archived");
    println!("  Merged '{}' into '{}'", report.branch, report.target);
    println!("  Merge commit: {}", report.merge_commit);
    if report.forced {
        println!("  Conflicts were resolved in favor of the feature branch");
    }
    Ok(())
}

/// Discard a feature without merging.
fn cmd_discard(repo_root: &Path, id: u32, force: bool) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    orchestrator.discard_feature(id, force)?;

    println!("Feature {id:03} discarded");
    Ok(())
}

/// List active features.
fn cmd_list(repo_root: &Path, format: &str) -> Result<()> {
    let orchestrator = Orchestrator::open(repo_root)?;
    let features = orchestrator.list_active_features()?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&features)?;
            println!("{json}");
        }
        _ => {
            for feature in &features {
                println!("{}", feature_line(feature));
            }
            println!("\nTotal: {} active feature(s)", features.len());
        }
    }
    Ok(())
}

/// One-line display for a feature.
fn feature_line(feature: &Feature) -> String {
    let tasks = if feature.tasks.is_empty() {
        String::new()
    } else {
        format!(" [{}]", feature.progress_string())
    };
    format!(
        "{:03}  {:<10} {}{}",
        feature.id, feature.phase, feature.branch, tasks
    )
}

/// Show configuration.
fn cmd_config(repo_root: &Path, show_path: bool) -> Result<()> {
    if show_path {
        println!("{}", Config::path_for(repo_root).display());
        return Ok(());
    }

    let config = Config::load(repo_root)?;
    let content = toml::to_string_pretty(&config)?;
    print!("{content}");
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
