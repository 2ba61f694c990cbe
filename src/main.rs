use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docguard::config::Config;
use docguard::git::GitRepo;
use docguard::report::{self, RunReport, RunStatistics};
use docguard::runner::{self, FileJob, Runner};
use docguard::validator;

#[derive(Parser, Debug)]
#[command(
    name = "docguard",
    version,
    about = "Rewrite Python docstrings with an external tool and keep only rewrites that change nothing else"
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare two versions of a file
    Check(CheckArgs),
    /// Generate, validate and keep docstring updates
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    original: PathBuf,
    candidate: PathBuf,
    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Files to process; defaults to git discovery or `file_patterns`
    files: Vec<PathBuf>,
    #[arg(long, default_value = "")]
    config: String,
    #[arg(long)]
    max_attempts: Option<usize>,
    #[arg(long)]
    jobs: Option<usize>,
    /// Base ref for changed-file discovery and diffs
    #[arg(long)]
    base: Option<String>,
    /// Stage and commit accepted changes
    #[arg(long)]
    commit: bool,
    /// Write a JSON report here
    #[arg(long)]
    report: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check(args) => check(args),
        Commands::Run(args) => run(args).await,
    }
}

fn check(args: CheckArgs) -> Result<ExitCode> {
    let original = std::fs::read_to_string(&args.original)
        .with_context(|| format!("failed to read {}", args.original.display()))?;
    let candidate = std::fs::read_to_string(&args.candidate)
        .with_context(|| format!("failed to read {}", args.candidate.display()))?;

    let verdict = validator::validate(&original, &candidate)
        .with_context(|| format!("cannot validate against {}", args.original.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if verdict.passed {
        println!("equivalent: only docstrings differ");
        for change in &verdict.doc_changes {
            println!("  {:?} {:?} {}", change.change, change.scope, change.name);
        }
    } else {
        println!("rejected: {}", verdict.divergence);
    }

    Ok(if verdict.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    // 1. Config: file, environment, flags
    let mut config = Config::load(&args.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if args.base.is_some() {
        config.git.diff_base = args.base.clone();
    }
    if args.commit {
        config.git.commit = true;
    }
    config.validate()?;

    // 2. Files to process
    let repo = GitRepo::open(".").with_identity(config.commit_identity());
    let base = if config.git.discover {
        repo.resolve_base(config.git.diff_base.as_deref(), &config.git.bot_author)
    } else {
        None
    };
    let files = if !args.files.is_empty() {
        args.files.clone()
    } else if config.git.discover {
        match repo.changed_python_files(base.as_deref()) {
            Ok(files) => files,
            Err(e) => {
                warn!("git discovery failed, falling back to file patterns: {e}");
                config.get_python_files()?
            }
        }
    } else {
        config.get_python_files()?
    };

    if files.is_empty() {
        info!("No Python files to process. Nothing to do.");
        return Ok(ExitCode::SUCCESS);
    }
    for file in &files {
        info!("  - {}", file.display());
    }

    let jobs = if config.git.discover {
        runner::jobs_with_diffs(&repo, base.as_deref(), files)
    } else {
        files.into_iter().map(FileJob::new).collect()
    };

    // 3. Process
    let pb = ProgressBar::new(jobs.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("█▓░"));
    }
    let progress = pb.clone();
    let outcomes = Runner::from_config(&config, &repo)
        .run(jobs, move |outcome| {
            progress.set_message(outcome.file.display().to_string());
            progress.inc(1);
        })
        .await;
    pb.finish_and_clear();

    // 4. Summarize and publish
    let stats = RunStatistics::from_outcomes(&outcomes);
    info!(
        total = stats.total_files,
        succeeded = stats.succeeded,
        failed = stats.failed(),
        changed = stats.files_with_changes,
        retries = stats.total_retries,
        "Processing complete ({:.1}% success)",
        stats.success_rate
    );
    for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
        warn!(
            file = %outcome.file.display(),
            status = ?outcome.status,
            error = outcome.error.as_deref().unwrap_or_default(),
            "not updated"
        );
    }

    let mut committed = false;
    if config.git.commit {
        committed = runner::commit_changes(&repo, &config.git.commit_message, &stats, &outcomes)?;
    }

    let github_output = config
        .github_output
        .clone()
        .or_else(|| std::env::var("GITHUB_OUTPUT").ok());
    if let Some(path) = github_output {
        if let Err(e) = report::write_github_outputs(Path::new(&path), &stats) {
            warn!("Could not set GitHub Actions outputs: {e}");
        }
    }

    if let Some(path) = &args.report {
        RunReport::new(&stats, &outcomes, committed).save(path)?;
        info!("Report written to {}", path.display());
    }

    if stats.failed() > 0 {
        warn!("{} files failed processing", stats.failed());
        Ok(ExitCode::FAILURE)
    } else {
        info!("All files processed successfully");
        Ok(ExitCode::SUCCESS)
    }
}
