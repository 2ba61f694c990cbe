/// Runs the orchestrator over many files and publishes the accepted results.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::git::GitRepo;
use crate::orchestrator::command::CommandGenerator;
use crate::orchestrator::restore::{FileRestorer, GitRestorer, RestoreStrategy};
use crate::orchestrator::{
    Generator, Orchestrator, OutcomeStatus, ProcessingOutcome, Restorer, RetryPolicy,
};
use crate::prompt::PromptTemplate;
use crate::report::{self, RunStatistics};
use crate::validator::{StructuralValidator, Validator};

/// One file to process and the context handed to its generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub path: PathBuf,
    pub context: String,
}

impl FileJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            context: String::new(),
        }
    }
}

pub struct Runner {
    generator: Arc<dyn Generator>,
    validator: Arc<dyn Validator>,
    restorer: Arc<dyn Restorer>,
    policy: RetryPolicy,
    jobs: usize,
}

impl Runner {
    pub fn new(
        generator: Arc<dyn Generator>,
        validator: Arc<dyn Validator>,
        restorer: Arc<dyn Restorer>,
        policy: RetryPolicy,
        jobs: usize,
    ) -> Self {
        Self {
            generator,
            validator,
            restorer,
            policy,
            jobs: jobs.max(1),
        }
    }

    /// Command generator, structural validator and the configured restorer.
    pub fn from_config(config: &Config, repo: &GitRepo) -> Self {
        let generator = CommandGenerator::new(
            config.generator.command.clone(),
            config.generator.output,
            config.generator_timeout(),
        )
        .with_prompt(PromptTemplate::from_config(
            config.generator.prompt_template.as_deref(),
        ));
        let restorer: Arc<dyn Restorer> = match config.restore {
            RestoreStrategy::Write => Arc::new(FileRestorer),
            RestoreStrategy::Git => Arc::new(GitRestorer::new(repo.clone())),
        };
        Self::new(
            Arc::new(generator),
            Arc::new(StructuralValidator),
            restorer,
            config.retry_policy(),
            config.jobs,
        )
    }

    /// Process every job, at most `jobs` at a time. Outcomes come back in
    /// input order; `on_done` is called as each file finishes.
    pub async fn run<F>(&self, files: Vec<FileJob>, on_done: F) -> Vec<ProcessingOutcome>
    where
        F: Fn(&ProcessingOutcome) + Send + Sync + 'static,
    {
        if files.is_empty() {
            return Vec::new();
        }
        info!(files = files.len(), jobs = self.jobs, "processing files");

        let on_done = Arc::new(on_done);
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::with_capacity(files.len());

        for job in files {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let generator = self.generator.clone();
            let validator = self.validator.clone();
            let restorer = self.restorer.clone();
            let policy = self.policy;
            let on_done = on_done.clone();
            let path = job.path.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let orchestrator =
                    Orchestrator::new(&*generator, &*validator, &*restorer, policy);
                let mut outcome = orchestrator.process(&job.path, &job.context);
                finalize(&mut outcome);
                on_done(&outcome);
                outcome
            });
            handles.push((path, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(file = %path.display(), "worker failed: {e}");
                    outcomes.push(ProcessingOutcome {
                        file: path,
                        status: OutcomeStatus::HardError,
                        attempts: Vec::new(),
                        accepted_source: None,
                        error: Some(format!("worker failed: {e}")),
                        changes_made: false,
                    });
                }
            }
        }
        outcomes
    }
}

/// Make sure an accepted candidate is what the file holds.
fn finalize(outcome: &mut ProcessingOutcome) {
    let Some(accepted) = outcome.accepted_source.as_deref() else {
        return;
    };
    let current = fs::read_to_string(&outcome.file).unwrap_or_default();
    if current == accepted {
        return;
    }
    debug!(file = %outcome.file.display(), "writing accepted source");
    if let Err(e) = fs::write(&outcome.file, accepted) {
        error!(file = %outcome.file.display(), "failed to write accepted source: {e}");
        outcome.status = OutcomeStatus::HardError;
        outcome.error = Some(format!("failed to write accepted source: {e}"));
        outcome.accepted_source = None;
        outcome.changes_made = false;
    }
}

/// Attach each file's diff since `base` as generation context.
pub fn jobs_with_diffs(repo: &GitRepo, base: Option<&str>, files: Vec<PathBuf>) -> Vec<FileJob> {
    files
        .into_iter()
        .map(|path| {
            let relative = relative_to(repo.root(), &path);
            let context = match repo.file_diff(base, relative) {
                Ok(diff) => diff,
                Err(e) => {
                    warn!(file = %path.display(), "no diff available: {e}");
                    String::new()
                }
            };
            FileJob { path, context }
        })
        .collect()
}

/// Stage every changed file and commit them together. Returns whether a
/// commit was made.
pub fn commit_changes(
    repo: &GitRepo,
    title: &str,
    stats: &RunStatistics,
    outcomes: &[ProcessingOutcome],
) -> Result<bool> {
    let mut staged_any = false;
    for outcome in outcomes.iter().filter(|o| o.succeeded() && o.changes_made()) {
        let relative = relative_to(repo.root(), &outcome.file);
        match repo.stage(relative) {
            Ok(()) => staged_any = true,
            Err(e) => error!(file = %outcome.file.display(), "failed to stage: {e}"),
        }
    }

    if !staged_any {
        info!("no files required docstring updates");
        return Ok(false);
    }
    if !repo.has_staged_changes()? {
        warn!("files were processed but no changes were staged");
        return Ok(false);
    }
    repo.commit(&report::commit_message(title, stats, outcomes))?;
    Ok(true)
}

fn relative_to<'p>(root: &Path, file: &'p Path) -> &'p Path {
    file.strip_prefix(root).unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::mock::{MemoryRestorer, RestoreBehavior, ScriptedGenerator, Step};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const BASELINE: &str = "def f(x):\n    return x + 1\n";
    const DOCUMENTED: &str = "def f(x):\n    \"\"\"Add one.\"\"\"\n    return x + 1\n";

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_writes_stdout_candidates() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, BASELINE).unwrap();
        fs::write(&b, BASELINE).unwrap();

        // Not in place: the runner must write the accepted source itself.
        let generator = ScriptedGenerator::new(vec![
            Step::candidate(DOCUMENTED),
            Step::candidate(DOCUMENTED),
        ]);
        let runner = Runner::new(
            Arc::new(generator),
            Arc::new(StructuralValidator),
            Arc::new(MemoryRestorer::new(RestoreBehavior::Write)),
            policy(2),
            1,
        );
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let outcomes = runner
            .run(vec![FileJob::new(&a), FileJob::new(&b)], move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].file, a);
        assert_eq!(outcomes[1].file, b);
        assert!(outcomes.iter().all(|o| o.succeeded() && o.changes_made()));
        assert_eq!(fs::read_to_string(&a).unwrap(), DOCUMENTED);
        assert_eq!(fs::read_to_string(&b).unwrap(), DOCUMENTED);
    }

    #[tokio::test]
    async fn test_run_parallel_failures_leave_baseline() {
        let dir = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("m{i}.py"));
                fs::write(&path, BASELINE).unwrap();
                path
            })
            .collect();
        let generator = ScriptedGenerator::in_place(vec![]);
        let runner = Runner::new(
            Arc::new(generator),
            Arc::new(StructuralValidator),
            Arc::new(MemoryRestorer::new(RestoreBehavior::Write)),
            policy(2),
            3,
        );

        let outcomes = runner
            .run(files.iter().map(FileJob::new).collect(), |_| {})
            .await;

        assert_eq!(outcomes.len(), 4);
        for (outcome, path) in outcomes.iter().zip(&files) {
            assert_eq!(&outcome.file, path);
            assert_eq!(outcome.status, OutcomeStatus::ExhaustedRetries);
            assert_eq!(outcome.attempts.len(), 2);
            assert_eq!(fs::read_to_string(path).unwrap(), BASELINE);
        }
    }

    #[tokio::test]
    async fn test_run_empty() {
        let runner = Runner::new(
            Arc::new(ScriptedGenerator::new(vec![])),
            Arc::new(StructuralValidator),
            Arc::new(MemoryRestorer::new(RestoreBehavior::Write)),
            policy(1),
            1,
        );
        assert!(runner.run(Vec::new(), |_| {}).await.is_empty());
    }

    #[test]
    fn test_finalize_leaves_matching_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("m.py");
        fs::write(&file, DOCUMENTED).unwrap();
        let mut outcome = ProcessingOutcome {
            file: file.clone(),
            status: OutcomeStatus::Succeeded,
            attempts: Vec::new(),
            accepted_source: Some(DOCUMENTED.to_string()),
            error: None,
            changes_made: true,
        };
        finalize(&mut outcome);
        assert!(outcome.succeeded());
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(
            relative_to(Path::new("/repo"), Path::new("/repo/pkg/a.py")),
            Path::new("pkg/a.py")
        );
        assert_eq!(
            relative_to(Path::new("."), Path::new("pkg/a.py")),
            Path::new("pkg/a.py")
        );
    }
}
