/// End-to-end integration tests for the docguard pipeline.
///
/// Tests the complete flow:
///   Config → file discovery → Runner (generate → validate → restore) →
///   statistics → report → stage and commit
use docguard::config::Config;
use docguard::git::GitRepo;
use docguard::orchestrator::mock::{MemoryRestorer, RestoreBehavior, ScriptedGenerator, Step};
use docguard::orchestrator::restore::FileRestorer;
use docguard::orchestrator::{self, OutcomeStatus, RetryPolicy};
use docguard::report::{RunReport, RunStatistics};
use docguard::runner::{self, FileJob, Runner};
use docguard::validator::{self, DocChangeKind, StructuralValidator, VerdictStatus};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const UTILS: &str = "import os\n\n\ndef join(a, b):\n    return os.path.join(a, b)\n\n\nclass Cache:\n    def get(self, key):\n        return self.data.get(key)\n";

const UTILS_DOCUMENTED: &str = "\"\"\"Path helpers.\"\"\"\nimport os\n\n\ndef join(a, b):\n    \"\"\"Join two path parts.\"\"\"\n    return os.path.join(a, b)\n\n\nclass Cache:\n    \"\"\"Key lookup.\"\"\"\n\n    def get(self, key):\n        # plain lookup\n        return self.data.get(key)\n";

const UTILS_TAMPERED: &str = "\"\"\"Path helpers.\"\"\"\nimport os\n\n\ndef join(a, b):\n    \"\"\"Join two path parts.\"\"\"\n    return os.path.join(b, a)\n\n\nclass Cache:\n    def get(self, key):\n        return self.data.get(key)\n";

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        retry_delay: Duration::ZERO,
    }
}

/// The validator accepts docstring and comment edits and names the changed
/// call when arguments are swapped.
#[test]
fn test_validator_contract() {
    let verdict = validator::validate(UTILS, UTILS_DOCUMENTED).unwrap();
    assert!(verdict.passed, "{}", verdict.divergence);
    let names: Vec<&str> = verdict.doc_changes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["<module>", "join", "Cache"]);
    assert!(verdict.doc_changes.iter().all(|c| c.change == DocChangeKind::Added));

    let verdict = validator::validate(UTILS, UTILS_TAMPERED).unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.status, VerdictStatus::StructureChanged);
    assert!(
        verdict.divergence.starts_with("function join:"),
        "{}",
        verdict.divergence
    );

    // Removing documentation is also documentation-only.
    let verdict = validator::validate(UTILS_DOCUMENTED, UTILS).unwrap();
    assert!(verdict.passed);
    assert!(verdict.doc_changes.iter().all(|c| c.change == DocChangeKind::Removed));
}

/// Full pipeline: discover files → run → stats → report
#[tokio::test]
async fn test_full_pipeline() {
    // 1. Setup temp dir with a small package
    let temp_dir = tempdir().unwrap();
    let pkg = temp_dir.path().join("pkg");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("utils.py"), UTILS).unwrap();
    fs::write(pkg.join("broken.py"), UTILS).unwrap();
    fs::write(pkg.join("README.md"), "# pkg\n").unwrap();

    // 2. Discover files from config patterns
    let mut config = Config::default();
    config.file_patterns = vec![pkg.display().to_string()];
    let files = config.get_python_files().unwrap();
    assert_eq!(files, vec![pkg.join("broken.py"), pkg.join("utils.py")]);

    // 3. broken.py is tampered with on every attempt; utils.py succeeds on
    //    its second attempt. With one job the script is consumed in order.
    let generator = ScriptedGenerator::in_place(vec![
        Step::candidate(UTILS_TAMPERED),
        Step::candidate(UTILS_TAMPERED),
        Step::candidate(UTILS_TAMPERED),
        Step::candidate(UTILS_DOCUMENTED),
    ]);
    let runner = Runner::new(
        Arc::new(generator),
        Arc::new(StructuralValidator),
        Arc::new(FileRestorer),
        policy(2),
        1,
    );
    let outcomes = runner
        .run(files.into_iter().map(FileJob::new).collect(), |_| {})
        .await;

    assert_eq!(outcomes[0].status, OutcomeStatus::ExhaustedRetries);
    assert_eq!(outcomes[0].attempts.len(), 2);
    assert_eq!(fs::read_to_string(pkg.join("broken.py")).unwrap(), UTILS);

    assert_eq!(outcomes[1].status, OutcomeStatus::Succeeded);
    assert_eq!(outcomes[1].retries(), 1);
    assert_eq!(
        fs::read_to_string(pkg.join("utils.py")).unwrap(),
        UTILS_DOCUMENTED
    );

    // 4. Statistics and report
    let stats = RunStatistics::from_outcomes(&outcomes);
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.files_with_changes, 1);
    assert_eq!(stats.validation_failures, 3);
    assert_eq!(stats.doc_changes.added, 3);

    let report_path = temp_dir.path().join("report.json");
    RunReport::new(&stats, &outcomes, false)
        .save(&report_path)
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["statistics"]["succeeded"], 1);
    assert_eq!(json["files"].as_array().map(Vec::len), Some(2));
}

/// The free `process` entry point returns every attempt on exhaustion.
#[test]
fn test_process_exhaustion() {
    let temp_dir = tempdir().unwrap();
    let file = temp_dir.path().join("m.py");
    fs::write(&file, UTILS).unwrap();
    let generator = ScriptedGenerator::in_place(vec![Step::candidate(UTILS_TAMPERED); 3]);
    let restorer = MemoryRestorer::new(RestoreBehavior::Write);

    let outcome = orchestrator::process(&file, &generator, &StructuralValidator, &restorer, 3);

    assert_eq!(outcome.status, OutcomeStatus::ExhaustedRetries);
    assert_eq!(outcome.attempts.len(), 3);
    assert!(outcome.accepted_source.is_none());
    assert_eq!(generator.observed(), vec![UTILS; 3]);
    assert_eq!(fs::read_to_string(&file).unwrap(), UTILS);
}

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Git discovery → run → stage and commit with the skip-ci trailer
#[tokio::test]
async fn test_git_pipeline_commits_changes() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();
    if !git(root, &["init", "-q"]) {
        return;
    }
    git(root, &["config", "user.name", "Dev"]);
    git(root, &["config", "user.email", "dev@example.com"]);
    git(root, &["config", "commit.gpgsign", "false"]);
    fs::write(root.join("utils.py"), UTILS).unwrap();
    assert!(git(root, &["add", "."]));
    assert!(git(root, &["commit", "-q", "-m", "init"]));

    let repo = GitRepo::open(root);
    let files = repo.changed_python_files(None).unwrap();
    assert_eq!(files, vec![Path::new("utils.py").to_path_buf()]);

    let absolute: Vec<_> = files.iter().map(|f| root.join(f)).collect();
    let jobs = runner::jobs_with_diffs(&repo, None, absolute);
    assert!(jobs[0].context.contains("+def join(a, b):"));

    let runner = Runner::new(
        Arc::new(ScriptedGenerator::in_place(vec![Step::candidate(
            UTILS_DOCUMENTED,
        )])),
        Arc::new(StructuralValidator),
        Arc::new(FileRestorer),
        policy(1),
        1,
    );
    let outcomes = runner.run(jobs, |_| {}).await;
    let stats = RunStatistics::from_outcomes(&outcomes);

    let committed =
        runner::commit_changes(&repo, "docs: auto-update docstrings", &stats, &outcomes).unwrap();
    assert!(committed);

    let log = Command::new("git")
        .current_dir(root)
        .args(["log", "-1", "--format=%B"])
        .output()
        .unwrap();
    let message = String::from_utf8_lossy(&log.stdout);
    assert!(message.starts_with("docs: auto-update docstrings"));
    assert!(message.contains("- utils.py: 3 docstring changes"));
    assert!(message.contains("[skip ci]"));
}
