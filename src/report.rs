/// Run summaries: statistics, commit message, GitHub Actions outputs and the
/// JSON report.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::orchestrator::{OutcomeStatus, ProcessingOutcome};
use crate::validator::{DocChangeKind, ScopeKind};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DocChangeCounts {
    pub modules: usize,
    pub classes: usize,
    pub functions: usize,
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub total_files: usize,
    pub succeeded: usize,
    pub exhausted: usize,
    pub hard_errors: usize,
    pub files_with_changes: usize,
    pub total_attempts: usize,
    pub total_retries: usize,
    pub validation_failures: usize,
    pub generation_failures: usize,
    pub doc_changes: DocChangeCounts,
    /// Percentage of files that succeeded; 100 for an empty run.
    pub success_rate: f64,
}

impl RunStatistics {
    pub fn from_outcomes(outcomes: &[ProcessingOutcome]) -> Self {
        let mut stats = RunStatistics {
            total_files: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Succeeded => stats.succeeded += 1,
                OutcomeStatus::ExhaustedRetries => stats.exhausted += 1,
                OutcomeStatus::HardError => stats.hard_errors += 1,
            }
            if outcome.succeeded() && outcome.changes_made() {
                stats.files_with_changes += 1;
            }
            stats.total_attempts += outcome.attempts.len();
            stats.total_retries += outcome.retries();
            stats.validation_failures += outcome.validation_failures();
            stats.generation_failures += outcome.generation_failures();

            for change in outcome.doc_changes() {
                let counts = &mut stats.doc_changes;
                match change.scope {
                    ScopeKind::Module => counts.modules += 1,
                    ScopeKind::Class => counts.classes += 1,
                    ScopeKind::Function => counts.functions += 1,
                }
                match change.change {
                    DocChangeKind::Added => counts.added += 1,
                    DocChangeKind::Modified => counts.modified += 1,
                    DocChangeKind::Removed => counts.removed += 1,
                }
            }
        }
        stats.success_rate = if stats.total_files == 0 {
            100.0
        } else {
            stats.succeeded as f64 * 100.0 / stats.total_files as f64
        };
        stats
    }

    pub fn failed(&self) -> usize {
        self.exhausted + self.hard_errors
    }
}

/// Commit message listing each changed file and its docstring change count.
pub fn commit_message(title: &str, stats: &RunStatistics, outcomes: &[ProcessingOutcome]) -> String {
    let mut message = format!(
        "{}\n\nUpdated docstrings for {} files:\n",
        title.trim(),
        stats.files_with_changes
    );
    for outcome in outcomes {
        if outcome.succeeded() && outcome.changes_made() {
            let name = outcome
                .file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| outcome.file.display().to_string());
            message.push_str(&format!(
                "- {name}: {} docstring changes\n",
                outcome.doc_changes().len()
            ));
        }
    }
    message
}

/// `key=value` lines in the GitHub Actions output format.
pub fn github_output_lines(stats: &RunStatistics) -> String {
    format!(
        "files_processed={}\nfiles_successful={}\nfiles_failed={}\nfiles_changed={}\n",
        stats.total_files,
        stats.succeeded,
        stats.failed(),
        stats.files_with_changes
    )
}

/// Append the output lines to `path` (the `$GITHUB_OUTPUT` file).
pub fn write_github_outputs(path: &Path, stats: &RunStatistics) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(github_output_lines(stats).as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub statistics: &'a RunStatistics,
    pub committed: bool,
    pub files: &'a [ProcessingOutcome],
}

impl<'a> RunReport<'a> {
    pub fn new(statistics: &'a RunStatistics, files: &'a [ProcessingOutcome], committed: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            statistics,
            committed,
            files,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::AttemptRecord;
    use crate::validator;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn succeeded(file: &str, original: &str, candidate: &str) -> ProcessingOutcome {
        let verdict = validator::validate(original, candidate).unwrap();
        ProcessingOutcome {
            file: PathBuf::from(file),
            status: OutcomeStatus::Succeeded,
            attempts: vec![AttemptRecord {
                index: 1,
                candidate: Some(candidate.to_string()),
                verdict: Some(verdict),
                error: None,
                elapsed_ms: 5,
            }],
            accepted_source: Some(candidate.to_string()),
            error: None,
            changes_made: original != candidate,
        }
    }

    fn exhausted(file: &str) -> ProcessingOutcome {
        let verdict = validator::validate("x = 1\n", "x = 2\n").unwrap();
        let record = |index| AttemptRecord {
            index,
            candidate: Some("x = 2\n".to_string()),
            verdict: Some(verdict.clone()),
            error: Some(verdict.divergence.clone()),
            elapsed_ms: 1,
        };
        ProcessingOutcome {
            file: PathBuf::from(file),
            status: OutcomeStatus::ExhaustedRetries,
            attempts: vec![record(1), record(2)],
            accepted_source: None,
            error: None,
            changes_made: false,
        }
    }

    fn sample() -> Vec<ProcessingOutcome> {
        vec![
            succeeded(
                "pkg/a.py",
                "class A:\n    def m(self):\n        pass\n",
                "\"\"\"Mod.\"\"\"\nclass A:\n    \"\"\"A.\"\"\"\n    def m(self):\n        pass\n",
            ),
            succeeded("pkg/b.py", "x = 1\n", "x = 1\n"),
            exhausted("pkg/c.py"),
        ]
    }

    #[test]
    fn test_statistics() {
        let stats = RunStatistics::from_outcomes(&sample());
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.files_with_changes, 1);
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.total_retries, 1);
        assert_eq!(stats.validation_failures, 2);
        assert_eq!(stats.doc_changes.modules, 1);
        assert_eq!(stats.doc_changes.classes, 1);
        assert_eq!(stats.doc_changes.functions, 0);
        assert_eq!(stats.doc_changes.added, 2);
        assert!((stats.success_rate - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_empty_run_is_fully_successful() {
        let stats = RunStatistics::from_outcomes(&[]);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(stats.failed(), 0);
    }

    #[test]
    fn test_commit_message_lists_changed_files() {
        let outcomes = sample();
        let stats = RunStatistics::from_outcomes(&outcomes);
        let message = commit_message("docs: auto-update docstrings", &stats, &outcomes);
        assert_eq!(
            message,
            "docs: auto-update docstrings\n\nUpdated docstrings for 1 files:\n- a.py: 2 docstring changes\n"
        );
    }

    #[test]
    fn test_github_outputs_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, "existing=1\n").unwrap();
        let stats = RunStatistics::from_outcomes(&sample());
        write_github_outputs(&path, &stats).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "existing=1\nfiles_processed=3\nfiles_successful=2\nfiles_failed=1\nfiles_changed=1\n"
        );
    }

    #[test]
    fn test_report_json_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let outcomes = sample();
        let stats = RunStatistics::from_outcomes(&outcomes);
        RunReport::new(&stats, &outcomes, false).save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["statistics"]["total_files"], 3);
        assert_eq!(json["files"][0]["status"], "succeeded");
        assert_eq!(json["files"][2]["status"], "exhausted_retries");
        assert!(json["files"][0]["attempts"][0].get("candidate").is_none());
        assert_eq!(
            json["files"][0]["attempts"][0]["verdict"]["doc_changes"][0]["change"],
            "added"
        );
        assert!(json["generated_at"].is_string());
    }
}
