/// Restorers that put a file back to its baseline between attempts.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{RestoreError, Restorer};
use crate::git::GitRepo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStrategy {
    /// Write the baseline text back.
    #[default]
    Write,
    /// `git restore` the path from the index.
    Git,
}

/// Writes the baseline captured before the first attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileRestorer;

impl Restorer for FileRestorer {
    fn restore(&self, file: &Path, baseline: &str) -> Result<(), RestoreError> {
        fs::write(file, baseline).map_err(|source| RestoreError::Io {
            path: file.to_path_buf(),
            source,
        })
    }
}

/// Restores through git. Only correct when the baseline is the indexed
/// content; the orchestrator's re-read check catches any mismatch.
pub struct GitRestorer {
    repo: GitRepo,
}

impl GitRestorer {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo }
    }
}

impl Restorer for GitRestorer {
    fn restore(&self, file: &Path, _baseline: &str) -> Result<(), RestoreError> {
        let relative = file.strip_prefix(self.repo.root()).unwrap_or(file);
        self.repo
            .restore(relative)
            .map_err(|e| RestoreError::Command {
                path: file.to_path_buf(),
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_restorer_writes_baseline() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("m.py");
        fs::write(&file, "changed\n").unwrap();
        FileRestorer.restore(&file, "original\n").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "original\n");
    }

    #[test]
    fn test_file_restorer_reports_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("missing").join("m.py");
        let err = FileRestorer.restore(&file, "x").unwrap_err();
        assert!(err.to_string().contains("m.py"));
    }

    #[test]
    fn test_git_restorer_outside_repo_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("m.py");
        fs::write(&file, "x = 1\n").unwrap();
        let restorer = GitRestorer::new(GitRepo::open(dir.path()));
        assert!(matches!(
            restorer.restore(&file, "x = 1\n"),
            Err(RestoreError::Command { .. })
        ));
    }

    #[test]
    fn test_strategy_deserializes() {
        let strategy: RestoreStrategy = serde_json::from_str("\"git\"").unwrap();
        assert_eq!(strategy, RestoreStrategy::Git);
        assert_eq!(RestoreStrategy::default(), RestoreStrategy::Write);
    }
}
