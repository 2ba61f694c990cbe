/// Git plumbing. Index, commit and history work goes through libgit2;
/// diffs, listings and restores shell out to the `git` binary.
use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{Repository, Signature, Sort};
use thiserror::Error;
use tracing::{debug, info};

pub const SKIP_CI_TRAILER: &str = "[skip ci] Auto-generated by docguard";

#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to execute git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("git: {0}")]
    Repository(#[from] git2::Error),
}

/// Author identity applied to commits made by the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// A working tree rooted at `root`. Paths passed in are relative to the
/// root or absolute.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    identity: Option<Identity>,
}

impl GitRepo {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository(&self) -> Result<Repository, GitError> {
        Ok(Repository::discover(&self.root)?)
    }

    /// `file` relative to the repository's working directory, as the index
    /// stores it.
    fn index_path(&self, repo: &Repository, file: &Path) -> PathBuf {
        let absolute = self.root.join(file);
        let relative = repo.workdir().and_then(|workdir| {
            let workdir = workdir.canonicalize().ok()?;
            let absolute = absolute.canonicalize().ok()?;
            absolute.strip_prefix(&workdir).ok().map(Path::to_path_buf)
        });
        relative.unwrap_or_else(|| file.to_path_buf())
    }

    /// The configured identity, else `user.name`/`user.email` from the
    /// repository config.
    fn signature(&self, repo: &Repository) -> Result<Signature<'static>, GitError> {
        if let Some(id) = &self.identity {
            return Ok(Signature::now(&id.name, &id.email)?);
        }
        let config = repo.config()?;
        let name = config
            .get_string("user.name")
            .unwrap_or_else(|_| "docguard".to_string());
        let email = config
            .get_string("user.email")
            .unwrap_or_else(|_| "docguard@localhost".to_string());
        Ok(Signature::now(&name, &email)?)
    }

    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let command = args.join(" ");
        debug!(%command, "git");
        let output = Command::new("git")
            .current_dir(&self.root)
            .args(args)
            .output()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(GitError::Failed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Most recent commit whose `Name <email>` author line contains `author`.
    pub fn last_commit_by(&self, author: &str) -> Result<Option<String>, GitError> {
        let repo = self.repository()?;
        let mut walk = repo.revwalk()?;
        walk.set_sorting(Sort::TIME)?;
        walk.push_head()?;
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            let who = commit.author();
            let line = format!(
                "{} <{}>",
                who.name().unwrap_or_default(),
                who.email().unwrap_or_default()
            );
            if line.contains(author) {
                return Ok(Some(commit.id().to_string()));
            }
        }
        Ok(None)
    }

    /// Explicit base if given, otherwise the last commit made by `bot_author`.
    pub fn resolve_base(&self, explicit: Option<&str>, bot_author: &str) -> Option<String> {
        if let Some(base) = explicit.filter(|b| !b.trim().is_empty()) {
            return Some(base.to_string());
        }
        match self.last_commit_by(bot_author) {
            Ok(found) => found,
            Err(e) => {
                debug!("no previous commit by {bot_author}: {e}");
                None
            }
        }
    }

    /// Python files changed between `base` and HEAD, or every tracked Python
    /// file when there is no base. Deleted files are left out.
    pub fn changed_python_files(&self, base: Option<&str>) -> Result<Vec<PathBuf>, GitError> {
        let listing = match base {
            Some(base) => self.run(&["diff", "--name-only", base, "HEAD"])?,
            None => self.run(&["ls-files", "*.py"])?,
        };
        let files: Vec<PathBuf> = listing
            .lines()
            .map(str::trim)
            .filter(|line| line.ends_with(".py"))
            .map(PathBuf::from)
            .filter(|path| self.root.join(path).is_file())
            .collect();
        info!(count = files.len(), base = base.unwrap_or("<all>"), "changed python files");
        Ok(files)
    }

    /// Diff of `file` since `base`, falling back to the whole history and
    /// then to the file shown as newly added.
    pub fn file_diff(&self, base: Option<&str>, file: &Path) -> Result<String, GitError> {
        let path = file.to_string_lossy();
        if let Some(base) = base {
            return self.run(&["diff", base, "HEAD", "--", &path]);
        }
        let first = self
            .run(&["rev-list", "--max-parents=0", "HEAD"])
            .map(|out| out.lines().next().unwrap_or_default().trim().to_string());
        if let Ok(first) = first.as_deref() {
            if !first.is_empty() {
                if let Ok(diff) = self.run(&["diff", first, "HEAD", "--", &path]) {
                    if !diff.trim().is_empty() {
                        return Ok(diff);
                    }
                }
            }
        }
        let shown = self.run(&["show", &format!("HEAD:{path}")])?;
        let mut diff = format!("--- /dev/null\n+++ b/{path}\n");
        for line in shown.lines() {
            diff.push('+');
            diff.push_str(line);
            diff.push('\n');
        }
        Ok(diff)
    }

    pub fn stage(&self, file: &Path) -> Result<(), GitError> {
        let repo = self.repository()?;
        let mut index = repo.index()?;
        index.add_path(&self.index_path(&repo, file))?;
        index.write()?;
        info!(file = %file.display(), "staged");
        Ok(())
    }

    /// Check out the index version of `file` over the working tree.
    pub fn restore(&self, file: &Path) -> Result<(), GitError> {
        self.run(&["restore", "--", &file.to_string_lossy()])?;
        Ok(())
    }

    /// Whether the index differs from HEAD (or is non-empty on an unborn
    /// branch).
    pub fn has_staged_changes(&self) -> Result<bool, GitError> {
        let repo = self.repository()?;
        let head = repo.head().ok().and_then(|h| h.peel_to_tree().ok());
        let diff = repo.diff_tree_to_index(head.as_ref(), None, None)?;
        Ok(diff.deltas().len() > 0)
    }

    /// Commit the index with `message` plus the skip-ci trailer. Returns the
    /// new commit id.
    pub fn commit(&self, message: &str) -> Result<String, GitError> {
        let repo = self.repository()?;
        let mut index = repo.index()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let signature = self.signature(&repo)?;

        let full = format!("{}\n\n{SKIP_CI_TRAILER}\n", message.trim_end());
        let oid = repo.commit(Some("HEAD"), &signature, &signature, &full, &tree, &parents)?;
        info!(commit = %oid, "commit created");
        Ok(oid.to_string())
    }
}
