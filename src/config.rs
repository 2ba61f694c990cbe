/// Configuration module for docguard.
///
/// Handles loading, validating, and providing default configuration values,
/// plus expansion of file patterns into the Python files to process.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::git::Identity;
use crate::orchestrator::RetryPolicy;
use crate::orchestrator::command::OutputMode;
use crate::orchestrator::restore::RestoreStrategy;

pub const DEFAULT_CONFIG_PATH: &str = "docguard.json";

// ── Default value functions ──────────────────────────────────────────

fn default_file_patterns() -> Vec<String> {
    vec!["./".to_string()]
}

fn default_max_attempts() -> usize {
    4
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_jobs() -> usize {
    1
}

/// Non-interactive print mode, limited to reading and editing files.
fn default_command() -> String {
    "claude -p {prompt} --allowedTools Edit Read".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_bot_author() -> String {
    "github-actions[bot]".to_string()
}

fn default_commit_message() -> String {
    "docs: auto-update docstrings".to_string()
}

fn default_true() -> bool {
    true
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Directories or globs; used when no files are named and git discovery
    /// is off.
    #[serde(default = "default_file_patterns")]
    pub file_patterns: Vec<String>,

    /// Total attempts per file, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub restore: RestoreStrategy,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub git: GitConfig,

    /// File that receives `key=value` lines (GitHub Actions `$GITHUB_OUTPUT`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_output: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeneratorConfig {
    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default)]
    pub output: OutputMode,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitConfig {
    /// Discover changed files with git instead of `file_patterns`.
    #[serde(default = "default_true")]
    pub discover: bool,

    /// Base ref for discovery and diffs. Defaults to the last commit by
    /// `bot_author`, then to the whole history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_base: Option<String>,

    #[serde(default = "default_bot_author")]
    pub bot_author: String,

    #[serde(default)]
    pub commit: bool,

    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            file_patterns: default_file_patterns(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            jobs: default_jobs(),
            restore: RestoreStrategy::default(),
            generator: GeneratorConfig::default(),
            git: GitConfig::default(),
            github_output: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            output: OutputMode::default(),
            timeout_secs: default_timeout_secs(),
            prompt_template: None,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            discover: default_true(),
            diff_base: None,
            bot_author: default_bot_author(),
            commit: false,
            commit_message: default_commit_message(),
            author_name: None,
            author_email: None,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `docguard.json`. If the file
    /// does not exist, returns a default config and, for the default path,
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let mut cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");

        if cfg.file_patterns.is_empty() {
            cfg.file_patterns = default_file_patterns();
        }

        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Apply `DOCGUARD_*` overrides from `lookup` (normally the process
    /// environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(command) = lookup("DOCGUARD_GENERATOR_COMMAND") {
            self.generator.command = command;
        }
        if let Some(v) = lookup("DOCGUARD_MAX_ATTEMPTS") {
            self.max_attempts = v
                .trim()
                .parse()
                .with_context(|| format!("DOCGUARD_MAX_ATTEMPTS is not a number: {v}"))?;
        }
        if let Some(v) = lookup("DOCGUARD_RETRY_DELAY_MS") {
            self.retry_delay_ms = v
                .trim()
                .parse()
                .with_context(|| format!("DOCGUARD_RETRY_DELAY_MS is not a number: {v}"))?;
        }
        if let Some(v) = lookup("DOCGUARD_JOBS") {
            self.jobs = v
                .trim()
                .parse()
                .with_context(|| format!("DOCGUARD_JOBS is not a number: {v}"))?;
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_attempts > 0, "max_attempts must be positive");
        anyhow::ensure!(self.jobs > 0, "jobs must be positive");
        anyhow::ensure!(
            !self.generator.command.trim().is_empty(),
            "generator.command must not be empty"
        );
        anyhow::ensure!(
            self.generator.timeout_secs > 0,
            "generator.timeout_secs must be positive"
        );
        anyhow::ensure!(
            !self.file_patterns.is_empty(),
            "at least one file pattern must be specified"
        );
        anyhow::ensure!(
            self.git.author_name.is_some() == self.git.author_email.is_some(),
            "git.author_name and git.author_email must be set together"
        );
        Ok(())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    #[must_use]
    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator.timeout_secs)
    }

    #[must_use]
    pub fn commit_identity(&self) -> Option<Identity> {
        match (&self.git.author_name, &self.git.author_email) {
            (Some(name), Some(email)) => Some(Identity {
                name: name.clone(),
                email: email.clone(),
            }),
            _ => None,
        }
    }

    /// Expand all file patterns and return matching `.py` files, sorted.
    pub fn get_python_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();

        for pattern in &self.file_patterns {
            match expand_pattern(pattern) {
                Ok(matches) => files.extend(matches),
                Err(e) => {
                    warn!("Failed to expand pattern {pattern}: {e}");
                }
            }
        }

        Ok(files.into_iter().collect())
    }
}

// ── Pattern helpers ──────────────────────────────────────────────────

fn is_python(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("py")
}

/// Expand a single pattern to matching Python files.
fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    // No wildcards: a file or a directory
    if !pattern.contains('*') && !pattern.contains('?') {
        let path = Path::new(pattern);
        if path.is_file() {
            return Ok(if is_python(path) {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            });
        }
        return walk_dir_for_py(path);
    }

    if pattern.contains("**") {
        return expand_double_star(pattern);
    }

    let matches = glob::glob(pattern).context("invalid glob pattern")?;
    let mut files = Vec::new();
    for entry in matches.flatten() {
        if entry.is_file() && is_python(&entry) {
            files.push(entry);
        }
    }
    Ok(files)
}

/// Walk a directory recursively, collecting `.py` files. Respects
/// `.gitignore` and skips hidden directories.
fn walk_dir_for_py(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in WalkBuilder::new(dir).build().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && is_python(path) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

/// Expand patterns containing `**`.
fn expand_double_star(pattern: &str) -> Result<Vec<PathBuf>> {
    let parts: Vec<&str> = pattern.splitn(2, "**").collect();
    if parts.len() != 2 {
        anyhow::bail!("invalid ** pattern: {pattern}");
    }

    let mut base_dir = parts[0].to_string();
    let suffix = parts[1].trim_start_matches(['/', '\\']);

    if base_dir.is_empty() {
        base_dir = ".".to_string();
    } else {
        base_dir = base_dir.trim_end_matches(['/', '\\']).to_string();
    }

    let suffix_pattern = if suffix.is_empty() {
        None
    } else {
        Some(glob::Pattern::new(suffix).context("invalid glob pattern")?)
    };

    let files = walk_dir_for_py(Path::new(&base_dir))?
        .into_iter()
        .filter(|path| match &suffix_pattern {
            None => true,
            Some(p) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| p.matches(name)),
        })
        .collect();

    Ok(files)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.restore, RestoreStrategy::Write);
        assert_eq!(
            config.generator.command,
            "claude -p {prompt} --allowedTools Edit Read"
        );
        assert_eq!(config.generator.output, OutputMode::InPlace);
        assert_eq!(config.generator.timeout_secs, 120);
        assert!(config.git.discover);
        assert!(!config.git.commit);
        assert_eq!(config.git.bot_author, "github-actions[bot]");
    }

    #[test]
    fn test_default_command_passes_prompt_to_print_flag() {
        let config = Config::default();
        let argv: Vec<&str> = config.generator.command.split_whitespace().collect();
        let flag = argv.iter().position(|a| *a == "-p").expect("print flag");
        assert_eq!(argv.get(flag + 1), Some(&"{prompt}"));
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"max_attempts": 2, "generator": {"command": "gen", "output": "stdout"}, "restore": "git"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.generator.command, "gen");
        assert_eq!(config.generator.output, OutputMode::Stdout);
        assert_eq!(config.restore, RestoreStrategy::Git);
        // Other fields should have defaults
        assert_eq!(config.jobs, 1);
        assert_eq!(config.generator.timeout_secs, 120);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
        // Templates are only generated for the default path
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docguard.json");
        let mut config = Config::default();
        config.jobs = 3;
        config.git.diff_base = Some("origin/main".to_string());
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DOCGUARD_GENERATOR_COMMAND", "my-gen --fast"),
            ("DOCGUARD_MAX_ATTEMPTS", "7"),
            ("DOCGUARD_JOBS", " 2 "),
        ]);
        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.generator.command, "my-gen --fast");
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.jobs, 2);
        assert_eq!(config.retry_delay_ms, 1000);

        let bad = |key: &str| (key == "DOCGUARD_RETRY_DELAY_MS").then(|| "soon".to_string());
        assert!(config.apply_env(bad).is_err());
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_half_identity() {
        let mut config = Config::default();
        config.git.author_name = Some("bot".to_string());
        assert!(config.validate().is_err());
        config.git.author_email = Some("bot@example.com".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.commit_identity().unwrap().name, "bot");
    }

    #[test]
    fn test_retry_policy() {
        let mut config = Config::default();
        config.retry_delay_ms = 250;
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_get_python_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg/sub")).unwrap();
        fs::write(root.join("top.py"), "").unwrap();
        fs::write(root.join("pkg/a.py"), "").unwrap();
        fs::write(root.join("pkg/sub/b.py"), "").unwrap();
        fs::write(root.join("pkg/readme.md"), "").unwrap();

        let mut config = Config::default();
        config.file_patterns = vec![root.join("pkg").display().to_string()];
        let files = config.get_python_files().unwrap();
        assert_eq!(files, vec![root.join("pkg/a.py"), root.join("pkg/sub/b.py")]);

        config.file_patterns = vec![
            format!("{}/**/b.py", root.display()),
            format!("{}/*.py", root.display()),
            root.join("top.py").display().to_string(),
        ];
        let files = config.get_python_files().unwrap();
        assert_eq!(files, vec![root.join("pkg/sub/b.py"), root.join("top.py")]);
    }
}
