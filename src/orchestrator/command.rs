/// Generator backed by an external command, e.g. an editing CLI.
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GenerationError, GenerationRequest, Generator};
use crate::prompt::PromptTemplate;

/// Where the command leaves its candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// The command edits the file; the candidate is read back afterwards.
    #[default]
    InPlace,
    /// The command prints the full rewritten file on stdout.
    Stdout,
}

/// Runs `command` once per attempt in the file's directory.
///
/// The command line is split on whitespace. `{file}` and `{prompt}` are
/// substituted inside each argument; when no argument mentions `{prompt}`
/// the prompt is appended as the final argument.
pub struct CommandGenerator {
    pub command: String,
    pub output: OutputMode,
    pub timeout: Duration,
    pub prompt: PromptTemplate,
}

struct CommandRun {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

impl CommandGenerator {
    pub fn new(command: impl Into<String>, output: OutputMode, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            output,
            timeout,
            prompt: PromptTemplate::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    fn argv(&self, file: &Path, prompt: &str) -> Result<Vec<String>, GenerationError> {
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        let mut argv: Vec<String> = self
            .command
            .split_whitespace()
            .map(|part| part.replace("{file}", &file_name))
            .collect();
        if argv.is_empty() {
            return Err(GenerationError::Misconfigured(
                "generator command is empty".to_string(),
            ));
        }
        if argv.iter().any(|a| a.contains("{prompt}")) {
            for arg in &mut argv {
                *arg = arg.replace("{prompt}", prompt);
            }
        } else {
            argv.push(prompt.to_string());
        }
        Ok(argv)
    }

    fn run(&self, argv: &[String], cwd: &Path) -> Result<CommandRun, GenerationError> {
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    GenerationError::Misconfigured(format!("cannot start `{}`: {e}", argv[0]))
                }
                _ => GenerationError::Transient(format!("cannot start `{}`: {e}", argv[0])),
            })?;

        let stdout = child.stdout.take().map(|s| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = BufReader::new(s).read_to_end(&mut buf);
                buf
            })
        });
        let stderr = child.stderr.take().map(|s| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = BufReader::new(s).read_to_end(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        timed_out = true;
                        let _ = child.kill();
                        break child.wait().ok();
                    }
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(GenerationError::Transient(format!(
                        "failed to wait for generator: {e}"
                    )));
                }
            }
        };

        let collect = |handle: Option<thread::JoinHandle<Vec<u8>>>| {
            handle
                .and_then(|h| h.join().ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
                .unwrap_or_default()
        };

        Ok(CommandRun {
            success: status.is_some_and(|s| s.success()),
            code: status.and_then(|s| s.code()),
            stdout: collect(stdout),
            stderr: collect(stderr),
            timed_out,
        })
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let prompt = self.prompt.render(request.file, request.context);
        let argv = self.argv(request.file, &prompt)?;
        let cwd = match request.file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        info!(file = %request.file.display(), program = %argv[0], "running generator");
        let run = self.run(&argv, cwd)?;

        if run.timed_out {
            return Err(GenerationError::Timeout(self.timeout));
        }
        if !run.success {
            let mut message = match run.code {
                Some(code) => format!("generator exited with code {code}"),
                None => "generator terminated by signal".to_string(),
            };
            let stderr = run.stderr.trim();
            if !stderr.is_empty() {
                message.push_str(": ");
                message.push_str(stderr);
            }
            return Err(GenerationError::Transient(message));
        }
        debug!(stdout_bytes = run.stdout.len(), "generator finished");

        match self.output {
            OutputMode::InPlace => fs::read_to_string(request.file).map_err(|e| {
                GenerationError::Transient(format!(
                    "cannot read {} after generation: {e}",
                    request.file.display()
                ))
            }),
            OutputMode::Stdout if run.stdout.trim().is_empty() => Err(
                GenerationError::Transient("generator printed nothing".to_string()),
            ),
            OutputMode::Stdout => Ok(run.stdout),
        }
    }
}
