/// Retry orchestrator: drives generation attempts for one file, validates
/// each candidate and restores the baseline between failed attempts.
pub mod command;
pub mod mock;
pub mod restore;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::validator::{DocChange, ValidationVerdict, Validator};

/// Errors a generator can report for one attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation failed: {0}")]
    Transient(String),

    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("generator misconfigured: {0}")]
    Misconfigured(String),
}

impl GenerationError {
    /// Whether another attempt can succeed.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, GenerationError::Misconfigured(_))
    }
}

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("restore command failed for {path}: {detail}")]
    Command { path: PathBuf, detail: String },
}

/// What the generator is told about the attempt it is making.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    /// 1-based.
    pub attempt: usize,
    pub max_attempts: usize,
    /// Driver supplied, e.g. the file's diff against the base ref.
    pub context: String,
    /// Failure reasons of earlier attempts, oldest first.
    pub feedback: Vec<String>,
}

pub struct GenerationRequest<'a> {
    pub file: &'a Path,
    pub baseline: &'a str,
    pub context: &'a GenerationContext,
}

/// Produces a candidate rewrite of a file.
///
/// Implementations may write the candidate to disk themselves; the
/// orchestrator restores the baseline whenever a candidate is rejected.
pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// Puts a file back to its baseline content.
pub trait Restorer: Send + Sync {
    fn restore(&self, file: &Path, baseline: &str) -> Result<(), RestoreError>;
}

/// One generation attempt.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub index: usize,
    #[serde(skip)]
    pub candidate: Option<String>,
    pub verdict: Option<ValidationVerdict>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    ExhaustedRetries,
    HardError,
}

/// Terminal result of processing one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub file: PathBuf,
    pub status: OutcomeStatus,
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip)]
    pub accepted_source: Option<String>,
    pub error: Option<String>,
    /// Accepted source differs from the baseline.
    pub changes_made: bool,
}

impl ProcessingOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    pub fn changes_made(&self) -> bool {
        self.changes_made
    }

    pub fn retries(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }

    /// Docstring changes of the accepted attempt.
    pub fn doc_changes(&self) -> &[DocChange] {
        if !self.succeeded() {
            return &[];
        }
        self.attempts
            .last()
            .and_then(|a| a.verdict.as_ref())
            .map(|v| v.doc_changes.as_slice())
            .unwrap_or(&[])
    }

    pub fn validation_failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.verdict.as_ref().is_some_and(|v| !v.passed))
            .count()
    }

    pub fn generation_failures(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.verdict.is_none() && a.error.is_some())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

enum State {
    Idle,
    Attempting {
        attempt: usize,
    },
    Validating {
        attempt: usize,
        candidate: String,
        started: Instant,
    },
    Restoring {
        record: AttemptRecord,
    },
    Accepted {
        candidate: String,
    },
    Exhausted,
    HardError(String),
}

pub struct Orchestrator<'a, G, V, R>
where
    G: Generator + ?Sized,
    V: Validator + ?Sized,
    R: Restorer + ?Sized,
{
    pub generator: &'a G,
    pub validator: &'a V,
    pub restorer: &'a R,
    pub policy: RetryPolicy,
}

impl<'a, G, V, R> Orchestrator<'a, G, V, R>
where
    G: Generator + ?Sized,
    V: Validator + ?Sized,
    R: Restorer + ?Sized,
{
    pub fn new(generator: &'a G, validator: &'a V, restorer: &'a R, policy: RetryPolicy) -> Self {
        Self {
            generator,
            validator,
            restorer,
            policy,
        }
    }

    /// Run attempts for `file` until a candidate is accepted, the attempt
    /// bound is reached, or a hard error occurs. `context` is handed to the
    /// generator unchanged on every attempt.
    pub fn process(&self, file: &Path, context: &str) -> ProcessingOutcome {
        let max_attempts = self.policy.max_attempts;
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut feedback: Vec<String> = Vec::new();
        let mut baseline = String::new();
        let mut state = State::Idle;

        loop {
            state = match state {
                State::Idle => {
                    if max_attempts == 0 {
                        State::HardError("max_attempts must be at least 1".to_string())
                    } else {
                        match fs::read_to_string(file) {
                            Ok(text) => {
                                baseline = text;
                                match self.validator.check_original(&baseline) {
                                    Ok(()) => State::Attempting { attempt: 1 },
                                    Err(e) => State::HardError(e.to_string()),
                                }
                            }
                            Err(e) => State::HardError(format!(
                                "cannot read {}: {e}",
                                file.display()
                            )),
                        }
                    }
                }

                State::Attempting { attempt } => {
                    info!(file = %file.display(), attempt, max_attempts, "generating");
                    let started = Instant::now();
                    let generation_context = GenerationContext {
                        attempt,
                        max_attempts,
                        context: context.to_string(),
                        feedback: feedback.clone(),
                    };
                    let request = GenerationRequest {
                        file,
                        baseline: &baseline,
                        context: &generation_context,
                    };
                    match self.generator.generate(&request) {
                        Ok(candidate) => State::Validating {
                            attempt,
                            candidate,
                            started,
                        },
                        Err(e) => {
                            let record = AttemptRecord {
                                index: attempt,
                                candidate: None,
                                verdict: None,
                                error: Some(e.to_string()),
                                elapsed_ms: elapsed_ms(started),
                            };
                            if e.is_retriable() {
                                warn!(file = %file.display(), attempt, error = %e, "generation failed");
                                feedback.push(e.to_string());
                                State::Restoring { record }
                            } else {
                                attempts.push(record);
                                self.restore_best_effort(file, &baseline);
                                State::HardError(e.to_string())
                            }
                        }
                    }
                }

                State::Validating {
                    attempt,
                    candidate,
                    started,
                } => match self.validator.validate(&baseline, &candidate) {
                    Ok(verdict) if verdict.passed => {
                        info!(
                            file = %file.display(),
                            attempt,
                            doc_changes = verdict.doc_changes.len(),
                            "candidate accepted"
                        );
                        attempts.push(AttemptRecord {
                            index: attempt,
                            candidate: Some(candidate.clone()),
                            verdict: Some(verdict),
                            error: None,
                            elapsed_ms: elapsed_ms(started),
                        });
                        State::Accepted { candidate }
                    }
                    Ok(verdict) => {
                        warn!(
                            file = %file.display(),
                            attempt,
                            divergence = %verdict.divergence,
                            "candidate rejected"
                        );
                        feedback.push(verdict.divergence.clone());
                        State::Restoring {
                            record: AttemptRecord {
                                index: attempt,
                                error: Some(verdict.divergence.clone()),
                                candidate: Some(candidate),
                                verdict: Some(verdict),
                                elapsed_ms: elapsed_ms(started),
                            },
                        }
                    }
                    Err(e) => {
                        attempts.push(AttemptRecord {
                            index: attempt,
                            candidate: Some(candidate),
                            verdict: None,
                            error: Some(e.to_string()),
                            elapsed_ms: elapsed_ms(started),
                        });
                        self.restore_best_effort(file, &baseline);
                        State::HardError(e.to_string())
                    }
                },

                State::Restoring { record } => {
                    let attempt = record.index;
                    attempts.push(record);
                    match self.restore_verified(file, &baseline) {
                        Err(detail) => State::HardError(detail),
                        Ok(()) if attempt < max_attempts => {
                            if !self.policy.retry_delay.is_zero() {
                                debug!(delay_ms = self.policy.retry_delay.as_millis() as u64, "waiting before retry");
                                std::thread::sleep(self.policy.retry_delay);
                            }
                            State::Attempting {
                                attempt: attempt + 1,
                            }
                        }
                        Ok(()) => State::Exhausted,
                    }
                }

                State::Accepted { candidate } => {
                    return ProcessingOutcome {
                        file: file.to_path_buf(),
                        status: OutcomeStatus::Succeeded,
                        changes_made: candidate != baseline,
                        attempts,
                        accepted_source: Some(candidate),
                        error: None,
                    };
                }

                State::Exhausted => {
                    warn!(file = %file.display(), attempts = attempts.len(), "retries exhausted");
                    return ProcessingOutcome {
                        file: file.to_path_buf(),
                        status: OutcomeStatus::ExhaustedRetries,
                        attempts,
                        accepted_source: None,
                        error: None,
                        changes_made: false,
                    };
                }

                State::HardError(detail) => {
                    tracing::error!(file = %file.display(), error = %detail, "hard error");
                    return ProcessingOutcome {
                        file: file.to_path_buf(),
                        status: OutcomeStatus::HardError,
                        attempts,
                        accepted_source: None,
                        error: Some(detail),
                        changes_made: false,
                    };
                }
            };
        }
    }

    /// Restore and confirm by re-reading that the file holds the baseline.
    fn restore_verified(&self, file: &Path, baseline: &str) -> Result<(), String> {
        self.restorer
            .restore(file, baseline)
            .map_err(|e| e.to_string())?;
        match fs::read_to_string(file) {
            Ok(text) if text == baseline => Ok(()),
            Ok(_) => Err(format!(
                "restore of {} did not reproduce the original content",
                file.display()
            )),
            Err(e) => Err(format!(
                "cannot re-read {} after restore: {e}",
                file.display()
            )),
        }
    }

    fn restore_best_effort(&self, file: &Path, baseline: &str) {
        if let Err(e) = self.restore_verified(file, baseline) {
            warn!(file = %file.display(), error = %e, "restore before hard error failed");
        }
    }
}

/// Process one file with no retry delay and no driver context.
pub fn process<G, V, R>(
    file: &Path,
    generator: &G,
    validator: &V,
    restorer: &R,
    max_attempts: usize,
) -> ProcessingOutcome
where
    G: Generator + ?Sized,
    V: Validator + ?Sized,
    R: Restorer + ?Sized,
{
    let policy = RetryPolicy {
        max_attempts,
        retry_delay: Duration::ZERO,
    };
    Orchestrator::new(generator, validator, restorer, policy).process(file, "")
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
