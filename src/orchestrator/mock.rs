/// Deterministic collaborators for exercising the orchestrator without an
/// external generator.
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    GenerationContext, GenerationError, GenerationRequest, Generator, RestoreError, Restorer,
};

/// One scripted generator response.
#[derive(Debug, Clone)]
pub enum Step {
    Candidate(String),
    Fail(GenerationError),
}

impl Step {
    pub fn candidate(source: &str) -> Self {
        Step::Candidate(source.to_string())
    }

    pub fn fail(error: GenerationError) -> Self {
        Step::Fail(error)
    }
}

/// Replays a fixed list of steps, one per call.
///
/// Records the file content seen at the start of every call and the context
/// it was given, so tests can check what each attempt started from.
pub struct ScriptedGenerator {
    steps: Mutex<VecDeque<Step>>,
    write_in_place: bool,
    observed: Mutex<Vec<String>>,
    contexts: Mutex<Vec<GenerationContext>>,
}

impl ScriptedGenerator {
    /// Candidates are returned without touching the file.
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            write_in_place: false,
            observed: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Candidates are also written over the file, like an editing tool would.
    pub fn in_place(steps: Vec<Step>) -> Self {
        Self {
            write_in_place: true,
            ..Self::new(steps)
        }
    }

    pub fn observed(&self) -> Vec<String> {
        self.observed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn contexts(&self) -> Vec<GenerationContext> {
        self.contexts.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let current = fs::read_to_string(request.file)
            .map_err(|e| GenerationError::Transient(e.to_string()))?;
        if let Ok(mut observed) = self.observed.lock() {
            observed.push(current);
        }
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(request.context.clone());
        }

        let step = self
            .steps
            .lock()
            .ok()
            .and_then(|mut steps| steps.pop_front());
        match step {
            Some(Step::Candidate(source)) => {
                if self.write_in_place {
                    fs::write(request.file, &source)
                        .map_err(|e| GenerationError::Transient(e.to_string()))?;
                }
                Ok(source)
            }
            Some(Step::Fail(error)) => Err(error),
            None => Err(GenerationError::Transient("script exhausted".to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreBehavior {
    /// Write the baseline back.
    Write,
    /// Report an error.
    Fail,
    /// Claim success without touching the file.
    Skip,
}

/// Restorer with a chosen behavior that counts its calls.
pub struct MemoryRestorer {
    behavior: RestoreBehavior,
    calls: AtomicUsize,
}

impl MemoryRestorer {
    pub fn new(behavior: RestoreBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Restorer for MemoryRestorer {
    fn restore(&self, file: &Path, baseline: &str) -> Result<(), RestoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            RestoreBehavior::Write => fs::write(file, baseline).map_err(|source| RestoreError::Io {
                path: file.to_path_buf(),
                source,
            }),
            RestoreBehavior::Fail => Err(RestoreError::Command {
                path: file.to_path_buf(),
                detail: "restore disabled".to_string(),
            }),
            RestoreBehavior::Skip => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_scripted_generator_replays_in_order() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "x = 1\n").unwrap();
        let generator = ScriptedGenerator::new(vec![
            Step::candidate("a"),
            Step::fail(GenerationError::Timeout(std::time::Duration::from_secs(1))),
        ]);
        let context = GenerationContext::default();
        let request = GenerationRequest {
            file: file.path(),
            baseline: "x = 1\n",
            context: &context,
        };

        assert_eq!(generator.generate(&request).unwrap(), "a");
        assert!(matches!(
            generator.generate(&request),
            Err(GenerationError::Timeout(_))
        ));
        assert!(generator.generate(&request).is_err());
        assert_eq!(generator.observed().len(), 3);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_memory_restorer_counts_calls() {
        let file = NamedTempFile::new().unwrap();
        let restorer = MemoryRestorer::new(RestoreBehavior::Write);
        restorer.restore(file.path(), "base").unwrap();
        assert_eq!(restorer.calls(), 1);
        assert_eq!(fs::read_to_string(file.path()).unwrap(), "base");

        let failing = MemoryRestorer::new(RestoreBehavior::Fail);
        assert!(failing.restore(file.path(), "base").is_err());
    }
}
