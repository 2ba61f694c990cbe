/// Prompt text handed to the external generator.
use crate::orchestrator::GenerationContext;
use std::path::Path;

pub const DEFAULT_TEMPLATE: &str = "\
Based on the diff below, add or improve Google-style docstrings for the \
functions and classes that changed in {file}.

Diff:
```
{diff}
```

Requirements:
1. Only edit {file}, and only the changed functions and classes.
2. Follow Google-style docstring conventions with Args, Returns and Raises sections where they apply.
3. Do not modify signatures, imports, comments or any logic. Only docstrings may change.
4. Leave complete docstrings as they are.
{feedback}";

/// A prompt template with `{file}`, `{diff}`, `{attempt}`, `{max_attempts}`
/// and `{feedback}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Uses the built-in template when `template` is `None` or blank.
    pub fn from_config(template: Option<&str>) -> Self {
        match template {
            Some(t) if !t.trim().is_empty() => Self::new(t),
            _ => Self::default(),
        }
    }

    /// Substitutes placeholders in a single pass, so placeholder-like text
    /// inside the diff or the feedback is left as it is. Unknown `{...}`
    /// sequences are kept verbatim.
    pub fn render(&self, file: &Path, context: &GenerationContext) -> String {
        let mut out = String::with_capacity(self.template.len() + context.context.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let value = tail.find('}').and_then(|close| {
                let value = match &tail[1..close] {
                    "file" => file.display().to_string(),
                    "diff" => context.context.trim_end().to_string(),
                    "attempt" => context.attempt.to_string(),
                    "max_attempts" => context.max_attempts.to_string(),
                    "feedback" => feedback_section(&context.feedback),
                    _ => return None,
                };
                Some((value, close))
            });
            match value {
                Some((value, close)) => {
                    out.push_str(&value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Earlier rejections, so the next attempt knows what to avoid.
fn feedback_section(feedback: &[String]) -> String {
    if feedback.is_empty() {
        return String::new();
    }
    let mut section = String::from("\nEarlier attempts failed:\n");
    for (i, reason) in feedback.iter().enumerate() {
        section.push_str(&format!("- attempt {}: {}\n", i + 1, reason));
    }
    section.push_str("Change nothing except docstrings.\n");
    section
}
