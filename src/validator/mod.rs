/// Structural validator: decides whether a rewritten Python file differs from
/// its original only in docstrings.
pub mod compare;
pub mod compile;
pub mod kinds;
pub mod signature;

use serde::Serialize;
use thiserror::Error;
use tree_sitter::{Parser, Tree};

pub use compare::{DocChange, DocChangeKind, ScopeKind};
pub use signature::StructuralSignature;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("original source does not compile: {reason} at line {line}, column {column}")]
    MalformedOriginal {
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("failed to load python grammar: {0}")]
    Grammar(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Equivalent,
    StructureChanged,
    SyntaxError,
    UnsupportedConstruct,
}

/// Result of comparing one original against one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub passed: bool,
    pub status: VerdictStatus,
    /// Empty when `passed`.
    pub divergence: String,
    pub doc_changes: Vec<DocChange>,
}

impl ValidationVerdict {
    fn equivalent(doc_changes: Vec<DocChange>) -> Self {
        Self {
            passed: true,
            status: VerdictStatus::Equivalent,
            divergence: String::new(),
            doc_changes,
        }
    }

    fn rejected(status: VerdictStatus, divergence: impl Into<String>) -> Self {
        Self {
            passed: false,
            status,
            divergence: divergence.into(),
            doc_changes: Vec::new(),
        }
    }
}

/// Seam used by the orchestrator so tests can substitute verdicts.
pub trait Validator: Send + Sync {
    fn validate(
        &self,
        original: &str,
        candidate: &str,
    ) -> Result<ValidationVerdict, ValidationError>;

    /// Fails when `original` cannot serve as a baseline at all.
    fn check_original(&self, original: &str) -> Result<(), ValidationError> {
        self.validate(original, original).map(|_| ())
    }
}

/// The tree-sitter backed validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn validate(
        &self,
        original: &str,
        candidate: &str,
    ) -> Result<ValidationVerdict, ValidationError> {
        validate(original, candidate)
    }

    fn check_original(&self, original: &str) -> Result<(), ValidationError> {
        check_original(original).map(|_| ())
    }
}

pub fn parse_python(source: &str) -> Result<Tree, ValidationError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ValidationError::Grammar(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ValidationError::Grammar("parser returned no tree".to_string()))
}

/// Parse `original` and make sure the Python compiler would accept it.
pub fn check_original(original: &str) -> Result<Tree, ValidationError> {
    let tree = parse_python(original)?;
    if let Some((line, column)) = signature::first_syntax_error(&tree) {
        return Err(ValidationError::MalformedOriginal {
            line,
            column,
            reason: "syntax error".to_string(),
        });
    }
    if let Some(err) = compile::first_compile_error(&tree, original) {
        return Err(ValidationError::MalformedOriginal {
            line: err.line,
            column: err.column,
            reason: err.message,
        });
    }
    Ok(tree)
}

/// Compare `original` and `candidate`.
///
/// A candidate that does not parse or compile, or that uses a construct
/// outside the known kind set, yields a failing verdict. Only a broken
/// original (or a grammar that cannot be loaded) is an error.
pub fn validate(original: &str, candidate: &str) -> Result<ValidationVerdict, ValidationError> {
    let original_tree = check_original(original)?;
    let original_sig = match signature::build(&original_tree, original) {
        Ok(sig) => sig,
        Err(e) => {
            // Nothing the candidate does can make this file comparable.
            tracing::warn!("original not comparable: {}", e);
            return Ok(ValidationVerdict::rejected(
                VerdictStatus::UnsupportedConstruct,
                format!("original: {e}"),
            ));
        }
    };

    let candidate_tree = parse_python(candidate)?;
    if let Some((line, column)) = signature::first_syntax_error(&candidate_tree) {
        return Ok(ValidationVerdict::rejected(
            VerdictStatus::SyntaxError,
            format!("candidate does not parse: syntax error at line {line}, column {column}"),
        ));
    }
    if let Some(err) = compile::first_compile_error(&candidate_tree, candidate) {
        return Ok(ValidationVerdict::rejected(
            VerdictStatus::SyntaxError,
            format!("candidate does not compile: {err}"),
        ));
    }
    let candidate_sig = match signature::build(&candidate_tree, candidate) {
        Ok(sig) => sig,
        Err(e) => {
            return Ok(ValidationVerdict::rejected(
                VerdictStatus::UnsupportedConstruct,
                format!("candidate: {e}"),
            ));
        }
    };

    match compare::compare(&original_sig, &candidate_sig) {
        Ok(()) => Ok(ValidationVerdict::equivalent(compare::doc_changes(
            &original_sig,
            &candidate_sig,
        ))),
        Err(divergence) => {
            tracing::debug!(%divergence, "structure changed");
            Ok(ValidationVerdict::rejected(
                VerdictStatus::StructureChanged,
                divergence.to_string(),
            ))
        }
    }
}
