//! # docguard: docstring-only change gate
//!
//! Lets an external tool rewrite the docstrings of Python files, and proves
//! every rewrite changed nothing but docstrings before it is kept.
//!
//! ## Architecture
//!
//! - **[`validator`]**: Tree-sitter structural comparison with docstrings stripped
//! - **[`orchestrator`]**: Per-file retry state machine, generators and restorers
//! - **[`runner`]**: Parallel processing of many files, staging and commit
//! - **[`config`]**: Configuration loading, validation, and pattern expansion
//! - **[`git`]**: Changed-file discovery and diffs via `git`, staging and commits via libgit2
//! - **[`prompt`]**: Prompt template for the generator
//! - **[`report`]**: Run statistics, commit message, GitHub outputs, JSON report

pub mod config;
pub mod git;
pub mod orchestrator;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod validator;
