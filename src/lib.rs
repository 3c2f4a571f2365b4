//! lazycommit - A CLI tool that writes commit messages from git diffs using an LLM.
//!
//! # Overview
//!
//! lazycommit collects the staged changes (or an existing commit) with git2,
//! compiles them into a chat prompt that fits a token budget, streams a
//! commit message from an OpenAI-compatible API and hands it to `git commit`.

pub mod config;
pub mod error;
pub mod git;
pub mod llm;
pub mod logging;
pub mod prompt;

// Re-export commonly used types
pub use config::{Cli, Config, EstimatorKind};
pub use error::{ApplyError, CollectError, CompileError, ConfigError, TokenizerError, TransportError};
pub use git::{ChangeSet, CommitCommand, FileChange, Target, collect_changes};
pub use prompt::{CompileOptions, CompiledPrompt, OverflowPolicy, TokenEstimator, compile};
