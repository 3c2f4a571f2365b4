//! Command-line and environment configuration.

use std::env;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::warn;

use crate::error::{ConfigError, TokenizerError};
use crate::git::Target;
use crate::llm::{DEFAULT_BASE_URL, OpenAiConfig};
use crate::prompt::{BpeEstimator, CharEstimator, CompileOptions, OverflowPolicy, TokenEstimator};

pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_TOKEN_BUDGET: usize = 128_000;

/// HTTP timeout override, in seconds.
pub const TIMEOUT_ENV_VAR: &str = "LAZYCOMMIT_TIMEOUT";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Write a commit message for your staged changes using an LLM.
#[derive(Parser, Debug)]
#[command(name = "lazycommit")]
#[command(about = "Write a commit message for your staged changes using an LLM")]
#[command(version)]
pub struct Cli {
    /// Describe an existing commit instead of the staged changes
    #[arg(value_name = "REF")]
    pub reference: Option<String>,

    /// Model to use
    #[arg(short, long, env = "LAZYCOMMIT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Print the git command instead of committing
    #[arg(short, long)]
    pub dry_run: bool,

    /// Rewrite the message of the HEAD commit, including staged changes
    #[arg(short, long)]
    pub amend: bool,

    /// Extra context for the model (repeatable)
    #[arg(short, long = "context", value_name = "TEXT")]
    pub context: Vec<String>,

    /// Maximum prompt size in tokens
    #[arg(long, env = "LAZYCOMMIT_TOKEN_BUDGET", default_value_t = DEFAULT_TOKEN_BUDGET)]
    pub budget: usize,

    /// What to do with a diff that does not fit the budget
    #[arg(long, value_enum, default_value_t = OverflowArg::Truncate)]
    pub overflow: OverflowArg,

    /// How prompt size is estimated
    #[arg(long, value_enum, default_value_t = EstimatorKind::Bpe)]
    pub estimator: EstimatorKind,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverflowArg {
    /// Keep the leading lines of the diff
    Truncate,
    /// Replace the diff with a placeholder
    Omit,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Truncate => OverflowPolicy::Truncate,
            OverflowArg::Omit => OverflowPolicy::Omit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EstimatorKind {
    /// BPE token counts for the selected model
    Bpe,
    /// Conservative characters-per-token heuristic
    Chars,
}

impl EstimatorKind {
    pub fn build(self, model: &str) -> Result<Box<dyn TokenEstimator>, TokenizerError> {
        Ok(match self {
            EstimatorKind::Bpe => Box::new(BpeEstimator::for_model(model)?),
            EstimatorKind::Chars => Box::new(CharEstimator::default()),
        })
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Target,
    pub model: String,
    pub openai: OpenAiConfig,
    pub compile: CompileOptions,
    pub estimator: EstimatorKind,
    pub stream: bool,
    pub dry_run: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let target = match (cli.reference, cli.amend) {
            (Some(_), true) => return Err(ConfigError::RefWithAmend),
            (Some(reference), false) => Target::Commit(reference),
            (None, true) => Target::Amend,
            (None, false) => Target::WorkingTree,
        };

        if cli.budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }

        let api_key = cli
            .openai_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            target,
            model: cli.model,
            openai: OpenAiConfig {
                api_key,
                base_url: cli.openai_base_url,
                timeout: get_timeout(),
            },
            compile: CompileOptions::new(cli.budget)
                .with_context(cli.context)
                .with_overflow(cli.overflow.into()),
            estimator: cli.estimator,
            stream: !cli.no_stream,
            dry_run: cli.dry_run,
        })
    }
}

/// Get the HTTP timeout duration.
///
/// Reads from LAZYCOMMIT_TIMEOUT if set, otherwise uses the default of 120
/// seconds. Logs a warning if the variable is set but invalid.
fn get_timeout() -> Duration {
    match env::var(TIMEOUT_ENV_VAR) {
        Ok(v) if !v.is_empty() => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                warn!(
                    "Invalid {} value '{}', using default {}s",
                    TIMEOUT_ENV_VAR, v, DEFAULT_TIMEOUT_SECS
                );
                Duration::from_secs(DEFAULT_TIMEOUT_SECS)
            }
        },
        _ => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
    }
}
