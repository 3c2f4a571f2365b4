//! Error types for lazycommit modules using thiserror.

use thiserror::Error;

/// Errors from collecting repository changes.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("No changes to summarize. Stage changes with 'git add' first.")]
    NoChanges,

    #[error("Failed to resolve reference '{0}': {1}")]
    RefNotFound(String, #[source] git2::Error),

    #[error("Repository has no commits yet, nothing to amend")]
    NoCommits,

    #[error("Git operation failed: {0}")]
    Git(#[source] git2::Error),
}

/// Errors from compiling a change set into a prompt.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompileError {
    #[error(
        "Token budget of {budget} is too small: the fixed instructions alone need {required}. Raise --budget."
    )]
    BudgetTooSmall { budget: usize, required: usize },
}

/// Failure to load a BPE tokenizer.
#[derive(Error, Debug)]
#[error("Failed to load tokenizer for model '{model}': {reason}")]
pub struct TokenizerError {
    pub model: String,
    pub reason: String,
}

/// Errors from the chat-completion transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request to the completion API failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Completion API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion stream failed: {0}")]
    Stream(String),

    #[error("Completion API returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<TransportError>),
}

impl TransportError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(e) => e.is_connect() || e.is_timeout(),
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors from applying the generated message to the repository.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("The model returned an empty commit message")]
    EmptyMessage,

    #[error("Failed to run git: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("git commit exited with {}", code.map_or("a signal".to_string(), |c| format!("code {c}")))]
    GitFailed { code: Option<i32> },
}

/// Errors from resolving command-line and environment configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OpenAI API key is not set. Pass --openai-key or set OPENAI_API_KEY.")]
    MissingApiKey,

    #[error("cannot use both [ref] and --amend")]
    RefWithAmend,

    #[error("Token budget must be greater than zero")]
    ZeroBudget,
}
