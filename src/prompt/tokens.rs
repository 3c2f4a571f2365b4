//! Token estimation.
//!
//! The compiler budgets every message piece by piece, so estimators must be
//! subadditive over newline-terminated pieces: for any `a` ending in `\n`,
//! `estimate(a + b) <= estimate(a) + estimate(b)`. Both implementations here
//! satisfy that, and both are monotonic and deterministic.

use tiktoken_rs::CoreBPE;

use crate::error::TokenizerError;

/// Tokens charged per message for role markers and framing.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Tokens charged once per request to prime the reply.
pub const REQUEST_OVERHEAD: usize = 3;

/// Estimates how many tokens a piece of text costs.
pub trait TokenEstimator {
    fn estimate(&self, text: &str) -> usize;

    /// Cost of a whole message carrying `content`.
    fn message_cost(&self, content: &str) -> usize {
        self.estimate(content) + MESSAGE_OVERHEAD
    }
}

/// Conservative character-count heuristic.
///
/// Real tokenizers average 3.5–4 characters per token for English and
/// source code; dividing by 3 over-counts, which keeps requests under the
/// model's limit without loading a tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharEstimator {
    chars_per_token: usize,
}

impl CharEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: usize = 3;

    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// BPE token counts from tiktoken.
///
/// Counts line by line, so a message's estimate is exactly the sum of its
/// line-aligned pieces. Merges across line breaks are rare, so this is at
/// most a few tokens above the real count.
pub struct BpeEstimator {
    bpe: CoreBPE,
}

impl BpeEstimator {
    /// Load the tokenizer for `model`, falling back to cl100k_base (GPT-4
    /// family) for models tiktoken does not know, such as non-OpenAI models
    /// behind a compatible endpoint.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(_) => tiktoken_rs::cl100k_base().map_err(|e| TokenizerError {
                model: model.to_string(),
                reason: e.to_string(),
            })?,
        };
        Ok(Self { bpe })
    }
}

impl TokenEstimator for BpeEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.split_inclusive('\n')
            .map(|line| self.bpe.encode_ordinary(line).len())
            .sum()
    }
}
