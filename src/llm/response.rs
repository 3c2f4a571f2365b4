//! Post-processing of model replies.
//!
//! Models sometimes wrap the commit message in a markdown code block even
//! when told not to.

use crate::error::ApplyError;

/// Strip a surrounding code fence and whitespace from a model reply.
///
/// Handles ` ``` ` and ` ```lang ` openers. Fences that do not enclose the
/// whole reply are left alone, since a commit body may legitimately quote
/// code.
pub fn clean_message(reply: &str) -> Result<String, ApplyError> {
    let trimmed = reply.trim();

    let message = strip_fence(trimmed).unwrap_or(trimmed).trim();
    if message.is_empty() {
        return Err(ApplyError::EmptyMessage);
    }

    Ok(message.to_string())
}

fn strip_fence(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("```")?.strip_suffix("```")?;

    // Opening line may carry a language tag
    let (tag, body) = inner.split_once('\n').unwrap_or(("", inner));
    if tag.trim().contains(char::is_whitespace) {
        return None;
    }
    Some(body)
}
