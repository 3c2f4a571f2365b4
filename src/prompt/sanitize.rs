//! Text cleanup for content placed in prompts.

use std::sync::LazyLock;

use regex_lite::Regex;

/// CSI and OSC escape sequences, as emitted by colored diff output.
///
/// An OSC sequence must be terminated on its own line. An unterminated one
/// is left to control-character removal so no diff line is swallowed.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b\n]*(?:\x07|\x1b\\)")
        .expect("ANSI escape pattern is valid")
});

/// Sanitize text for inclusion in a prompt.
///
/// - Normalizes CRLF line endings to LF
/// - Removes ANSI escape sequences
/// - Removes control characters except newlines and tabs
///
/// Only whole characters are removed, so the result is always valid UTF-8
/// and keeps every remaining line intact.
pub fn sanitize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = remove_ansi_escapes(&text);
    remove_control_chars(&text)
}

pub fn remove_ansi_escapes(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
