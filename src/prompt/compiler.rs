//! Budgeted compilation of a change set into chat messages.
//!
//! Messages are emitted in a fixed order:
//!
//! 1. system instructions (reserved first, never truncated)
//! 2. repository context: target, branch, stats and the file list
//! 3. the diff, one section per file in collection order
//! 4. one message per caller-supplied context hint
//!
//! Every piece is costed with the caller's [`TokenEstimator`] before it is
//! emitted, and the total never exceeds the budget.

use std::fmt;

use tracing::debug;

use crate::error::CompileError;
use crate::git::{ChangeKind, ChangeSet, FileChange, TargetKind};

use super::message::Message;
use super::sanitize::sanitize_text;
use super::tokens::{MESSAGE_OVERHEAD, REQUEST_OVERHEAD, TokenEstimator};

const SYSTEM_PROMPT: &str = "\
You are lazycommit, a tool that writes git commit messages.
You are given the repository context and the diff of a change.
Write a concise commit message in the Conventional Commits style:
- Subject line: `type(scope): summary`, at most 72 characters, imperative mood, no trailing period.
- Type: one of feat, fix, build, chore, ci, docs, style, refactor, perf, test.
- Optional body after one blank line, explaining why the change was made, wrapped at 72 characters.
If the author provides additional context, the message must reflect it.
Some diffs may be truncated or omitted to fit the context window; infer what you can from file names.
Output only the commit message, without code fences or commentary.
";

const COMMIT_NOTE: &str =
    "The diff belongs to an existing commit. Write the message that commit should have.\n";

const AMEND_NOTE: &str = "The message will replace the message of the HEAD commit, which will contain everything in the diff.\n";

const TRUNCATION_MARKER: &str = "[diff truncated here to fit the token budget]\n";

const CONTEXT_PREFIX: &str = "Additional context from the author:\n";

/// What to do with the first file whose full diff does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep as many complete lines as fit, then a truncation marker.
    #[default]
    Truncate,
    /// Replace the whole diff with a one-line placeholder.
    Omit,
}

/// Caller-supplied knobs for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Maximum total estimated tokens across all messages.
    pub budget: usize,
    /// Free-form hints, each sent as its own message after the diff.
    pub context: Vec<String>,
    pub overflow: OverflowPolicy,
}

impl CompileOptions {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            context: Vec::new(),
            overflow: OverflowPolicy::default(),
        }
    }

    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

/// How much of a file's diff made it into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffInclusion {
    Full,
    Truncated { kept_lines: usize, total_lines: usize },
    Omitted,
}

/// Per-file outcome, in collection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub inclusion: DiffInclusion,
}

/// Something was left out to respect the budget. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// A context hint did not fit and was dropped whole.
    ContextDropped { index: usize, text: String },
    /// The first `omitted` entries of the file list were dropped.
    FileListTruncated { omitted: usize },
    /// Not even the repository context header fit.
    FileListDropped,
    /// No room was left for the diff message.
    DiffsDropped,
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::ContextDropped { index, text } => {
                write!(f, "context #{} dropped, it does not fit the token budget: {text:?}", index + 1)
            }
            CompileWarning::FileListTruncated { omitted } => {
                write!(f, "file list truncated, {omitted} files not listed")
            }
            CompileWarning::FileListDropped => {
                write!(f, "repository context dropped, it does not fit the token budget")
            }
            CompileWarning::DiffsDropped => {
                write!(f, "all diffs omitted, no token budget left for them")
            }
        }
    }
}

/// The ordered message list ready for the completion transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPrompt {
    pub messages: Vec<Message>,
    pub files: Vec<FileReport>,
    pub warnings: Vec<CompileWarning>,
}

impl CompiledPrompt {
    /// Total estimated cost of the request: every message plus the
    /// per-request overhead.
    pub fn estimated_tokens(&self, estimator: &dyn TokenEstimator) -> usize {
        self.messages
            .iter()
            .map(|m| estimator.message_cost(&m.content))
            .sum::<usize>()
            + REQUEST_OVERHEAD
    }
}

/// Compile `changes` into messages whose estimated cost fits `options.budget`.
///
/// Fails only when the system instructions alone exceed the budget. Every
/// other shortfall drops or shortens content and is reported through
/// [`CompiledPrompt::files`] and [`CompiledPrompt::warnings`].
///
/// Diffs are placed greedily in collection order. The first file that does
/// not fit fully is truncated or omitted per [`OverflowPolicy`] and every
/// later file is omitted, so raising the budget never removes content.
pub fn compile(
    changes: &ChangeSet,
    options: &CompileOptions,
    estimator: &dyn TokenEstimator,
) -> Result<CompiledPrompt, CompileError> {
    let mut messages = Vec::new();
    let mut warnings = Vec::new();

    // 1. System instructions
    let system = system_prompt(changes.target);
    let required = estimator.message_cost(&system) + REQUEST_OVERHEAD;
    if options.budget < required {
        return Err(CompileError::BudgetTooSmall {
            budget: options.budget,
            required,
        });
    }
    messages.push(Message::system(system));
    let mut remaining = options.budget - required;

    // 2. Repository context
    let mut list_complete = false;
    match build_context(changes, remaining, estimator) {
        Some(context) => {
            remaining -= context.cost;
            list_complete = context.omitted == 0;
            if context.omitted > 0 {
                warnings.push(CompileWarning::FileListTruncated {
                    omitted: context.omitted,
                });
            }
            messages.push(Message::user(context.content));
        }
        None => warnings.push(CompileWarning::FileListDropped),
    }

    // 3. Diffs. A truncated file list already used up the budget.
    let diff = if list_complete {
        build_diff(changes, options.overflow, remaining, estimator)
    } else {
        None
    };
    let files = match diff {
        Some(diff) => {
            remaining -= diff.cost;
            messages.push(Message::user(diff.content));
            diff.files
        }
        None => {
            if !changes.is_empty() {
                warnings.push(CompileWarning::DiffsDropped);
            }
            changes
                .files
                .iter()
                .map(|f| FileReport {
                    path: f.path.clone(),
                    inclusion: DiffInclusion::Omitted,
                })
                .collect()
        }
    };

    // 4. Context hints, whole or not at all
    for (index, hint) in options.context.iter().enumerate() {
        let content = format!("{CONTEXT_PREFIX}{}", sanitize_text(hint.trim()));
        let cost = estimator.message_cost(&content);
        if cost <= remaining {
            remaining -= cost;
            messages.push(Message::user(content));
        } else {
            debug!("Dropping context #{} ({} tokens, {} left)", index + 1, cost, remaining);
            warnings.push(CompileWarning::ContextDropped {
                index,
                text: hint.clone(),
            });
        }
    }

    let prompt = CompiledPrompt {
        messages,
        files,
        warnings,
    };

    debug!(
        "Compiled {} messages, {} of {} tokens used",
        prompt.messages.len(),
        options.budget - remaining,
        options.budget
    );
    debug_assert!(prompt.estimated_tokens(estimator) <= options.budget);

    Ok(prompt)
}

fn system_prompt(target: TargetKind) -> String {
    let mut prompt = String::from(SYSTEM_PROMPT);
    match target {
        TargetKind::WorkingTree => {}
        TargetKind::Commit => prompt.push_str(COMMIT_NOTE),
        TargetKind::Amend => prompt.push_str(AMEND_NOTE),
    }
    prompt
}

fn short_hash(reference: &str) -> &str {
    reference.get(..12).unwrap_or(reference)
}

/// A message body assembled from costed pieces.
struct Section {
    content: String,
    cost: usize,
}

struct ContextSection {
    content: String,
    cost: usize,
    omitted: usize,
}

/// Build the repository context message, dropping file entries from the
/// front of the list until it fits `available`.
fn build_context(
    changes: &ChangeSet,
    available: usize,
    estimator: &dyn TokenEstimator,
) -> Option<ContextSection> {
    let mut header = String::from("Repository context:\n");
    match changes.target {
        TargetKind::WorkingTree => header.push_str("Target: staged changes\n"),
        TargetKind::Commit => {
            header.push_str(&format!("Target: commit {}\n", short_hash(&changes.reference)));
        }
        TargetKind::Amend => {
            header.push_str(&format!(
                "Target: amend of commit {}\n",
                short_hash(&changes.reference)
            ));
        }
    }
    if let Some(branch) = &changes.branch {
        header.push_str(&format!("Branch: {}\n", sanitize_text(branch)));
    }
    header.push_str(&format!(
        "{} files changed, {} insertions(+), {} deletions(-)\n",
        changes.files.len(),
        changes.additions(),
        changes.deletions()
    ));
    header.push_str("Files:\n");

    let header = Section {
        cost: estimator.estimate(&header) + MESSAGE_OVERHEAD,
        content: header,
    };

    let entries: Vec<Section> = changes
        .files
        .iter()
        .map(|f| {
            let line = file_entry(f);
            Section {
                cost: estimator.estimate(&line),
                content: line,
            }
        })
        .collect();

    // suffix[k] = cost of entries k..
    let mut suffix = vec![0usize; entries.len() + 1];
    for k in (0..entries.len()).rev() {
        suffix[k] = suffix[k + 1] + entries[k].cost;
    }

    for omitted in 0..=entries.len() {
        let marker = if omitted > 0 {
            format!("…and {omitted} more files\n")
        } else {
            String::new()
        };
        let cost = header.cost + suffix[omitted] + estimator.estimate(&marker);
        if cost > available {
            continue;
        }

        let mut content = header.content.clone();
        for entry in &entries[omitted..] {
            content.push_str(&entry.content);
        }
        content.push_str(&marker);
        return Some(ContextSection {
            content,
            cost,
            omitted,
        });
    }

    None
}

fn file_entry(file: &FileChange) -> String {
    let name = match (&file.kind, &file.old_path) {
        (ChangeKind::Renamed, Some(old)) => format!("{} -> {}", old, file.path),
        _ => file.path.clone(),
    };
    let note = if file.has_diff() { "" } else { ", no text diff" };
    sanitize_text(&format!("- {} ({}{})", name, file.kind, note)) + "\n"
}

struct DiffSection {
    content: String,
    cost: usize,
    files: Vec<FileReport>,
}

/// Build the diff message within `available` tokens, or `None` if not even
/// the header plus one placeholder per file fits.
fn build_diff(
    changes: &ChangeSet,
    overflow: OverflowPolicy,
    available: usize,
    estimator: &dyn TokenEstimator,
) -> Option<DiffSection> {
    let header = match changes.target {
        TargetKind::WorkingTree => "Diff of the staged changes:\n".to_string(),
        TargetKind::Commit => format!("Diff of commit {}:\n", short_hash(&changes.reference)),
        TargetKind::Amend => format!(
            "Diff of commit {} as it will be amended:\n",
            short_hash(&changes.reference)
        ),
    };

    let placeholders: Vec<Section> = changes
        .files
        .iter()
        .map(|f| {
            let line = sanitize_text(&format!("{}: diff omitted, exceeds token budget", f.path)) + "\n";
            Section {
                cost: estimator.estimate(&line),
                content: line,
            }
        })
        .collect();

    // Placeholders for undecided files stay reserved so any file can fall
    // back to one.
    let mut reserved: usize = placeholders.iter().map(|p| p.cost).sum();
    let mut used = MESSAGE_OVERHEAD + estimator.estimate(&header);
    if used + reserved > available {
        return None;
    }

    let mut content = header;
    let mut files = Vec::with_capacity(changes.files.len());
    let mut overflowed = false;

    for (file, placeholder) in changes.files.iter().zip(&placeholders) {
        reserved -= placeholder.cost;
        let room = available - used - reserved;

        let inclusion = if overflowed {
            DiffInclusion::Omitted
        } else {
            let body = diff_body(file);
            let line_costs: Vec<usize> = body
                .split_inclusive('\n')
                .map(|line| estimator.estimate(line))
                .collect();
            let full_cost: usize = line_costs.iter().sum();

            if full_cost <= room {
                content.push_str(&body);
                used += full_cost;
                DiffInclusion::Full
            } else {
                overflowed = true;
                let kept = match overflow {
                    OverflowPolicy::Truncate if file.has_diff() => {
                        let marker_cost = estimator.estimate(TRUNCATION_MARKER);
                        room.checked_sub(marker_cost)
                            .map(|limit| (fitting_lines(&line_costs, limit), marker_cost))
                    }
                    _ => None,
                };

                match kept {
                    Some(((kept_lines, kept_cost), marker_cost)) if kept_lines > 0 => {
                        content.extend(body.split_inclusive('\n').take(kept_lines));
                        content.push_str(TRUNCATION_MARKER);
                        used += kept_cost + marker_cost;
                        debug!("Truncated diff of {} to {} lines", file.path, kept_lines);
                        DiffInclusion::Truncated {
                            kept_lines,
                            total_lines: line_costs.len(),
                        }
                    }
                    _ => DiffInclusion::Omitted,
                }
            }
        };

        if inclusion == DiffInclusion::Omitted {
            content.push_str(&placeholder.content);
            used += placeholder.cost;
        }

        files.push(FileReport {
            path: file.path.clone(),
            inclusion,
        });
    }

    Some(DiffSection {
        content,
        cost: used,
        files,
    })
}

/// Sanitized, newline-terminated text emitted for a file's full diff.
fn diff_body(file: &FileChange) -> String {
    if !file.has_diff() {
        return sanitize_text(&format!(
            "{}: {} (binary or non-text content, no diff available)",
            file.path, file.kind
        )) + "\n";
    }

    let mut body = sanitize_text(&file.diff);
    if !body.ends_with('\n') {
        body.push('\n');
    }
    body
}

/// Longest prefix of lines whose total cost fits `limit`, as
/// `(line_count, cost)`.
fn fitting_lines(line_costs: &[usize], limit: usize) -> (usize, usize) {
    let mut total = 0;
    for (count, cost) in line_costs.iter().enumerate() {
        if total + cost > limit {
            return (count, total);
        }
        total += cost;
    }
    (line_costs.len(), total)
}
