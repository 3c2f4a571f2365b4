//! Change collection from the repository using git2.

use std::fmt;

use git2::{Commit, Delta, Diff, DiffFindOptions, DiffOptions, ErrorCode, Patch, Repository, Tree};
use tracing::{debug, warn};

use crate::error::CollectError;

use super::refs::{current_branch, resolve_reference};

/// What the caller wants a commit message for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Changes staged in the index.
    WorkingTree,
    /// The changes introduced by a single commit relative to its first parent.
    Commit(String),
    /// The HEAD commit, as it will look after `git commit --amend`.
    Amend,
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::WorkingTree => TargetKind::WorkingTree,
            Target::Commit(_) => TargetKind::Commit,
            Target::Amend => TargetKind::Amend,
        }
    }
}

/// Target selection without the unresolved reference text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    WorkingTree,
    Commit,
    Amend,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::WorkingTree => write!(f, "working-tree"),
            TargetKind::Commit => write!(f, "commit"),
            TargetKind::Amend => write!(f, "amend"),
        }
    }
}

/// How a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Renamed => write!(f, "renamed"),
        }
    }
}

/// One file's contribution to a change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    /// Old path for renamed files (None for non-rename changes).
    pub old_path: Option<String>,
    pub kind: ChangeKind,
    /// Patch text including the `diff --git` header. Empty for binary or
    /// non-UTF-8 content.
    pub diff: String,
    /// Size in bytes of the file's new content (old content for deletions).
    pub size: u64,
    pub additions: usize,
    pub deletions: usize,
}

impl FileChange {
    pub fn has_diff(&self) -> bool {
        !self.diff.is_empty()
    }
}

/// The collected changes for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub target: TargetKind,
    /// Full commit hash the diff was taken from; empty for the working tree.
    pub reference: String,
    pub branch: Option<String>,
    pub files: Vec<FileChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn additions(&self) -> usize {
        self.files.iter().map(|f| f.additions).sum()
    }

    pub fn deletions(&self) -> usize {
        self.files.iter().map(|f| f.deletions).sum()
    }
}

/// Collect the changes for `target`.
///
/// Never writes to the repository. Fails with [`CollectError::NoChanges`]
/// when the resulting diff is empty, so callers never compile an empty
/// change set.
pub fn collect_changes(repo: &Repository, target: &Target) -> Result<ChangeSet, CollectError> {
    let mut opts = DiffOptions::new();
    opts.ignore_submodules(true);

    let (reference, mut diff) = match target {
        Target::WorkingTree => {
            let head_tree = match resolve_head_commit(repo)? {
                Some(head) => Some(head.tree().map_err(CollectError::Git)?),
                None => None,
            };
            let diff = repo
                .diff_tree_to_index(head_tree.as_ref(), None, Some(&mut opts))
                .map_err(CollectError::Git)?;
            (String::new(), diff)
        }
        Target::Commit(rev) => {
            let oid = resolve_reference(repo, rev)?;
            let commit = repo.find_commit(oid).map_err(CollectError::Git)?;
            let tree = commit.tree().map_err(CollectError::Git)?;
            let parent_tree = first_parent_tree(&commit)?;
            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
                .map_err(CollectError::Git)?;
            (oid.to_string(), diff)
        }
        Target::Amend => {
            let head = resolve_head_commit(repo)?.ok_or(CollectError::NoCommits)?;
            let parent_tree = first_parent_tree(&head)?;
            // Diffing against the index covers HEAD's own changes plus
            // anything staged, which is what --amend will record.
            let diff = repo
                .diff_tree_to_index(parent_tree.as_ref(), None, Some(&mut opts))
                .map_err(CollectError::Git)?;
            (head.id().to_string(), diff)
        }
    };

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))
        .map_err(CollectError::Git)?;

    let files = collect_files(&diff);
    if files.is_empty() {
        return Err(CollectError::NoChanges);
    }

    debug!(
        "Collected {} changed files for {} target {}",
        files.len(),
        target.kind(),
        if reference.is_empty() { "(index)" } else { reference.as_str() }
    );

    Ok(ChangeSet {
        target: target.kind(),
        reference,
        branch: current_branch(repo),
        files,
    })
}

/// Resolve the HEAD commit, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found).
fn resolve_head_commit(repo: &Repository) -> Result<Option<Commit<'_>>, CollectError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(CollectError::Git(e)),
    };

    head_ref
        .peel_to_commit()
        .map(Some)
        .map_err(CollectError::Git)
}

/// Tree of the first parent, or `None` for a root commit.
fn first_parent_tree<'r>(commit: &Commit<'r>) -> Result<Option<Tree<'r>>, CollectError> {
    if commit.parent_count() == 0 {
        return Ok(None);
    }
    let parent = commit.parent(0).map_err(CollectError::Git)?;
    parent.tree().map(Some).map_err(CollectError::Git)
}

/// Build one [`FileChange`] per delta, in git's (lexical path) order.
fn collect_files(diff: &Diff<'_>) -> Vec<FileChange> {
    let mut files = Vec::with_capacity(diff.deltas().len());

    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };

        let kind = match delta.status() {
            Delta::Added | Delta::Untracked | Delta::Copied => ChangeKind::Added,
            Delta::Deleted => ChangeKind::Deleted,
            Delta::Renamed => ChangeKind::Renamed,
            _ => ChangeKind::Modified,
        };

        let new_path = delta
            .new_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());
        let old_path = delta
            .old_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());

        let (path, old_path) = match kind {
            ChangeKind::Renamed => (new_path.clone().or_else(|| old_path.clone()), old_path),
            ChangeKind::Deleted => (old_path.or(new_path), None),
            _ => (new_path.or(old_path), None),
        };
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            continue;
        };

        let mut size = match kind {
            ChangeKind::Deleted => delta.old_file().size(),
            _ => delta.new_file().size(),
        };
        let mut body = String::new();
        let mut additions = 0;
        let mut deletions = 0;

        match Patch::from_diff(diff, idx) {
            Ok(Some(mut patch)) => {
                let loaded = patch.delta();
                size = match kind {
                    ChangeKind::Deleted => loaded.old_file().size(),
                    _ => loaded.new_file().size(),
                };

                if !loaded.flags().is_binary() {
                    if let Ok((_, adds, dels)) = patch.line_stats() {
                        additions = adds;
                        deletions = dels;
                    }
                    match patch.to_buf() {
                        Ok(buf) => match buf.as_str() {
                            Some(text) => body = text.to_string(),
                            None => debug!("Skipping non-UTF-8 diff for {path}"),
                        },
                        Err(e) => warn!("Failed to render diff for {path}: {e}"),
                    }
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load patch for {path}: {e}"),
        }

        files.push(FileChange {
            path,
            old_path,
            kind,
            diff: body,
            size,
            additions,
            deletions,
        });
    }

    files
}
