//! Git operations using git2-rs, plus commit application via the git binary.

pub mod apply;
pub mod collect;
pub mod refs;

pub use apply::CommitCommand;
pub use collect::{ChangeKind, ChangeSet, FileChange, Target, TargetKind, collect_changes};
pub use refs::{current_branch, resolve_reference};
