//! Reference resolution.

use git2::{Oid, Repository};

use crate::error::CollectError;

/// Resolve a reference (commit hash, branch, tag, or revspec like `HEAD~2`)
/// to the OID of the commit it points at.
pub fn resolve_reference(repo: &Repository, reference: &str) -> Result<Oid, CollectError> {
    // Try as a direct OID first
    if let Ok(oid) = Oid::from_str(reference)
        && repo.find_commit(oid).is_ok()
    {
        return Ok(oid);
    }

    let obj = repo
        .revparse_single(reference)
        .map_err(|e| CollectError::RefNotFound(reference.to_string(), e))?;

    obj.peel_to_commit()
        .map(|c| c.id())
        .map_err(|e| CollectError::RefNotFound(reference.to_string(), e))
}

/// Short name of the checked-out branch, or `None` for a detached or unborn HEAD.
pub fn current_branch(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand().map(str::to_string)
}
