//! Build resolution
//!
//! The repository changelog runs newest-first from the newest windowed
//! pin down to (but excluding) the oldest. The first build containing a
//! change is the earliest build whose pinned SHA is a descendant of, or
//! equal to, the change's commit; walking from the change toward newer
//! commits, that is the first SHA present in the candidate map.

use crate::commit::Commit;
use crate::{BuildLogError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Earliest build number containing `revision`.
///
/// `history` is the repository changelog, newest first. `candidates` maps
/// pinned SHAs to build numbers. Fails with ChangeNotLanded when the
/// revision is not in the history, or when no commit at or above it is
/// pinned by any candidate build.
pub fn first_build(
    history: &[Commit],
    revision: &str,
    candidates: &HashMap<String, String>,
) -> Result<String> {
    let target_idx = history
        .iter()
        .position(|commit| commit.sha == revision)
        .ok_or(BuildLogError::ChangeNotLanded)?;

    for commit in history[..=target_idx].iter().rev() {
        if let Some(build_num) = candidates.get(&commit.sha) {
            debug!(build = %build_num, sha = %commit.sha, "Resolved first build");
            return Ok(build_num.clone());
        }
    }
    Err(BuildLogError::ChangeNotLanded)
}
