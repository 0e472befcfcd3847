//! Manifest-window selection
//!
//! A submitted change can only land in a snapshot committed after its
//! submission, and release latency is bounded, so only snapshots within a
//! few days of submission need parsing. The window also includes the
//! newest snapshot older than the submission: that build pins the
//! repository state just before the change and anchors the lower end of
//! the repository changelog.

use crate::commit::RawCommit;
use crate::Result;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Days after submission a change is expected to reach a build
pub const WINDOW_DAYS: i64 = 5;

/// The contiguous run of manifest commits whose times fall within
/// [submitted, submitted + 5d], plus the first strictly-older snapshot,
/// in newest-first order.
///
/// `commits` is the manifest repository history on the release branch,
/// newest first. Fails with MalformedHistory if any record lacks a
/// committer.
pub fn manifest_window<'a>(
    commits: &'a [RawCommit],
    submitted: NaiveDateTime,
) -> Result<&'a [RawCommit]> {
    let times: Vec<DateTime<Utc>> = commits
        .iter()
        .map(|c| c.committer_time().map(|t| t.with_timezone(&Utc)))
        .collect::<Result<_>>()?;

    let start = submitted.and_utc();
    let end = start + Duration::days(WINDOW_DAYS);

    // Times are descending; both boundaries fall out of partition points.
    let latest = times.partition_point(|time| *time > end);
    let first_older = times.partition_point(|time| *time >= start);
    let stop = (first_older + 1).min(commits.len());

    if latest >= stop {
        return Ok(&commits[0..0]);
    }
    Ok(&commits[latest..stop])
}
