//! Change localization
//!
//! Resolves a user-supplied change identifier (change number, commit SHA,
//! or change signature) to the canonical submitted change: repository,
//! branch, release branch, revision, and submission time.

use crate::config::ReleaseRules;
use crate::gerrit::ChangeQuery;
use crate::{BuildLogError, Result};
use chrono::NaiveDateTime;
use tracing::debug;

/// Gerrit submission timestamps carry nanosecond precision
const SUBMITTED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// A located change, ready for manifest lookup
#[derive(Debug, Clone)]
pub struct ChangeData {
    pub change_number: u64,
    /// Repository name with the manifest prefix applied
    pub repository: String,
    /// Branch the change was submitted to
    pub branch: String,
    /// Release branch of the manifest repository the change rides on
    pub release: String,
    /// SHA of the submitted revision
    pub revision: String,
    /// Submission time, UTC
    pub submitted: NaiveDateTime,
}

/// Resolve `change_id` against the code-review system.
///
/// A change signature shared by cherry-picks matches more than one change;
/// the query asks for two results so ambiguity is detectable without
/// paging.
pub async fn locate_change(
    gerrit: &dyn ChangeQuery,
    change_id: &str,
    repo_prefix: &str,
    rules: &ReleaseRules,
) -> Result<ChangeData> {
    let mut changes = gerrit.query_changes(change_id, 2).await?;
    let change = match changes.len() {
        0 => return Err(BuildLogError::ChangeNotFound),
        1 => changes.remove(0),
        _ => return Err(BuildLogError::AmbiguousIdentifier),
    };

    let submitted = match change.submitted.as_deref() {
        Some(s) if !s.is_empty() => s,
        _ => return Err(BuildLogError::ChangeNotSubmitted),
    };
    let submitted = NaiveDateTime::parse_from_str(submitted, SUBMITTED_TIME_FORMAT)
        .map_err(|e| BuildLogError::Parse(format!("invalid submission time: {}", e)))?;
    let revision = change
        .current_revision
        .clone()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            BuildLogError::Parse(format!("change {} has no current revision", change.number))
        })?;

    let release = derive_release(&change.project, &change.branch, rules);
    debug!(
        change = change.number,
        repo = %change.project,
        branch = %change.branch,
        release = %release,
        "Located change"
    );

    Ok(ChangeData {
        change_number: change.number,
        repository: format!("{}{}", repo_prefix, change.project),
        branch: change.branch,
        release,
        revision,
        submitted,
    })
}

/// Release branch for a change: identity by default, regex extraction with
/// a fallback default for repositories whose branch names carry extra
/// qualifiers.
fn derive_release(repository: &str, branch: &str, rules: &ReleaseRules) -> String {
    match rules.get(repository) {
        Some(rule) => rule
            .pattern
            .captures(branch)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| rule.default_release.clone()),
        None => branch.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gerrit::ChangeInfo;
    use async_trait::async_trait;

    struct FakeGerrit {
        changes: Vec<ChangeInfo>,
    }

    #[async_trait]
    impl ChangeQuery for FakeGerrit {
        async fn query_changes(&self, _: &str, limit: u32) -> Result<Vec<ChangeInfo>> {
            Ok(self.changes.iter().take(limit as usize).cloned().collect())
        }
    }

    fn submitted_change() -> ChangeInfo {
        ChangeInfo {
            number: 3741,
            project: "third_party/kernel".to_string(),
            branch: "chromeos-5.10-cos-rc1".to_string(),
            current_revision: Some("deadbeef".to_string()),
            submitted: Some("2024-03-01 10:00:00.000000000".to_string()),
        }
    }

    fn rules() -> ReleaseRules {
        Config::default().release_rules().unwrap()
    }

    #[tokio::test]
    async fn test_happy_path() {
        let gerrit = FakeGerrit {
            changes: vec![submitted_change()],
        };
        let data = locate_change(&gerrit, "3741", "mirrors/cros/", &rules())
            .await
            .unwrap();
        assert_eq!(data.change_number, 3741);
        assert_eq!(data.repository, "mirrors/cros/third_party/kernel");
        assert_eq!(data.branch, "chromeos-5.10-cos-rc1");
        assert_eq!(data.release, "chromeos-5.10");
        assert_eq!(data.revision, "deadbeef");
        assert_eq!(
            data.submitted.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-03-01 10:00:00"
        );
    }

    #[tokio::test]
    async fn test_no_match_is_not_found() {
        let gerrit = FakeGerrit { changes: vec![] };
        let err = locate_change(&gerrit, "999", "", &rules()).await.unwrap_err();
        assert!(matches!(err, BuildLogError::ChangeNotFound));
    }

    #[tokio::test]
    async fn test_multiple_matches_are_ambiguous() {
        let gerrit = FakeGerrit {
            changes: vec![submitted_change(), submitted_change()],
        };
        let err = locate_change(&gerrit, "If9f77417", "", &rules())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildLogError::AmbiguousIdentifier));
    }

    #[tokio::test]
    async fn test_unsubmitted_change_is_rejected() {
        let mut change = submitted_change();
        change.submitted = None;
        let gerrit = FakeGerrit {
            changes: vec![change],
        };
        let err = locate_change(&gerrit, "3741", "", &rules()).await.unwrap_err();
        assert!(matches!(err, BuildLogError::ChangeNotSubmitted));
    }

    #[test]
    fn test_release_defaults_to_branch() {
        assert_eq!(
            derive_release("cos/docs", "release-R101", &rules()),
            "release-R101"
        );
    }

    #[test]
    fn test_release_rule_fallback() {
        // Branch does not match the kernel pattern; the rule's default wins
        assert_eq!(
            derive_release("third_party/kernel", "experimental", &rules()),
            "master"
        );
    }
}
