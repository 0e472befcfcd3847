//! Find-build pipeline tests against in-memory review and git hosts

use async_trait::async_trait;
use buildlog::commit::{GitPerson, RawCommit};
use buildlog::config::ReleaseRules;
use buildlog::findbuild::{find_build_with, BuildRequest};
use buildlog::gerrit::{ChangeInfo, ChangeQuery};
use buildlog::gitiles::{GitClient, LogPage};
use buildlog::pool::ClientPool;
use buildlog::{BuildLogError, Result};
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;

const HOST: &str = "cos.example.com";
const MANIFEST_REPO: &str = "cos/manifest-snapshots";
const REPO: &str = "mirrors/cros/cos/widget";

struct FakeGerrit {
    changes: Vec<ChangeInfo>,
}

#[async_trait]
impl ChangeQuery for FakeGerrit {
    async fn query_changes(&self, _query: &str, limit: u32) -> Result<Vec<ChangeInfo>> {
        Ok(self.changes.iter().take(limit as usize).cloned().collect())
    }
}

fn submitted_change(revision: &str) -> ChangeInfo {
    ChangeInfo {
        number: 1234,
        project: "cos/widget".to_string(),
        branch: "main".to_string(),
        current_revision: Some(revision.to_string()),
        submitted: Some("2024-03-01 10:00:00.000000000".to_string()),
    }
}

/// Git host serving the manifest repository (history, tags, snapshots)
/// and the change's repository (its changelog).
#[derive(Default)]
struct FakeHost {
    manifest_history: Vec<RawCommit>,
    tags: HashMap<String, String>,
    snapshots: HashMap<String, String>,
    repo_logs: HashMap<(String, String), Vec<RawCommit>>,
}

#[async_trait]
impl GitClient for FakeHost {
    async fn fetch_file(&self, repo: &str, committish: &str, _path: &str) -> Result<String> {
        assert_eq!(repo, MANIFEST_REPO);
        let build = committish.trim_start_matches("refs/tags/");
        self.snapshots
            .get(build)
            .cloned()
            .ok_or_else(|| BuildLogError::NotFound(build.to_string()))
    }

    async fn log_page(
        &self,
        repo: &str,
        committish: &str,
        exclude_ancestors_of: Option<&str>,
        _page_size: u32,
        _page_token: Option<&str>,
    ) -> Result<LogPage> {
        let log = if repo == MANIFEST_REPO {
            self.manifest_history.clone()
        } else {
            let key = (
                committish.to_string(),
                exclude_ancestors_of.unwrap_or("").to_string(),
            );
            self.repo_logs
                .get(&key)
                .cloned()
                .ok_or_else(|| BuildLogError::Transport(format!("no log for {:?}", key)))?
        };
        Ok(LogPage {
            log,
            next_page_token: None,
        })
    }

    async fn refs(&self, _repo: &str, _refs_path: &str) -> Result<HashMap<String, String>> {
        Ok(self.tags.clone())
    }
}

fn raw_commit(sha: &str, hours_after_submission: i64) -> RawCommit {
    let submitted = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let time = submitted + Duration::hours(hours_after_submission);
    RawCommit {
        commit: sha.to_string(),
        author: None,
        committer: Some(GitPerson {
            name: "builder".to_string(),
            email: "b@x".to_string(),
            time: time.format("%a %b %d %H:%M:%S %Y %z").to_string(),
        }),
        message: format!("{}\n", sha),
    }
}

fn snapshot_xml(revision: &str, host: &str) -> String {
    format!(
        r#"<manifest>
             <remote name="cos" fetch="https://{}" />
             <default remote="cos" />
             <project name="{}" revision="{}" dest-branch="refs/heads/main" />
           </manifest>"#,
        host, REPO, revision
    )
}

/// Three builds around the submission: B1 pins the pre-change state, B2
/// and B3 both pin the change's commit.
fn scenario_host() -> FakeHost {
    let mut host = FakeHost::default();
    host.manifest_history = vec![
        raw_commit("m3", 48),
        raw_commit("m2", 24),
        raw_commit("m1", -1),
    ];
    for (tag, commit) in [("B3", "m3"), ("B2", "m2"), ("B1", "m1")] {
        host.tags
            .insert(format!("refs/tags/{}", tag), commit.to_string());
    }
    host.snapshots.insert("B3".to_string(), snapshot_xml("C", HOST));
    host.snapshots.insert("B2".to_string(), snapshot_xml("C", HOST));
    host.snapshots.insert("B1".to_string(), snapshot_xml("C0", HOST));
    // Repository changelog from the newest pin down to the oldest
    host.repo_logs.insert(
        ("C".to_string(), "C0".to_string()),
        vec![raw_commit("C", 0), raw_commit("C1", -2)],
    );
    host
}

fn request() -> BuildRequest {
    BuildRequest {
        gerrit_host: "https://review.example.com".to_string(),
        gitiles_host: HOST.to_string(),
        manifest_repo: MANIFEST_REPO.to_string(),
        repo_prefix: "mirrors/cros/".to_string(),
        change_id: "1234".to_string(),
    }
}

fn pool_for(host: Arc<FakeHost>) -> ClientPool {
    ClientPool::with_factory(Box::new(move |_| {
        Ok(Arc::clone(&host) as Arc<dyn GitClient>)
    }))
}

#[tokio::test]
async fn test_earliest_containing_build_wins() {
    let gerrit = FakeGerrit {
        changes: vec![submitted_change("C")],
    };
    let mut pool = pool_for(Arc::new(scenario_host()));

    let response = find_build_with(&gerrit, &mut pool, &request(), &ReleaseRules::new())
        .await
        .unwrap();
    // B2 and B3 both contain the change; B2 is the earliest
    assert_eq!(response.build_num, "B2");
    assert_eq!(response.change_number, "1234");
}

#[tokio::test]
async fn test_change_not_landed() {
    // The submitted revision never shows up in the repository changelog
    let gerrit = FakeGerrit {
        changes: vec![submitted_change("D")],
    };
    let mut pool = pool_for(Arc::new(scenario_host()));

    let err = find_build_with(&gerrit, &mut pool, &request(), &ReleaseRules::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BuildLogError::ChangeNotLanded));
}

#[tokio::test]
async fn test_ambiguous_identifier() {
    let gerrit = FakeGerrit {
        changes: vec![submitted_change("C"), submitted_change("C")],
    };
    let mut pool = pool_for(Arc::new(scenario_host()));

    let err = find_build_with(&gerrit, &mut pool, &request(), &ReleaseRules::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BuildLogError::AmbiguousIdentifier));
}

#[tokio::test]
async fn test_host_migration_in_window_is_fatal() {
    let gerrit = FakeGerrit {
        changes: vec![submitted_change("C")],
    };
    let mut host = scenario_host();
    host.snapshots
        .insert("B1".to_string(), snapshot_xml("C0", "elsewhere.example.com"));
    let mut pool = pool_for(Arc::new(host));

    let err = find_build_with(&gerrit, &mut pool, &request(), &ReleaseRules::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BuildLogError::InconsistentRemote { .. }));
}

#[tokio::test]
async fn test_unknown_change() {
    let gerrit = FakeGerrit { changes: vec![] };
    let mut pool = pool_for(Arc::new(scenario_host()));

    let err = find_build_with(&gerrit, &mut pool, &request(), &ReleaseRules::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BuildLogError::ChangeNotFound));
}
