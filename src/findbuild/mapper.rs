//! Build mapping
//!
//! Turns the manifest window into concrete repository data: which build
//! number each windowed snapshot carries (via the tag namespace), which
//! SHA each build pinned for the change's repository, and the overall
//! source/target SHA pair bounding the repository changelog.

use super::locator::ChangeData;
use crate::changelog::MANIFEST_FILE_NAME;
use crate::commit::RawCommit;
use crate::gitiles::GitClient;
use crate::manifest::Manifest;
use crate::{BuildLogError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Build tags have the exact shape refs/tags/<buildNum>
const TAG_REF_PREFIX: &str = "refs/tags/";

/// Repository data extracted from the manifest window
#[derive(Debug, Clone, Default)]
pub struct RepoWindow {
    /// Pinned SHA -> earliest build number that pinned it
    pub candidates: HashMap<String, String>,
    /// SHA pinned by the oldest matching snapshot in the window
    pub source_sha: String,
    /// SHA pinned by the newest matching snapshot in the window
    pub target_sha: String,
    /// Host serving the change's repository; must not drift inside the
    /// window
    pub remote_url: String,
}

/// What one snapshot pins for the change's repository
#[derive(Debug, Clone)]
struct ManifestExtract {
    build_num: String,
    sha: String,
    remote_url: String,
}

/// Build numbers for every windowed manifest commit, window order.
///
/// Every windowed commit must carry a tag; an untagged commit means the
/// window and the tag namespace disagree and the request cannot be
/// answered.
pub async fn build_numbers(
    client: &dyn GitClient,
    manifest_repo: &str,
    window: &[RawCommit],
) -> Result<Vec<String>> {
    let tags = client.refs(manifest_repo, "refs/tags").await?;
    let mut tag_by_sha: HashMap<&str, &str> = HashMap::with_capacity(tags.len());
    for (tag_ref, sha) in &tags {
        tag_by_sha.insert(sha.as_str(), tag_ref.as_str());
    }

    window
        .iter()
        .map(|commit| {
            let tag_ref = tag_by_sha
                .get(commit.commit.as_str())
                .ok_or_else(|| BuildLogError::UnmappedManifest(commit.commit.clone()))?;
            if tag_ref.len() <= TAG_REF_PREFIX.len() {
                return Err(BuildLogError::MalformedTag((*tag_ref).to_string()));
            }
            Ok(tag_ref[TAG_REF_PREFIX.len()..].to_string())
        })
        .collect()
}

/// Download one snapshot and extract the pin for the change's repository
/// and branch. A snapshot without a matching project is reported as an
/// error; the caller decides whether that is fatal.
async fn manifest_extract(
    client: Arc<dyn GitClient>,
    manifest_repo: String,
    build_num: String,
    change_repo: String,
    change_branch: String,
) -> Result<ManifestExtract> {
    let committish = format!("refs/tags/{}", build_num);
    let xml = client
        .fetch_file(&manifest_repo, &committish, MANIFEST_FILE_NAME)
        .await?;
    let manifest = Manifest::parse(&xml)?;
    debug!(build = %build_num, "Parsed windowed manifest");

    let mut sha = String::new();
    let mut remote_url = String::new();
    for project in &manifest.projects {
        let branch = project.branch();
        // A project without a dest-branch matches any branch
        if project.name == change_repo && (branch.is_empty() || branch == change_branch) {
            sha = project.revision.clone();
            remote_url = manifest.remote_url(project);
        }
    }
    if sha.is_empty() || remote_url.is_empty() {
        return Err(BuildLogError::NoBranchMatch);
    }
    Ok(ManifestExtract {
        build_num,
        sha,
        remote_url,
    })
}

/// Download every windowed snapshot concurrently and aggregate the
/// repository data.
///
/// Snapshots that fail to download, fail to parse, or do not pin the
/// change's repository are skipped with a warning. A remote URL that
/// changes across the window is fatal: the repository migrated hosts and
/// its history cannot be ranged over one instance.
pub async fn map_builds(
    client: &Arc<dyn GitClient>,
    manifest_repo: &str,
    build_nums: &[String],
    change: &ChangeData,
) -> Result<RepoWindow> {
    let mut window = RepoWindow::default();
    if build_nums.is_empty() {
        return Err(BuildLogError::NoBranchMatch);
    }

    let (tx, mut rx) = mpsc::channel(build_nums.len());
    for (position, build_num) in build_nums.iter().enumerate() {
        let client = Arc::clone(client);
        let manifest_repo = manifest_repo.to_string();
        let build_num = build_num.clone();
        let change_repo = change.repository.clone();
        let change_branch = change.branch.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = manifest_extract(client, manifest_repo, build_num, change_repo, change_branch).await;
            let _ = tx.send((position, result)).await;
        });
    }
    drop(tx);

    // Window positions are explicit integers: 0 is the newest snapshot.
    // The earliest matching snapshot supplies source_sha, the newest
    // target_sha, and each SHA keeps the earliest build that pinned it.
    let mut candidate_positions: HashMap<String, usize> = HashMap::new();
    let mut source_position = 0usize;
    let mut target_position = usize::MAX;
    while let Some((position, result)) = rx.recv().await {
        let extract = match result {
            Ok(extract) => extract,
            Err(e) => {
                warn!(position, error = %e, "Skipping windowed manifest");
                continue;
            }
        };
        if !window.remote_url.is_empty() && window.remote_url != extract.remote_url {
            return Err(BuildLogError::InconsistentRemote {
                repo: change.repository.clone(),
                build: extract.build_num,
            });
        }
        window.remote_url = extract.remote_url;

        if target_position == usize::MAX || position < target_position {
            window.target_sha = extract.sha.clone();
            target_position = position;
        }
        if position >= source_position {
            window.source_sha = extract.sha.clone();
            source_position = position;
        }
        match candidate_positions.get(&extract.sha) {
            Some(stored) if *stored >= position => {}
            _ => {
                candidate_positions.insert(extract.sha.clone(), position);
                window.candidates.insert(extract.sha, extract.build_num);
            }
        }
    }

    if window.candidates.is_empty() {
        return Err(BuildLogError::NoBranchMatch);
    }
    Ok(window)
}
