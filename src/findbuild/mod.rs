//! First-build lookup for a submitted change
//!
//! Locates the change in the code-review system, narrows the manifest
//! repository history to a window around the submission time, extracts the
//! repository pin from every windowed snapshot concurrently, and walks the
//! repository changelog to the earliest build whose pin contains the
//! change.
//!
//! - **locator**: change identifier -> repository, branch, revision, time
//! - **window**: manifest history -> snapshots near the submission
//! - **mapper**: windowed snapshots -> candidate builds and SHA range
//! - **resolver**: repository changelog + candidates -> build number

mod locator;
mod mapper;
mod resolver;
mod window;

pub use locator::{locate_change, ChangeData};
pub use mapper::{build_numbers, map_builds, RepoWindow};
pub use resolver::first_build;
pub use window::{manifest_window, WINDOW_DAYS};

use crate::config::ReleaseRules;
use crate::gerrit::{ChangeQuery, GerritClient};
use crate::history::{fetch_history, fetch_raw_history};
use crate::pool::ClientPool;
use crate::Result;
use std::time::Instant;
use tracing::{debug, info};

/// Input for [`find_build`]
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Code-review instance to locate the change on,
    /// e.g. "https://cos-review.googlesource.com"
    pub gerrit_host: String,
    /// Instance holding the manifest repository,
    /// e.g. "cos.googlesource.com" (no scheme)
    pub gitiles_host: String,
    /// Repository the snapshot files are committed to,
    /// e.g. "cos/manifest-snapshots"
    pub manifest_repo: String,
    /// Prefix applied to the change's repository before manifest lookup;
    /// bridges naming between the review and git hosts
    pub repo_prefix: String,
    /// Change number, commit SHA, or change signature
    pub change_id: String,
}

/// Output of [`find_build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResponse {
    pub build_num: String,
    pub change_number: String,
}

/// Locate the first build containing a change, building production
/// clients from the request hosts.
pub async fn find_build(request: &BuildRequest, rules: &ReleaseRules) -> Result<BuildResponse> {
    let gerrit = GerritClient::new(&request.gerrit_host)?;
    let mut pool = ClientPool::gitiles();
    find_build_with(&gerrit, &mut pool, request, rules).await
}

/// [`find_build`] over caller-supplied clients; the seam tests use.
pub async fn find_build_with(
    gerrit: &dyn ChangeQuery,
    pool: &mut ClientPool,
    request: &BuildRequest,
    rules: &ReleaseRules,
) -> Result<BuildResponse> {
    let start = Instant::now();
    info!(change = %request.change_id, "Locating first build for change");

    let change = locate_change(gerrit, &request.change_id, &request.repo_prefix, rules).await?;

    let manifest_client = pool.ensure(&request.gitiles_host)?;
    let release_ref = format!("refs/heads/{}", change.release);
    let manifest_history = fetch_raw_history(
        manifest_client.as_ref(),
        &request.manifest_repo,
        &release_ref,
        None,
    )
    .await?;

    let window = manifest_window(&manifest_history, change.submitted)?;
    debug!(snapshots = window.len(), "Selected manifest window");

    let builds = build_numbers(manifest_client.as_ref(), &request.manifest_repo, window).await?;
    let repo_window = map_builds(&manifest_client, &request.manifest_repo, &builds, &change).await?;

    // The repository may live on a different instance than the manifests
    let repo_client = if repo_window.remote_url != request.gitiles_host {
        debug!(host = %repo_window.remote_url, "Repository lives on a different instance");
        pool.ensure(&repo_window.remote_url)?
    } else {
        manifest_client
    };

    let repo_history = fetch_history(
        repo_client.as_ref(),
        &change.repository,
        &repo_window.target_sha,
        Some(&repo_window.source_sha),
    )
    .await?;

    let build_num = first_build(&repo_history, &change.revision, &repo_window.candidates)?;
    info!(
        build = %build_num,
        change = change.change_number,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Resolved first build"
    );

    Ok(BuildResponse {
        build_num,
        change_number: change.change_number.to_string(),
    })
}
