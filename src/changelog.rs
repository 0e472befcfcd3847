//! Changelog generation between two builds
//!
//! Downloads and parses the manifest snapshots tagged with the source and
//! target build numbers, then fans out one log request per pinned
//! repository, in both directions concurrently. The result is a pair of
//! mappings: commits added to the target build, and commits present in the
//! source build but missing from the target.

use crate::commit::Commit;
use crate::history::fetch_history;
use crate::manifest::{parse_repo_pins, RepoPin};
use crate::pool::ClientPool;
use crate::{BuildLogError, Result};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// File name every snapshot is committed under in the manifest repository
pub const MANIFEST_FILE_NAME: &str = "snapshot.xml";

/// Repository name -> commits, newest first
pub type RepoChangelog = HashMap<String, Vec<Commit>>;

/// Download and parse the snapshot tagged with `build_num`
async fn mapped_manifest(
    pool: &mut ClientPool,
    host: &str,
    manifest_repo: &str,
    build_num: &str,
) -> Result<HashMap<String, RepoPin>> {
    let client = pool.ensure(host)?;
    let committish = format!("refs/tags/{}", build_num);
    let xml = client
        .fetch_file(manifest_repo, &committish, MANIFEST_FILE_NAME)
        .await
        .map_err(|e| {
            BuildLogError::Transport(format!(
                "failed to download manifest for build {}: {}",
                build_num, e
            ))
        })?;
    parse_repo_pins(&xml)
}

/// All commits present in `target` pins but not in `source` pins, one log
/// fetch per target repository, fanned out onto the runtime.
///
/// The result channel is sized to the number of spawned tasks so producers
/// always complete without blocking; the first per-repository failure
/// aborts the whole direction.
async fn additions(
    pool: &ClientPool,
    source: &HashMap<String, RepoPin>,
    target: &HashMap<String, RepoPin>,
) -> Result<RepoChangelog> {
    let mut repo_commits = RepoChangelog::new();
    if target.is_empty() {
        return Ok(repo_commits);
    }

    let (tx, mut rx) = mpsc::channel(target.len());
    for (repo_name, target_pin) in target {
        let client = pool.get(&target_pin.instance_url).ok_or_else(|| {
            BuildLogError::Config(format!("no client for host {}", target_pin.instance_url))
        })?;
        // A repository absent from the source build counts every commit
        // since its creation as an addition.
        let ancestor = source.get(repo_name).map(|pin| pin.committish.clone());
        let repo_name = repo_name.clone();
        let committish = target_pin.committish.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result =
                fetch_history(client.as_ref(), &repo_name, &committish, ancestor.as_deref()).await;
            // The channel holds one slot per task; send cannot block
            let _ = tx.send((repo_name, result)).await;
        });
    }
    drop(tx);

    while let Some((repo_name, result)) = rx.recv().await {
        let commits = match result {
            Ok(commits) => commits,
            Err(e) => {
                warn!(repo = %repo_name, error = %e, "Repository log fetch failed");
                return Err(e);
            }
        };
        if !commits.is_empty() {
            debug!(repo = %repo_name, commits = commits.len(), "Collected repository log");
            repo_commits.insert(repo_name, commits);
        }
    }
    Ok(repo_commits)
}

/// Generate a changelog between two build numbers.
///
/// `source_build` and `target_build` must match tags on `manifest_repo`
/// (for refs/tags/15049.0.0, pass "15049.0.0"). `host` is the instance the
/// manifest repository lives on; the manifests themselves may pin
/// repositories on other instances, for which clients are built on demand.
///
/// Returns `(additions, removals)`: commits added to the target build since
/// the source build, and commits present in the source build but absent
/// from the target.
pub async fn changelog(
    pool: &mut ClientPool,
    source_build: &str,
    target_build: &str,
    host: &str,
    manifest_repo: &str,
) -> Result<(RepoChangelog, RepoChangelog)> {
    info!(source = %source_build, target = %target_build, "Generating changelog");

    let source_pins = mapped_manifest(pool, host, manifest_repo, source_build).await?;
    let target_pins = mapped_manifest(pool, host, manifest_repo, target_build).await?;

    // Clients are built single-threaded here; the fan-out below only reads
    for pin in source_pins.values().chain(target_pins.values()) {
        pool.ensure(&pin.instance_url)?;
    }

    let (additions_result, removals_result) = tokio::join!(
        additions(pool, &source_pins, &target_pins),
        additions(pool, &target_pins, &source_pins),
    );
    let added = additions_result?;
    let removed = removals_result?;

    info!(
        added_repos = added.len(),
        removed_repos = removed.len(),
        "Changelog complete"
    );
    Ok((added, removed))
}
