//! Paged commit log retrieval
//!
//! Revision histories can run to tens of thousands of commits. Pages are
//! requested with exponentially growing sizes so short histories cost one
//! small round trip while long ones converge on the server's maximum page
//! size. Pages concatenate in call order, preserving the server's
//! newest-first topological ordering.

use crate::commit::{parse_commit_log, Commit, RawCommit};
use crate::gitiles::GitClient;
use crate::Result;
use std::time::Instant;
use tracing::debug;

const DEFAULT_PAGE_SIZE: u32 = 1000;
const PAGE_SIZE_GROWTH_MULTIPLIER: u32 = 5;
const MAX_PAGE_SIZE: u32 = 10_000;

/// All commits reachable from `committish` but not from `ancestor`
/// (no lower bound when `ancestor` is `None` or empty), newest first,
/// still in wire form.
///
/// Any page failing fails the whole fetch; partial histories are never
/// returned.
pub async fn fetch_raw_history(
    client: &dyn GitClient,
    repo: &str,
    committish: &str,
    ancestor: Option<&str>,
) -> Result<Vec<RawCommit>> {
    let start = Instant::now();
    let mut page_size = DEFAULT_PAGE_SIZE;
    let mut page = client
        .log_page(repo, committish, ancestor, page_size, None)
        .await?;
    let mut all_commits = page.log;

    while let Some(token) = page.next_page_token.take() {
        if page_size < MAX_PAGE_SIZE {
            page_size *= PAGE_SIZE_GROWTH_MULTIPLIER;
        }
        page = client
            .log_page(repo, committish, ancestor, page_size, Some(&token))
            .await?;
        all_commits.append(&mut page.log);
    }

    debug!(
        repo = %repo,
        commits = all_commits.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Retrieved commit log"
    );
    Ok(all_commits)
}

/// As [`fetch_raw_history`], with the accumulated log parsed into
/// [`Commit`] records at the end.
pub async fn fetch_history(
    client: &dyn GitClient,
    repo: &str,
    committish: &str,
    ancestor: Option<&str>,
) -> Result<Vec<Commit>> {
    let raw = fetch_raw_history(client, repo, committish, ancestor).await?;
    parse_commit_log(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::GitPerson;
    use crate::gitiles::LogPage;
    use crate::BuildLogError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn raw_commit(id: usize) -> RawCommit {
        RawCommit {
            commit: format!("sha{:05}", id),
            author: None,
            committer: Some(GitPerson {
                name: "C".to_string(),
                email: "c@x".to_string(),
                time: "Tue Apr 29 00:49:12 2014 +0000".to_string(),
            }),
            message: format!("commit {}\n", id),
        }
    }

    /// Serves a fixed history in pages of exactly the requested size and
    /// records the page sizes it saw.
    struct PagingHost {
        commits: Vec<RawCommit>,
        requested_sizes: Mutex<Vec<u32>>,
        fail_on_page: Option<usize>,
    }

    #[async_trait]
    impl GitClient for PagingHost {
        async fn fetch_file(&self, _: &str, _: &str, _: &str) -> Result<String> {
            unimplemented!()
        }

        async fn log_page(
            &self,
            _: &str,
            _: &str,
            _: Option<&str>,
            page_size: u32,
            page_token: Option<&str>,
        ) -> Result<LogPage> {
            let mut sizes = self.requested_sizes.lock().unwrap();
            let page_index = sizes.len();
            sizes.push(page_size);
            if self.fail_on_page == Some(page_index) {
                return Err(BuildLogError::Transport("injected page failure".to_string()));
            }

            let offset: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            let end = (offset + page_size as usize).min(self.commits.len());
            let next_page_token = if end < self.commits.len() {
                Some(end.to_string())
            } else {
                None
            };
            Ok(LogPage {
                log: self.commits[offset..end].to_vec(),
                next_page_token,
            })
        }

        async fn refs(&self, _: &str, _: &str) -> Result<HashMap<String, String>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_page_sizes_grow_exponentially() {
        let host = PagingHost {
            commits: (0..17_000).map(raw_commit).collect(),
            requested_sizes: Mutex::new(Vec::new()),
            fail_on_page: None,
        };
        let history = fetch_raw_history(&host, "repo", "HEAD", None).await.unwrap();
        assert_eq!(history.len(), 17_000);
        // 1000 + 5000 + 10000 pages cover 16000; one more page drains the rest
        assert_eq!(*host.requested_sizes.lock().unwrap(), vec![1000, 5000, 10_000, 10_000]);
    }

    #[tokio::test]
    async fn test_concatenation_preserves_order() {
        let commits: Vec<RawCommit> = (0..2500).map(raw_commit).collect();
        let host = PagingHost {
            commits: commits.clone(),
            requested_sizes: Mutex::new(Vec::new()),
            fail_on_page: None,
        };
        let history = fetch_raw_history(&host, "repo", "HEAD", None).await.unwrap();
        let expected: Vec<String> = commits.iter().map(|c| c.commit.clone()).collect();
        let actual: Vec<String> = history.iter().map(|c| c.commit.clone()).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_single_page_history() {
        let host = PagingHost {
            commits: (0..3).map(raw_commit).collect(),
            requested_sizes: Mutex::new(Vec::new()),
            fail_on_page: None,
        };
        let history = fetch_history(&host, "repo", "HEAD", None).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].sha, "sha00000");
        assert_eq!(*host.requested_sizes.lock().unwrap(), vec![1000]);
    }

    #[tokio::test]
    async fn test_page_failure_fails_whole_fetch() {
        let host = PagingHost {
            commits: (0..3000).map(raw_commit).collect(),
            requested_sizes: Mutex::new(Vec::new()),
            fail_on_page: Some(1),
        };
        let err = fetch_raw_history(&host, "repo", "HEAD", None).await.unwrap_err();
        assert!(matches!(err, BuildLogError::Transport(_)));
    }
}
