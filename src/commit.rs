//! Commit records and git log wire types
//!
//! Raw commits arrive from the Gitiles log endpoint as JSON. They are parsed
//! into [`Commit`] records carrying the footer-extracted bug references and
//! release note used in changelog output.

use crate::{BuildLogError, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Footer key for bug references, e.g. `BUG=b/123,chromium:456`
const BUG_FOOTER: &str = "BUG=";
/// Footer key for release notes; the note runs to the end of the message
const RELEASE_NOTE_FOOTER: &str = "RELEASE_NOTE=";

/// Author/committer identity as returned by the log endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitPerson {
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Commit timestamp, e.g. "Tue Apr 29 00:49:12 2014 +0000"
    pub time: String,
}

/// A single commit from the Gitiles log endpoint, unparsed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommit {
    /// Commit SHA
    pub commit: String,
    #[serde(default)]
    pub author: Option<GitPerson>,
    #[serde(default)]
    pub committer: Option<GitPerson>,
    /// Full commit message including footers
    #[serde(default)]
    pub message: String,
}

impl RawCommit {
    /// Committer timestamp, parsed. Fails if the commit has no committer or
    /// the timestamp is not in git's date format.
    pub fn committer_time(&self) -> Result<DateTime<FixedOffset>> {
        let committer = self.committer.as_ref().ok_or_else(|| {
            BuildLogError::MalformedHistory(format!("commit {} has no committer", self.commit))
        })?;
        parse_git_time(&committer.time)
    }
}

/// Git's default date format uses a zero-padded day of month, but some
/// servers emit a space-padded one.
fn parse_git_time(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %Y %z")
        .or_else(|_| DateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y %z"))
        .map_err(|e| BuildLogError::Parse(format!("invalid commit time {:?}: {}", value, e)))
}

/// A parsed commit as it appears in changelog output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(rename = "SHA")]
    pub sha: String,
    #[serde(rename = "AuthorName")]
    pub author_name: String,
    #[serde(rename = "CommitterName")]
    pub committer_name: String,
    /// RFC 3339 committer timestamp
    #[serde(rename = "CommitTime")]
    pub commit_time: String,
    /// First line of the commit message
    #[serde(rename = "Subject")]
    pub subject: String,
    /// Bug references from the BUG= footer
    #[serde(rename = "Bugs")]
    pub bugs: Vec<String>,
    /// Text of the RELEASE_NOTE= footer, empty if absent
    #[serde(rename = "ReleaseNote")]
    pub release_note: String,
}

impl Commit {
    /// Parse a raw log entry into a changelog commit record
    pub fn from_raw(raw: &RawCommit) -> Result<Self> {
        let commit_time = raw.committer_time()?.to_rfc3339();
        let author_name = raw.author.as_ref().map(|p| p.name.clone()).unwrap_or_default();
        let committer_name = raw
            .committer
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let subject = raw.message.lines().next().unwrap_or_default().to_string();

        Ok(Commit {
            sha: raw.commit.clone(),
            author_name,
            committer_name,
            commit_time,
            subject,
            bugs: extract_bugs(&raw.message),
            release_note: extract_release_note(&raw.message),
        })
    }
}

/// Parse an accumulated log response, newest first
pub fn parse_commit_log(raw: &[RawCommit]) -> Result<Vec<Commit>> {
    raw.iter().map(Commit::from_raw).collect()
}

fn extract_bugs(message: &str) -> Vec<String> {
    let mut bugs = Vec::new();
    for line in message.lines() {
        if let Some(value) = line.strip_prefix(BUG_FOOTER) {
            for bug in value.split(',') {
                let bug = bug.trim();
                if !bug.is_empty() && !bug.eq_ignore_ascii_case("none") {
                    bugs.push(bug.to_string());
                }
            }
        }
    }
    bugs
}

/// The release note footer may span multiple lines; everything from the
/// footer key to the end of the message belongs to the note.
fn extract_release_note(message: &str) -> String {
    match message.find(RELEASE_NOTE_FOOTER) {
        Some(idx) => message[idx + RELEASE_NOTE_FOOTER.len()..].trim().to_string(),
        None => String::new(),
    }
}
