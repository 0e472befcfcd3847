//! Error types for buildlog
//!
//! Defines a comprehensive error enum covering all failure modes across the system.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for buildlog operations
pub type Result<T> = std::result::Result<T, BuildLogError>;

/// Comprehensive error type for buildlog operations
#[derive(Error, Debug)]
pub enum BuildLogError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote call failures (non-2xx responses, unreachable hosts)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A requested file or object does not exist on the remote
    #[error("Not found: {0}")]
    NotFound(String),

    /// Manifest XML that violates the snapshot schema
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// A commit record in the manifest history is missing required data
    #[error("Malformed history: {0}")]
    MalformedHistory(String),

    /// A tag ref that does not have the refs/tags/<buildNum> shape
    #[error("Malformed tag ref: {0}")]
    MalformedTag(String),

    /// The change identifier matched nothing in the code review instance
    #[error("Change not found in the code review instance")]
    ChangeNotFound,

    /// The change identifier matched more than one change (cherry-picks
    /// share a change signature)
    #[error("Change identifier does not map to a unique commit")]
    AmbiguousIdentifier,

    /// The matched change has no submission timestamp
    #[error("Change has not been submitted")]
    ChangeNotSubmitted,

    /// No manifest in the search window pins the change's repository and branch
    #[error("No manifest found pinning the change's repository and branch")]
    NoBranchMatch,

    /// The change's repository moved hosts partway through the search window
    #[error("Remote URL for repository {repo} changed in build {build}")]
    InconsistentRemote { repo: String, build: String },

    /// A windowed manifest commit has no build tag
    #[error("No tag found for manifest commit {0}")]
    UnmappedManifest(String),

    /// The change is not reachable from any build in the window
    #[error("No build found containing the change")]
    ChangeNotLanded,

    /// Parsing errors (XML, JSON, timestamps)
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
