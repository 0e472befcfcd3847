//! buildlog - changelog and first-build lookup for manifest-pinned builds
//!
//! Releases are defined by snapshot manifests: XML files that pin every
//! constituent repository to an exact revision, committed to a manifest
//! repository and tagged with a build number. buildlog answers two
//! questions over that history:
//!
//! 1. **Changelog** - which commits were added to (and removed from) each
//!    repository between two builds.
//! 2. **Find-build** - which build first contained a given change.
//!
//! # Architecture
//!
//! - **manifest**: snapshot XML parsing into repository pins
//! - **gitiles** / **gerrit**: host-bound REST clients behind narrow traits
//! - **pool**: per-host client cache, request-scoped
//! - **history**: paged commit-log retrieval with growing page sizes
//! - **changelog**: concurrent fan-out over repositories, both directions
//! - **findbuild**: change location, manifest windowing, build resolution
//! - **config**: hosts, manifest repository, branch-to-release rules

pub mod changelog;
pub mod commit;
pub mod config;
pub mod error;
pub mod findbuild;
pub mod gerrit;
pub mod gitiles;
pub mod history;
pub mod logging;
pub mod manifest;
pub mod pool;

// Re-exports
pub use error::{BuildLogError, Result};
