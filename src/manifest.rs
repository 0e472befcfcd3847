//! XML parser for build manifest snapshots
//!
//! A snapshot pins every constituent repository to an exact revision for one
//! build. Parsing is tolerant of unknown elements and attributes so that new
//! manifest generations remain readable.
//!
//! # Example Snapshot
//!
//! ```xml
//! <manifest>
//!   <remote name="cos" fetch="https://cos.googlesource.com" />
//!   <default remote="cos" revision="refs/heads/main" />
//!   <project name="third_party/kernel" revision="f9020a1..."
//!            dest-branch="refs/heads/cos-5.10" />
//! </manifest>
//! ```

use crate::{BuildLogError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

/// Where a repository's history lives and which commit a build pinned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPin {
    /// Host the repository is served from, scheme stripped
    pub instance_url: String,
    /// Pinned committish: a SHA, a ref, or an ancestor expression
    pub committish: String,
}

/// A project entry in a snapshot
#[derive(Debug, Clone)]
pub struct Project {
    /// Repository name, unique within a manifest
    pub name: String,
    /// Pinned revision
    pub revision: String,
    /// Remote name; resolves through the default remote when absent
    pub remote: Option<String>,
    /// Target ref path, e.g. "refs/heads/main"
    pub dest_branch: Option<String>,
}

impl Project {
    /// Branch name with any leading refs/heads/ stripped, empty if the
    /// project carries no dest-branch (which matches any branch).
    pub fn branch(&self) -> &str {
        match self.dest_branch.as_deref() {
            Some(b) => b.strip_prefix("refs/heads/").unwrap_or(b),
            None => "",
        }
    }
}

/// A parsed manifest snapshot
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Remote name -> fetch URL, scheme stripped. The default remote is
    /// installed under the empty key so unqualified projects resolve.
    remotes: HashMap<String, String>,
    /// Projects in document order
    pub projects: Vec<Project>,
}

impl Manifest {
    /// Parse a snapshot from XML content
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut remotes: HashMap<String, String> = HashMap::new();
        let mut default_remote: Option<String> = None;
        let mut projects = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                    b"manifest" => saw_root = true,
                    b"remote" => {
                        let name = require_attr(e, b"name")?;
                        let fetch = require_attr(e, b"fetch")?;
                        remotes.insert(name, strip_scheme(&fetch));
                    }
                    b"default" => {
                        default_remote = get_attr(e, b"remote")?;
                    }
                    b"project" => {
                        projects.push(Project {
                            name: require_attr(e, b"name")?,
                            revision: require_attr(e, b"revision")?,
                            remote: get_attr(e, b"remote")?,
                            dest_branch: get_attr(e, b"dest-branch")?,
                        });
                    }
                    // Unknown elements are allowed for forward compatibility
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(BuildLogError::MalformedManifest(format!(
                        "error parsing snapshot XML: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        if !saw_root {
            return Err(BuildLogError::MalformedManifest(
                "missing manifest root element".to_string(),
            ));
        }
        let default_remote = default_remote.ok_or_else(|| {
            BuildLogError::MalformedManifest("missing default remote".to_string())
        })?;
        let default_url = remotes.get(&default_remote).cloned().unwrap_or_default();
        remotes.insert(String::new(), default_url);

        Ok(Manifest { remotes, projects })
    }

    /// Resolve the instance URL for a project, falling back to the default
    /// remote when the project has none.
    pub fn remote_url(&self, project: &Project) -> String {
        let remote = project.remote.as_deref().unwrap_or("");
        self.remotes.get(remote).cloned().unwrap_or_default()
    }

    /// Collapse the snapshot into a repository name -> pin mapping.
    /// Project names are unique within a manifest.
    pub fn repo_pins(&self) -> HashMap<String, RepoPin> {
        let mut pins = HashMap::with_capacity(self.projects.len());
        for project in &self.projects {
            pins.insert(
                project.name.clone(),
                RepoPin {
                    instance_url: self.remote_url(project),
                    committish: project.revision.clone(),
                },
            );
        }
        pins
    }
}

/// Parse a snapshot and collapse it to the pin mapping in one step
pub fn parse_repo_pins(xml: &str) -> Result<HashMap<String, RepoPin>> {
    Ok(Manifest::parse(xml)?.repo_pins())
}

fn strip_scheme(url: &str) -> String {
    url.strip_prefix("https://").unwrap_or(url).to_string()
}

fn get_attr(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr
            .map_err(|e| BuildLogError::MalformedManifest(format!("invalid attribute: {}", e)))?;
        if attr.key.as_ref() == name {
            let value = attr.unescape_value().map_err(|e| {
                BuildLogError::MalformedManifest(format!("invalid attribute value: {}", e))
            })?;
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn require_attr(e: &BytesStart, name: &[u8]) -> Result<String> {
    get_attr(e, name)?.ok_or_else(|| {
        BuildLogError::MalformedManifest(format!(
            "missing required attribute: {}",
            String::from_utf8_lossy(name)
        ))
    })
}
