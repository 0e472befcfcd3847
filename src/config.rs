//! Configuration file handling
//!
//! Loads and manages the ~/.config/buildlog/config.yaml file: the Gerrit
//! and Gitiles hosts, the manifest repository, the repository-name prefix,
//! and the branch-to-release rules for repositories whose branch names do
//! not match the manifest repository's release branches.

use crate::{BuildLogError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Branch-to-release rule as stored in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRule {
    /// Regex applied to the change's branch; capture group 1 yields the
    /// release branch name
    pub pattern: String,

    /// Release branch used when the pattern does not capture
    pub default_release: String,
}

/// Compiled branch-to-release rule
#[derive(Debug, Clone)]
pub struct ReleaseRule {
    pub pattern: Regex,
    pub default_release: String,
}

/// Repository name -> compiled release rule
pub type ReleaseRules = HashMap<String, ReleaseRule>;

/// buildlog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Code-review instance changes are queried from
    #[serde(default = "default_gerrit_host")]
    pub gerrit_host: String,

    /// Git instance the manifest repository lives on (no scheme)
    #[serde(default = "default_gitiles_host")]
    pub gitiles_host: String,

    /// Repository holding one tagged snapshot per build
    #[serde(default = "default_manifest_repo")]
    pub manifest_repo: String,

    /// Prefix applied to code-review repository names before manifest
    /// lookup, for mirrored repositories
    #[serde(default = "default_repo_prefix")]
    pub repo_prefix: String,

    /// Per-repository branch-to-release rules
    #[serde(default = "default_branch_rules")]
    pub branch_rules: HashMap<String, BranchRule>,
}

fn default_gerrit_host() -> String {
    "https://cos-review.googlesource.com".to_string()
}

fn default_gitiles_host() -> String {
    "cos.googlesource.com".to_string()
}

fn default_manifest_repo() -> String {
    "cos/manifest-snapshots".to_string()
}

fn default_repo_prefix() -> String {
    "mirrors/cros/".to_string()
}

fn default_branch_rules() -> HashMap<String, BranchRule> {
    let mut rules = HashMap::new();
    rules.insert(
        "third_party/kernel".to_string(),
        BranchRule {
            pattern: "(.*)-cos-.*".to_string(),
            default_release: "master".to_string(),
        },
    );
    rules
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gerrit_host: default_gerrit_host(),
            gitiles_host: default_gitiles_host(),
            manifest_repo: default_manifest_repo(),
            repo_prefix: default_repo_prefix(),
            branch_rules: default_branch_rules(),
        }
    }
}

impl Config {
    /// Default config file location: ~/.config/buildlog/config.yaml
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("buildlog");
        path.push("config.yaml");
        path
    }

    /// Load from a YAML file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from `path` if given, else from the default location if it
    /// exists, else built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let p = Self::default_path();
                if p.exists() {
                    Self::load(&p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save to a YAML file, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Compile the branch rules; fails on an invalid pattern
    pub fn release_rules(&self) -> Result<ReleaseRules> {
        let mut rules = ReleaseRules::with_capacity(self.branch_rules.len());
        for (repo, rule) in &self.branch_rules {
            let pattern = Regex::new(&rule.pattern).map_err(|e| {
                BuildLogError::Config(format!("invalid branch rule for {}: {}", repo, e))
            })?;
            rules.insert(
                repo.clone(),
                ReleaseRule {
                    pattern,
                    default_release: rule.default_release.clone(),
                },
            );
        }
        Ok(rules)
    }
}
