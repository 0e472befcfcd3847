//! buildlog - changelog and first-build lookup for manifest-pinned builds
//!
//! Main entry point for the buildlog CLI.

use buildlog::changelog::{changelog, RepoChangelog};
use buildlog::commit::Commit;
use buildlog::config::Config;
use buildlog::findbuild::{find_build, BuildRequest};
use buildlog::pool::ClientPool;
use buildlog::{logging, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

/// buildlog - changelog and first-build lookup between manifest snapshots
#[derive(Parser, Debug)]
#[command(name = "buildlog")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/buildlog/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gitiles instance the manifest repository lives on
    #[arg(long)]
    gitiles_host: Option<String>,

    /// Repository holding the tagged manifest snapshots
    #[arg(long)]
    manifest_repo: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the changelog between two build numbers
    Changelog {
        /// Source build number, e.g. 15049.0.0
        source: String,

        /// Target build number, e.g. 15055.0.0
        target: String,
    },

    /// Print the first build containing a change
    FindBuild {
        /// Change number, commit SHA, or change signature
        change_id: String,

        /// Code-review instance to locate the change on
        #[arg(long)]
        gerrit_host: Option<String>,

        /// Prefix applied to the change's repository before manifest lookup
        #[arg(long)]
        repo_prefix: Option<String>,
    },
}

/// Output wrapper matching the changelog file schema
#[derive(Serialize)]
struct RepoLog {
    #[serde(rename = "Commits")]
    commits: Vec<Commit>,
}

fn write_changelog_file(name: &str, log: RepoChangelog) -> Result<()> {
    let wrapped: HashMap<String, RepoLog> = log
        .into_iter()
        .map(|(repo, commits)| (repo, RepoLog { commits }))
        .collect();
    std::fs::write(name, serde_json::to_string_pretty(&wrapped)?)?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    let gitiles_host = cli.gitiles_host.unwrap_or(config.gitiles_host.clone());
    let manifest_repo = cli.manifest_repo.unwrap_or(config.manifest_repo.clone());

    match cli.command {
        Commands::Changelog { source, target } => {
            let mut pool = ClientPool::gitiles();
            let (additions, removals) =
                changelog(&mut pool, &source, &target, &gitiles_host, &manifest_repo).await?;

            let additions_file = format!("{} -> {}.json", source, target);
            let removals_file = format!("{} -> {}.json", target, source);
            write_changelog_file(&additions_file, additions)?;
            write_changelog_file(&removals_file, removals)?;
            println!("Wrote \"{}\" and \"{}\"", additions_file, removals_file);
        }
        Commands::FindBuild {
            change_id,
            gerrit_host,
            repo_prefix,
        } => {
            let request = BuildRequest {
                gerrit_host: gerrit_host.unwrap_or(config.gerrit_host.clone()),
                gitiles_host,
                manifest_repo,
                repo_prefix: repo_prefix.unwrap_or(config.repo_prefix.clone()),
                change_id,
            };
            let rules = config.release_rules()?;
            let response = find_build(&request, &rules).await?;
            println!("{}", response.build_num);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init() {
        eprintln!("warning: {}", e);
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
