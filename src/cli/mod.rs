//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments
//! - Construct the GitHub reference store and delegate to [`crate::ensure`]
//! - Does NOT perform API calls directly

pub mod args;

pub use args::Cli;

use anyhow::Result;

use crate::ensure::ensure_branch_exists;
use crate::forge::github::GitHubRefStore;

/// Run the CLI application against parsed arguments.
///
/// Returns the human-readable outcome line on success.
pub async fn run(cli: Cli) -> Result<String> {
    let store = match cli.api_base {
        Some(api_base) => GitHubRefStore::with_api_base(cli.token, cli.owner, cli.repo, api_base),
        None => GitHubRefStore::new(cli.token, cli.owner, cli.repo),
    };

    let outcome = ensure_branch_exists(&store, &cli.branch, &cli.base).await?;
    Ok(format!("branch '{}' {}", cli.branch, outcome))
}
