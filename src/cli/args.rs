//! cli::args
//!
//! Command-line argument definitions using clap derive.

use clap::Parser;

/// Branchward - ensure a branch exists on a GitHub repository
///
/// Creates the branch from the base branch if absent. Idempotent and safe to
/// run from concurrent jobs.
#[derive(Parser, Debug)]
#[command(name = "branchward")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Repository owner (user or organization)
    #[arg(long)]
    pub owner: String,

    /// Repository name
    #[arg(long)]
    pub repo: String,

    /// Branch to ensure exists
    #[arg(long)]
    pub branch: String,

    /// Base branch to create from when absent
    #[arg(long, default_value = "main")]
    pub base: String,

    /// GitHub token (or set GITHUB_TOKEN)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: String,

    /// API base URL (for GitHub Enterprise)
    #[arg(long)]
    pub api_base: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}
