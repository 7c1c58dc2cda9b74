//! Binary entry point.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use branchward::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let default_filter = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let quiet = cli.quiet;
    let outcome = cli::run(cli).await?;
    if !quiet {
        println!("{}", outcome);
    }
    Ok(())
}
