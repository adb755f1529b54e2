use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use scansync::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads SCANSYNC_* variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "scansync=debug"
    } else {
        "scansync=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    scansync::cli::run(cli).await
}
