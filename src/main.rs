//! nearline - near-duplicate line store

mod store_cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nearline")]
#[command(about = "Append-only line store that rejects near-duplicates", version)]
struct Cli {
    #[command(flatten)]
    store: store_cli::StoreArgs,
    #[command(subcommand)]
    command: store_cli::StoreCommands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    store_cli::run(cli.store, cli.command).await
}
