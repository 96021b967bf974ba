use clap::Parser;
use tracing_subscriber::EnvFilter;

use apiary::cli::{Commands, run_info, run_init, run_replay, run_sweep};

#[derive(Parser)]
#[command(name = "apiary")]
#[command(about = "Operator tools for a log-replicated schema registry node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("apiary=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { node } => run_init(&node)?,
        Commands::Info { node, json } => run_info(&node, json)?,
        Commands::Replay { node } => run_replay(&node)?,
        Commands::Sweep {
            node,
            canonical_limit,
        } => run_sweep(&node, canonical_limit).await?,
    }

    Ok(())
}
