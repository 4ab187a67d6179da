//! Agent updater - keeps the agent and its messenger current and running

use clap::Parser;

use agent_updater::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
