use clap::Parser;
use harvester_cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    harvester_cli::run(Args::parse()).await
}
