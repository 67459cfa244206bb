use anyhow::Result;
use budget_alert_relay::{cli::Cli, run};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}
