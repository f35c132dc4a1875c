use clap::Parser;
use kbqa_server::{cli::Cli, commands, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    commands::run(cli).await
}
