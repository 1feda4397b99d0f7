//! CPT CLI - historical versus projected temperature at a point.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "cpt-cli",
    version,
    about = "Point climate temperature toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: cpt_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    cpt_cmd::run(cli.command).await
}
