//! Command implementations for the point temperature CLI.
//!
//! Hosts the [`pipeline::Pipeline`] service that ties validation, the
//! query cache, retrieval and aggregation together, plus the `query`
//! subcommand built on it.

use clap::Subcommand;

pub mod config;
pub mod pipeline;
pub mod query;

#[derive(Subcommand)]
pub enum Command {
    /// Historical and projected monthly temperature at one point
    Query(query::QueryArgs),
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Query(args) => query::run_query(&args).await,
    }
}
