#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]

//! driutils CLI
//!
//! Command-line access to the metadata API, DuckDB and object storage

use clap::Parser;
use driutils::cli::{Cli, Runner};
use driutils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let runner = Runner::new(cli)?;

    logging::init(runner.log_level())?;

    runner.run().await?;
    Ok(())
}
