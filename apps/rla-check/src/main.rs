#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod cli;
mod report;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Format};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let report = report::build(&cli)?;
    match cli.format {
        Format::Text => print!("{}", report.to_text()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
