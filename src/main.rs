use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use filesorter::Cli;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    cli.run()
}
