//! Command-line interface for filesorter
//!
//! One positional directory argument plus flags that override configuration.
//! Exit codes: 0 when every file was relocated, 1 when any file failed (or the
//! configuration is invalid), 2 for usage errors.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod output;

pub use output::Output;

use crate::Result;
use crate::config::{
    ConfigOverrides, ConflictPolicy, ExecutionMode, FileSorterConfig, SortOverrides,
};
use crate::sort::{Dispatcher, discover_files};

/// Exit code for a missing or invalid directory argument (matches clap's usage errors)
pub const USAGE_EXIT_CODE: u8 = 2;

/// filesorter - sort every file in a directory tree into folders by extension
#[derive(Parser, Debug)]
#[command(name = "filesorter", version, about, long_about = None)]
pub struct Cli {
    /// Directory whose files are sorted into <DIRECTORY>/processed_files/<extension>/
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show what would be moved without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// What to do when the destination file already exists
    #[arg(long, value_enum)]
    pub conflict: Option<ConflictPolicy>,

    /// Processing mode
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,

    /// Maximum number of worker threads (0 = no cap)
    #[arg(long, value_name = "N")]
    pub max_threads: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON batch result on stdout
    Json,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<ExitCode> {
        setup_logging(self.verbose, self.quiet);

        let json = self.format == OutputFormat::Json;
        let output = Output::new(self.verbose > 0, self.quiet || json);

        let Some(directory) = self.directory.as_deref() else {
            output.error("Please provide a folder path as a command-line argument.");
            eprintln!("Example usage: filesorter /path/to/directory");
            return Ok(ExitCode::from(USAGE_EXIT_CODE));
        };

        if !directory.is_dir() {
            output.error(&format!("Not a directory: {}", directory.display()));
            return Ok(ExitCode::from(USAGE_EXIT_CODE));
        }

        let config = FileSorterConfig::load(self.config.as_deref(), Some(self.overrides()))?;
        let settings = config.sort_settings()?;

        output.info(&format!("The entered folder path is: {}", directory.display()));

        let discovery = discover_files(directory, &settings.destination)?;
        for warning in &discovery.warnings {
            output.warning(warning);
        }

        let show_progress = !(self.no_progress || self.quiet || json);
        let dispatcher = Dispatcher::new(settings)
            .with_dry_run(self.dry_run)
            .with_progress(show_progress);
        let result = dispatcher.run(directory, discovery.files)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            output.batch_summary(&result);
        }

        Ok(if result.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    /// Flags that were actually given, for the highest configuration layer
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sort: SortOverrides {
                conflict: self.conflict,
                mode: self.mode,
                max_threads: self.max_threads,
            },
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,ignore=warn,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    // Logs go to stderr so --format json keeps stdout parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
