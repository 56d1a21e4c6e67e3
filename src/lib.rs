//! # filesorter - parallel file categorization
//!
//! Sorts every regular file under a directory into
//! `<dir>/processed_files/<extension>/`, moving files concurrently on a bounded
//! worker pool and reporting one verdict for the whole batch.
//!
//! ## Features
//!
//! - **Bounded worker pool**: sized from the available cores, never one thread per file
//! - **Fail-soft batches**: a failing file never stops its siblings; every failure is reported
//! - **No silent overwrites**: an existing destination is a conflict unless configured otherwise
//! - **Layered configuration**: TOML/JSON/YAML files, `FILESORTER_*` environment, CLI flags
//!
//! ## Quick Start
//!
//! ```bash
//! # Sort ~/Downloads into ~/Downloads/processed_files/<ext>/
//! filesorter ~/Downloads
//!
//! # Preview, then resolve name clashes by renaming
//! filesorter --dry-run -v ~/Downloads
//! filesorter --conflict rename ~/Downloads
//! ```

pub mod cli;
pub mod config;
pub mod parallel;
pub mod sort;

pub use cli::{Cli, Output};
pub use config::{FileSorterConfig, SortSettings};

/// Result type alias for filesorter operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
