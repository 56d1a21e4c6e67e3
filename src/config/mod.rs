//! Configuration management for filesorter
//!
//! Settings are layered with figment (see [`core`]) and extracted into the
//! strongly typed [`SortSettings`] consumed by the sorting engine.

pub mod core;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

pub use self::core::{ConfigOverrides, FileSorterConfig, SortOverrides};

/// Behaviour when the destination file already exists
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave both files in place and report the conflict (first mover wins)
    #[default]
    Skip,
    /// Move under the first free `name (N).ext`
    Rename,
    /// Replace the existing destination file
    Overwrite,
}

/// Processing mode for determining parallelization strategy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Always use sequential processing
    Sequential,
    /// Always use the worker pool
    #[default]
    Parallel,
    /// Use the worker pool once the file count reaches `min_files_for_parallel`
    Auto,
}

/// The `[sort]` section of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    /// Directory created under the base directory that receives the categories
    pub destination: String,

    /// Conflict handling for an already existing destination file
    pub conflict: ConflictPolicy,

    /// Sequential, parallel or auto
    pub mode: ExecutionMode,

    /// Maximum worker threads (0 = no cap)
    pub max_threads: usize,

    /// Percentage of available cores to use (1-100)
    pub thread_percentage: u8,

    /// Threshold for `ExecutionMode::Auto`
    pub min_files_for_parallel: usize,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            destination: "processed_files".to_string(),
            conflict: ConflictPolicy::Skip,
            mode: ExecutionMode::Parallel,
            max_threads: 0,
            thread_percentage: 100,
            min_files_for_parallel: 16,
        }
    }
}

impl SortSettings {
    /// Validate settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let mut components = Path::new(&self.destination).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => anyhow::bail!(
                "sort.destination must be a single directory name, got '{}'",
                self.destination
            ),
        }

        if self.thread_percentage == 0 || self.thread_percentage > 100 {
            anyhow::bail!(
                "sort.thread_percentage must be between 1 and 100, got {}",
                self.thread_percentage
            );
        }

        Ok(())
    }
}
