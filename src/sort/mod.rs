//! Batch file categorization
//!
//! ```text
//! discover ──▶ Dispatcher ──(worker pool)──▶ Relocator ──▶ categorize
//!                  ▲                             │
//!                  └──── RelocationOutcome ◀─────┘
//! ```
//!
//! Each file lands in `<base>/processed_files/<category>/<file name>`, where
//! the category is the lowercased extension or `_noext`.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use filesorter::config::SortSettings;
//! use filesorter::sort::{Dispatcher, discover_files};
//!
//! # fn example() -> anyhow::Result<()> {
//! let base = Path::new("/tmp/downloads");
//! let settings = SortSettings::default();
//! let discovery = discover_files(base, &settings.destination)?;
//! let result = Dispatcher::new(settings).run(base, discovery.files)?;
//!
//! for failed in &result.failures {
//!     eprintln!("{}: {}", failed.source.display(), failed.failure);
//! }
//! # Ok(())
//! # }
//! ```

pub mod category;
pub mod discover;
pub mod dispatch;
pub mod relocate;
pub mod types;

pub use category::{CategoryKey, NO_EXTENSION_KEY, categorize};
pub use discover::{Discovery, discover_files};
pub use dispatch::Dispatcher;
pub use relocate::{DryRunClaims, Relocator, ensure_dir};
pub use types::{
    BatchResult, BatchStatus, FailedFile, FailureKind, FileTask, RelocatedFile, RelocationFailure,
    RelocationOutcome,
};
