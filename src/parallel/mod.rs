//! Generic parallel execution framework
//!
//! Resource management and execution strategy only; nothing here knows about
//! files or categories.
//!
//! - [`ParallelExecutor`]: bounded worker pool over crossbeam channels and
//!   scoped threads, one result per work item, unordered completion
//! - [`SequentialExecutor`]: same contract on the calling thread
//! - [`ExecutionStrategy`]: picks one of the two and sizes the pool from
//!   `num_cpus` and user limits
//!
//! ```rust
//! use filesorter::parallel::ExecutionStrategy;
//!
//! let workers = ExecutionStrategy::calculate_optimal_workers(0, 100);
//! let strategy = ExecutionStrategy::Parallel { workers };
//! let mut doubled = strategy
//!     .execute(vec![1, 2, 3], |x, _worker_id| x * 2, None::<fn(usize, usize, usize)>)
//!     .unwrap();
//! doubled.sort();
//! assert_eq!(doubled, vec![2, 4, 6]);
//! ```

pub mod core;
pub mod progress;

pub use self::core::{ExecutionStrategy, ParallelExecutor, SequentialExecutor};
pub use progress::{BatchProgressReporter, BatchStats};
