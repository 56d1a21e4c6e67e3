use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::relocate::{DryRunClaims, Relocator};
use super::types::{BatchResult, FailureKind, FileTask, RelocationFailure, RelocationOutcome};
use crate::config::{ExecutionMode, SortSettings};
use crate::parallel::{BatchProgressReporter, ExecutionStrategy};

/// Runs one batch: a relocation task per file on the worker pool, then a single verdict.
///
/// Fail-soft: every task runs to completion regardless of sibling failures, and
/// every input file yields exactly one outcome in the [`BatchResult`].
pub struct Dispatcher {
    relocator: Arc<Relocator>,
    settings: SortSettings,
    strategy: Option<ExecutionStrategy>,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(settings: SortSettings) -> Self {
        Self {
            relocator: Arc::new(Relocator::new(&settings)),
            settings,
            strategy: None,
            show_progress: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.relocator = Arc::new(Relocator::new(&self.settings).with_dry_run(dry_run));
        self
    }

    /// Bypass the configured mode and use this strategy for every batch
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Draw a progress bar on stderr while the batch runs
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Strategy for a batch of `file_count` files
    pub fn strategy_for(&self, file_count: usize) -> ExecutionStrategy {
        if let Some(strategy) = &self.strategy {
            return strategy.clone();
        }

        match self.settings.mode {
            ExecutionMode::Sequential => ExecutionStrategy::Sequential,
            ExecutionMode::Parallel | ExecutionMode::Auto => {
                let workers = ExecutionStrategy::calculate_optimal_workers(
                    self.settings.max_threads,
                    self.settings.thread_percentage,
                );

                if self.settings.mode == ExecutionMode::Auto {
                    ExecutionStrategy::auto(
                        file_count,
                        self.settings.min_files_for_parallel,
                        workers,
                    )
                } else {
                    ExecutionStrategy::Parallel { workers }
                }
            }
        }
    }

    /// Relocate every file in `files` into the category tree under `base_dir`
    pub fn run<I>(&self, base_dir: &Path, files: I) -> Result<BatchResult>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let relocator = self.relocator.clone();
        let claims = Arc::new(DryRunClaims::new());
        self.run_with(base_dir, files, move |task| {
            relocator.relocate_in_batch(task, &claims)
        })
    }

    fn run_with<I, F>(&self, base_dir: &Path, files: I, relocate: F) -> Result<BatchResult>
    where
        I: IntoIterator<Item = PathBuf>,
        F: Fn(&FileTask) -> RelocationOutcome + Send + Sync + 'static,
    {
        let start_time = Instant::now();
        let tasks: Vec<FileTask> = files
            .into_iter()
            .map(|source| FileTask::new(base_dir, source))
            .collect();
        let total = tasks.len();
        let strategy = self.strategy_for(total);
        let dry_run = self.relocator.is_dry_run();

        tracing::info!(
            base_dir = %base_dir.display(),
            files = total,
            workers = strategy.workers(),
            dry_run,
            "starting batch"
        );

        let reporter = if self.show_progress {
            BatchProgressReporter::new(total, strategy.workers())
        } else {
            BatchProgressReporter::hidden(total, strategy.workers())
        };
        let stats = reporter.stats();

        let outcomes = strategy.execute(
            tasks,
            move |task: FileTask, _worker_id| {
                let outcome = run_isolated(&relocate, &task);
                if outcome.is_success() {
                    stats.increment_relocated();
                } else {
                    stats.increment_failed();
                }
                (task.source, outcome)
            },
            Some({
                let reporter = reporter.clone();
                move |current: usize, total: usize, worker_id: usize| {
                    reporter.report(current, total, worker_id)
                }
            }),
        )?;
        reporter.finish();

        let result = BatchResult::from_outcomes(outcomes, dry_run, start_time.elapsed());

        tracing::info!(
            relocated = result.relocated.len(),
            failed = result.failures.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "batch finished"
        );

        Ok(result)
    }
}

/// Run one task, turning a panic into an `Other` failure for that file only
fn run_isolated<F>(relocate: &F, task: &FileTask) -> RelocationOutcome
where
    F: Fn(&FileTask) -> RelocationOutcome,
{
    panic::catch_unwind(AssertUnwindSafe(|| relocate(task))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());

        tracing::error!(source = %task.source.display(), "relocation task panicked: {message}");
        RelocationOutcome::Failure(RelocationFailure::new(
            FailureKind::Other,
            format!("task panicked: {message}"),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictPolicy;
    use crate::sort::types::BatchStatus;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn parallel_dispatcher() -> Dispatcher {
        Dispatcher::new(SortSettings::default())
            .with_strategy(ExecutionStrategy::Parallel { workers: 4 })
    }

    #[test]
    fn test_end_to_end_categorization() {
        let temp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["a.txt", "b.TXT", "c"]
            .iter()
            .map(|name| {
                let path = temp.path().join(name);
                write(&path, name);
                path
            })
            .collect();

        let result = parallel_dispatcher().run(temp.path(), files).unwrap();

        assert_eq!(result.status, BatchStatus::Success);
        assert_eq!(result.relocated.len(), 3);
        assert!(temp.path().join("processed_files/txt/a.txt").is_file());
        assert!(temp.path().join("processed_files/txt/b.TXT").is_file());
        assert!(temp.path().join("processed_files/_noext/c").is_file());
    }

    #[test]
    fn test_duplicate_destination_first_mover_wins() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("one/notes.txt");
        let second = temp.path().join("two/notes.txt");
        write(&first, "one");
        write(&second, "two");

        let result = parallel_dispatcher()
            .run(temp.path(), vec![first.clone(), second.clone()])
            .unwrap();

        assert_eq!(result.status, BatchStatus::Failure);
        assert_eq!(result.relocated.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].failure.kind, FailureKind::AlreadyExists);

        // Nothing overwritten, nothing lost
        let winner = fs::read_to_string(temp.path().join("processed_files/txt/notes.txt")).unwrap();
        let loser = &result.failures[0].source;
        let loser_contents = fs::read_to_string(loser).unwrap();
        let mut contents = vec![winner, loser_contents];
        contents.sort();
        assert_eq!(contents, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_partial_failure_batch() {
        let temp = TempDir::new().unwrap();
        let present_a = temp.path().join("a.md");
        let present_b = temp.path().join("b.rs");
        write(&present_a, "a");
        write(&present_b, "b");
        let missing = temp.path().join("vanished.txt");

        let result = parallel_dispatcher()
            .run(temp.path(), vec![present_a, missing.clone(), present_b])
            .unwrap();

        assert_eq!(result.status, BatchStatus::Failure);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].source, missing);
        assert_eq!(result.failures[0].failure.kind, FailureKind::NotFound);
        assert!(temp.path().join("processed_files/md/a.md").is_file());
        assert!(temp.path().join("processed_files/rs/b.rs").is_file());
    }

    #[test]
    fn test_every_input_yields_one_outcome() {
        let temp = TempDir::new().unwrap();
        let mut files = Vec::new();
        for i in 0..150 {
            let path = temp.path().join(format!("in/file{i}.ext{}", i % 7));
            if i % 10 != 0 {
                write(&path, "x");
            }
            files.push(path);
        }

        let strategies = [
            ExecutionStrategy::Sequential,
            ExecutionStrategy::Parallel { workers: 8 },
        ];
        for strategy in strategies {
            let base = temp.path().join(format!("out-{}", strategy.workers()));
            fs::create_dir_all(&base).unwrap();
            let dispatcher = Dispatcher::new(SortSettings::default())
                .with_strategy(strategy)
                .with_dry_run(true);
            let result = dispatcher.run(&base, files.clone()).unwrap();

            assert_eq!(result.total(), files.len());
            assert_eq!(result.failures.len(), 15);
            assert!(result.dry_run);
        }
    }

    #[test]
    fn test_many_real_moves_share_category_directories() {
        let temp = TempDir::new().unwrap();
        let extensions = ["txt", "jpg", "rs"];
        let files: Vec<PathBuf> = (0..300)
            .map(|i| {
                let path = temp
                    .path()
                    .join(format!("in/dir{}/file{i}.{}", i % 5, extensions[i % 3]));
                write(&path, &i.to_string());
                path
            })
            .collect();

        let result = Dispatcher::new(SortSettings::default())
            .with_strategy(ExecutionStrategy::Parallel { workers: 16 })
            .run(temp.path(), files.clone())
            .unwrap();

        assert_eq!(result.total(), files.len());
        assert_eq!(result.status, BatchStatus::Success);
        for (i, source) in files.iter().enumerate() {
            let destination = temp
                .path()
                .join("processed_files")
                .join(extensions[i % 3])
                .join(source.file_name().unwrap());
            assert!(!source.exists());
            assert_eq!(fs::read_to_string(destination).unwrap(), i.to_string());
        }
        let categories = fs::read_dir(temp.path().join("processed_files")).unwrap().count();
        assert_eq!(categories, extensions.len());
    }

    #[test]
    fn test_dry_run_predicts_real_verdict_on_name_clash() {
        for conflict in [ConflictPolicy::Skip, ConflictPolicy::Rename] {
            let temp = TempDir::new().unwrap();
            let files = vec![
                temp.path().join("one/notes.txt"),
                temp.path().join("two/notes.txt"),
            ];
            for file in &files {
                write(file, "x");
            }
            let dispatcher = |dry_run: bool| {
                Dispatcher::new(SortSettings {
                    conflict,
                    ..SortSettings::default()
                })
                .with_strategy(ExecutionStrategy::Parallel { workers: 4 })
                .with_dry_run(dry_run)
            };

            let predicted = dispatcher(true).run(temp.path(), files.clone()).unwrap();
            assert!(files.iter().all(|file| file.is_file()));
            let actual = dispatcher(false).run(temp.path(), files.clone()).unwrap();

            assert_eq!(predicted.status, actual.status, "{conflict:?}");
            assert_eq!(predicted.failures.len(), actual.failures.len(), "{conflict:?}");
            let destinations = |result: &BatchResult| {
                let mut paths: Vec<PathBuf> = result
                    .relocated
                    .iter()
                    .map(|relocated| relocated.destination.clone())
                    .collect();
                paths.sort();
                paths
            };
            assert_eq!(destinations(&predicted), destinations(&actual), "{conflict:?}");
        }
    }

    #[test]
    fn test_dry_run_claims_reset_between_batches() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.txt");
        write(&source, "a");
        let dispatcher = parallel_dispatcher().with_dry_run(true);

        assert!(dispatcher.run(temp.path(), vec![source.clone()]).unwrap().is_success());
        assert!(dispatcher.run(temp.path(), vec![source]).unwrap().is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_destination_root_fails_every_task() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let base = temp.path().join("locked");
        fs::create_dir(&base).unwrap();
        let files: Vec<PathBuf> = ["a.txt", "b.jpg", "c"]
            .iter()
            .map(|name| {
                let path = temp.path().join("src").join(name);
                write(&path, name);
                path
            })
            .collect();
        fs::set_permissions(&base, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore mode bits
        if fs::create_dir(base.join("probe")).is_ok() {
            return;
        }

        let result = parallel_dispatcher().run(&base, files.clone()).unwrap();
        fs::set_permissions(&base, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(result.status, BatchStatus::Failure);
        assert_eq!(result.failures_of(FailureKind::PermissionDenied).count(), 3);
        assert!(files.iter().all(|file| file.is_file()));
    }

    #[test]
    fn test_panicking_task_does_not_abort_siblings() {
        let temp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..6).map(|i| temp.path().join(format!("{i}.txt"))).collect();

        let result = parallel_dispatcher()
            .run_with(temp.path(), files, |task| {
                if task.source.ends_with("3.txt") {
                    panic!("injected failure");
                }
                RelocationOutcome::Success {
                    destination: task.source.clone(),
                }
            })
            .unwrap();

        assert_eq!(result.total(), 6);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].failure.kind, FailureKind::Other);
        assert!(result.failures[0].failure.detail.contains("injected failure"));
    }

    #[test]
    fn test_strategy_follows_settings() {
        let sequential = Dispatcher::new(SortSettings {
            mode: ExecutionMode::Sequential,
            ..SortSettings::default()
        });
        assert_eq!(sequential.strategy_for(1000), ExecutionStrategy::Sequential);

        let capped = Dispatcher::new(SortSettings {
            max_threads: 1,
            ..SortSettings::default()
        });
        assert_eq!(capped.strategy_for(1000), ExecutionStrategy::Parallel { workers: 1 });

        let auto = Dispatcher::new(SortSettings {
            mode: ExecutionMode::Auto,
            min_files_for_parallel: 10,
            ..SortSettings::default()
        });
        assert_eq!(auto.strategy_for(3), ExecutionStrategy::Sequential);
        assert!(matches!(auto.strategy_for(10), ExecutionStrategy::Parallel { .. }));
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let temp = TempDir::new().unwrap();
        let result = parallel_dispatcher().run(temp.path(), Vec::new()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.total(), 0);
    }
}
