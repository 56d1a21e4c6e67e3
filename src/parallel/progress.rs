use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Relocation counters tracked atomically across worker threads
#[derive(Debug, Default)]
pub struct BatchStats {
    pub relocated: AtomicUsize,
    pub failed: AtomicUsize,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_relocated(&self) {
        self.relocated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_counts(&self) -> (usize, usize) {
        (
            self.relocated.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

/// Progress bar with live relocated/failed statistics
#[derive(Clone)]
pub struct BatchProgressReporter {
    bar: ProgressBar,
    stats: Arc<BatchStats>,
    workers: usize,
}

impl BatchProgressReporter {
    /// Create a reporter drawing to stderr (hidden when stderr is not a terminal)
    pub fn new(total_files: usize, workers: usize) -> Self {
        Self::with_target(total_files, workers, ProgressDrawTarget::stderr())
    }

    /// Create a reporter that never draws; statistics are still tracked
    pub fn hidden(total_files: usize, workers: usize) -> Self {
        Self::with_target(total_files, workers, ProgressDrawTarget::hidden())
    }

    fn with_target(total_files: usize, workers: usize, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total_files as u64), target);
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} files {spinner} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);

        Self {
            bar,
            stats: Arc::new(BatchStats::new()),
            workers,
        }
    }

    /// Record completion of one file; matches the executor's reporter signature
    pub fn report(&self, completed: usize, total: usize, _worker_id: usize) {
        self.bar.set_position(completed as u64);

        let (relocated, failed) = self.stats.get_counts();
        if completed % 25 == 0 || completed == total {
            self.bar.set_message(format!(
                "relocated: {relocated} | failed: {failed} | workers: {}",
                self.workers
            ));
        }
    }

    /// Shared statistics for the task closures
    pub fn stats(&self) -> Arc<BatchStats> {
        self.stats.clone()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
