use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded worker pool fed through a bounded work queue.
///
/// Every work item is handed to exactly one worker and produces exactly one
/// result. Results come back in completion order, not submission order.
pub struct ParallelExecutor<T, R> {
    max_workers: usize,
    buffer_size: usize,
    _phantom: std::marker::PhantomData<(T, R)>,
}

/// Context for worker threads to avoid too many function parameters
struct WorkerContext<T, R, F, P> {
    worker_id: usize,
    work_rx: Receiver<T>,
    result_tx: Sender<R>,
    completed: Arc<AtomicUsize>,
    total_items: usize,
    processor: Arc<F>,
    progress_reporter: Option<Arc<P>>,
}

impl<T, R> ParallelExecutor<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            max_workers,
            buffer_size: max_workers * 2,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Execute work items on the pool using a producer-consumer pattern
    pub fn execute<F, P>(
        &self,
        work_items: Vec<T>,
        processor: F,
        progress_reporter: Option<P>,
    ) -> Result<Vec<R>>
    where
        F: Fn(T, usize) -> R + Send + Sync + 'static, // (item, worker_id)
        P: Fn(usize, usize, usize) + Send + Sync + 'static, // (completed, total, worker_id)
    {
        if work_items.is_empty() {
            return Ok(Vec::new());
        }

        let total_items = work_items.len();
        let actual_workers = std::cmp::min(self.max_workers, total_items);
        let (work_tx, work_rx): (Sender<T>, Receiver<T>) = bounded(self.buffer_size);
        let (result_tx, result_rx): (Sender<R>, Receiver<R>) = bounded(self.buffer_size);

        let completed = Arc::new(AtomicUsize::new(0));
        let processor = Arc::new(processor);
        let progress_reporter = progress_reporter.map(Arc::new);

        tracing::debug!(workers = actual_workers, items = total_items, "starting worker pool");

        crossbeam::thread::scope(|s| -> Result<Vec<R>> {
            for worker_id in 0..actual_workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    completed: completed.clone(),
                    total_items,
                    processor: processor.clone(),
                    progress_reporter: progress_reporter.clone(),
                };

                s.spawn(move |_| Self::worker_thread(ctx));
            }

            // Producer: the queue is bounded, so this blocks while workers are busy
            s.spawn(move |_| {
                for work_item in work_items {
                    if work_tx.send(work_item).is_err() {
                        break; // Workers dropped
                    }
                }
            });

            // Drop our copies so the collector sees the channel close
            drop(work_rx);
            drop(result_tx);

            Ok(Self::collect_results(result_rx, total_items))
        })
        .map_err(|_| anyhow::anyhow!("Thread panic occurred during parallel execution"))?
    }

    fn worker_thread<F, P>(ctx: WorkerContext<T, R, F, P>)
    where
        F: Fn(T, usize) -> R,
        P: Fn(usize, usize, usize),
    {
        while let Ok(work_item) = ctx.work_rx.recv() {
            let result = (ctx.processor)(work_item, ctx.worker_id);

            if ctx.result_tx.send(result).is_err() {
                break; // Collector dropped
            }

            let current = ctx.completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref reporter) = ctx.progress_reporter {
                reporter(current, ctx.total_items, ctx.worker_id);
            }
        }
    }

    fn collect_results(result_rx: Receiver<R>, total_items: usize) -> Vec<R> {
        let mut results = Vec::with_capacity(total_items);

        while let Ok(result) = result_rx.recv() {
            results.push(result);

            if results.len() >= total_items {
                break;
            }
        }

        results
    }
}

/// Single-threaded fallback with the same contract as [`ParallelExecutor`]
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn execute<T, R, F, P>(
        work_items: Vec<T>,
        processor: F,
        progress_reporter: Option<P>,
    ) -> Vec<R>
    where
        F: Fn(T, usize) -> R,
        P: Fn(usize, usize, usize),
    {
        let total_items = work_items.len();
        let mut results = Vec::with_capacity(total_items);

        for (index, work_item) in work_items.into_iter().enumerate() {
            results.push(processor(work_item, 0));

            if let Some(reporter) = &progress_reporter {
                reporter(index + 1, total_items, 0);
            }
        }

        results
    }
}

/// Execution strategy enum for choosing between parallel and sequential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel { workers: usize },
}

impl ExecutionStrategy {
    pub fn execute<T, R, F, P>(
        &self,
        work_items: Vec<T>,
        processor: F,
        progress_reporter: Option<P>,
    ) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T, usize) -> R + Send + Sync + 'static,
        P: Fn(usize, usize, usize) + Send + Sync + 'static,
    {
        match self {
            ExecutionStrategy::Sequential => Ok(SequentialExecutor::execute(
                work_items,
                processor,
                progress_reporter,
            )),
            ExecutionStrategy::Parallel { workers } => {
                ParallelExecutor::new(*workers).execute(work_items, processor, progress_reporter)
            }
        }
    }

    /// Number of threads this strategy runs work on
    pub fn workers(&self) -> usize {
        match self {
            ExecutionStrategy::Sequential => 1,
            ExecutionStrategy::Parallel { workers } => (*workers).max(1),
        }
    }

    /// Threshold decision between sequential and parallel execution.
    ///
    /// The caller supplies the worker count; this only compares the workload
    /// against `min_items_for_parallel`.
    ///
    /// ```rust
    /// use filesorter::parallel::ExecutionStrategy;
    ///
    /// let strategy = ExecutionStrategy::auto(5, 16, 8);
    /// assert!(matches!(strategy, ExecutionStrategy::Sequential));
    ///
    /// let strategy = ExecutionStrategy::auto(100, 16, 8);
    /// assert_eq!(strategy, ExecutionStrategy::Parallel { workers: 8 });
    /// ```
    pub fn auto(
        work_items_count: usize,
        min_items_for_parallel: usize,
        optimal_workers: usize,
    ) -> Self {
        if work_items_count >= min_items_for_parallel {
            ExecutionStrategy::Parallel {
                workers: optimal_workers,
            }
        } else {
            ExecutionStrategy::Sequential
        }
    }

    /// Maximum workers allowed by the host and the user's limits.
    ///
    /// ```text
    /// 1. available cores: num_cpus::get()
    /// 2. cores * thread_percentage / 100, at least 1
    /// 3. min(max_threads_config, step 2) when max_threads_config > 0
    /// ```
    pub fn calculate_optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
        let available_cores = num_cpus::get();

        let workers_by_percentage =
            std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

        if max_threads_config > 0 {
            std::cmp::min(max_threads_config, workers_by_percentage)
        } else {
            workers_by_percentage
        }
    }
}
