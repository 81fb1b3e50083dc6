//! Bounded worker pool for library load tasks.
//!
//! Load work is blocking (backend I/O), so it runs on the blocking pool of a
//! dedicated tokio runtime capped at the configured worker count. Submitted
//! jobs wait in a priority heap; every submission schedules one drain step,
//! and a drain step always takes the highest-priority, oldest job. Queued
//! low-priority batch work therefore yields to anything more urgent.

use crate::config::LoaderConfig;
use crate::error::{LibraryError, Result};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::debug;

/// Scheduling priority of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

struct QueuedJob {
    priority: TaskPriority,
    seq: u64,
    run: Box<dyn FnOnce() + Send>,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then lower sequence number (older) first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

type JobQueue = Arc<Mutex<BinaryHeap<QueuedJob>>>;

/// Marks a task finished when dropped, whether it ran, panicked or was discarded.
struct FinishOnDrop(Arc<AtomicBool>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Cloneable view of a task's completion, for tracking a task whose
/// [`TaskHandle`] has been handed to someone else.
#[derive(Debug, Clone)]
pub struct TaskWatcher {
    finished: Arc<AtomicBool>,
}

impl TaskWatcher {
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Handle to a submitted task.
pub struct TaskHandle<T> {
    finished: Arc<AtomicBool>,
    result: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// True once the task has run or been discarded. Never blocks.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn watcher(&self) -> TaskWatcher {
        TaskWatcher {
            finished: Arc::clone(&self.finished),
        }
    }

    /// Block the current thread until the task finishes.
    ///
    /// Returns `None` if the task was discarded or panicked. Must not be
    /// called from an async context; use [`TaskHandle::join`] there.
    pub fn wait(self) -> Option<T> {
        self.result.blocking_recv().ok()
    }

    /// Wait for the task asynchronously.
    pub async fn join(self) -> Option<T> {
        self.result.await.ok()
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Bounded pool of worker threads running prioritized blocking tasks.
pub struct LoadExecutor {
    runtime: Option<Runtime>,
    queue: JobQueue,
    next_seq: AtomicU64,
    worker_threads: usize,
}

impl LoadExecutor {
    /// Create an executor running at most `worker_threads` tasks at once.
    pub fn new(worker_threads: usize) -> Result<Self> {
        if worker_threads == 0 {
            return Err(LibraryError::Config {
                message: "Load executor needs at least one worker thread".to_string(),
            });
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(worker_threads)
            .thread_name(LoaderConfig::WORKER_THREAD_NAME)
            .build()
            .map_err(|e| LibraryError::Config {
                message: format!("Failed to start load executor: {}", e),
            })?;

        debug!("Started load executor with {} workers", worker_threads);

        Ok(Self {
            runtime: Some(runtime),
            queue: Arc::new(Mutex::new(BinaryHeap::new())),
            next_seq: AtomicU64::new(0),
            worker_threads,
        })
    }

    /// Create an executor sized from [`LoaderConfig::default_worker_threads`].
    pub fn with_default_workers() -> Result<Self> {
        Self::new(LoaderConfig::default_worker_threads())
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Number of submitted jobs no worker has picked up yet.
    pub fn queued_jobs(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Queue `job` and return a handle to its result.
    pub fn submit<T, F>(&self, priority: TaskPriority, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let marker = FinishOnDrop(Arc::clone(&finished));

        // The task counts as finished before its result is delivered, so a
        // waiter that got the result never sees it as still running.
        let run: Box<dyn FnOnce() + Send> = Box::new(move || {
            let value = job();
            drop(marker);
            let _ = tx.send(value);
        });

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(QueuedJob { priority, seq, run });

        if let Some(runtime) = &self.runtime {
            let queue = Arc::clone(&self.queue);
            runtime.spawn_blocking(move || Self::run_next(&queue));
        }

        TaskHandle {
            finished,
            result: rx,
        }
    }

    fn run_next(queue: &JobQueue) {
        let job = queue.lock().unwrap_or_else(PoisonError::into_inner).pop();
        if let Some(job) = job {
            (job.run)();
        }
    }
}

impl Drop for LoadExecutor {
    fn drop(&mut self) {
        // Tasks already running finish on their own; queued ones are dropped.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        debug!("Load executor shut down");
    }
}

impl std::fmt::Debug for LoadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadExecutor")
            .field("worker_threads", &self.worker_threads)
            .field("queued_jobs", &self.queued_jobs())
            .finish()
    }
}
