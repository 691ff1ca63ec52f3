//! A fixed-size thread pool with a priority queue, used by the provider to
//! run every resource load off the caller's thread.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::{debug, trace};

/// Default number of worker threads if none is requested explicitly.
pub const DEFAULT_THREAD_COUNT: usize = 10;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct ScheduledTask {
    priority: i64,
    sequence: u64,
    task: Task,
}

impl ScheduledTask {
    fn key(&self) -> (Reverse<i64>, Reverse<u64>) {
        // BinaryHeap is a max-heap; wrapping both fields in `Reverse` makes
        // the lowest priority value (and, for ties, the earliest inserted
        // task) compare greatest, so it pops first.
        (Reverse(self.priority), Reverse(self.sequence))
    }
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

struct Queue {
    heap: BinaryHeap<ScheduledTask>,
    shut_down: bool,
}

/// A fixed-size pool of OS threads that run submitted tasks in priority
/// order (lower numeric priority first, FIFO among equal priorities).
///
/// Dropping the pool stops accepting new work, wakes every worker, and
/// joins all of them. Tasks still sitting in the queue are discarded;
/// a task that has already started is always allowed to finish.
pub struct WorkerPool {
    queue: Arc<Mutex<Queue>>,
    condvar: Arc<Condvar>,
    sequence: Arc<AtomicU64>,
    workers: Vec<JoinHandle<()>>,
    worker_ids: Vec<std::thread::ThreadId>,
}

impl WorkerPool {
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let queue = Arc::new(Mutex::new(Queue {
            heap: BinaryHeap::new(),
            shut_down: false,
        }));
        let condvar = Arc::new(Condvar::new());
        let sequence = Arc::new(AtomicU64::new(0));

        let workers: Vec<JoinHandle<()>> = (0..thread_count)
            .map(|index| {
                let queue = Arc::clone(&queue);
                let condvar = Arc::clone(&condvar);
                std::thread::Builder::new()
                    .name(format!("respool-worker-{index}"))
                    .spawn(move || worker_loop(queue, condvar))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        let worker_ids = workers.iter().map(|w| w.thread().id()).collect();

        debug!("worker pool started with {thread_count} threads");

        Self {
            queue,
            condvar,
            sequence,
            workers,
            worker_ids,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues a task to run at the given priority (lower runs sooner).
    /// Returns [`crate::error::ProviderError::PoolShutDown`] if the pool is
    /// already shutting down.
    pub fn enqueue(
        &self,
        priority: i64,
        task: impl FnOnce() + Send + 'static,
    ) -> Result<(), crate::error::ProviderError> {
        let mut queue = self.queue.lock().unwrap();
        if queue.shut_down {
            return Err(crate::error::ProviderError::PoolShutDown);
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        queue.heap.push(ScheduledTask {
            priority,
            sequence,
            task: Box::new(task),
        });
        drop(queue);
        self.condvar.notify_one();
        Ok(())
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_THREAD_COUNT)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut queue = self.queue.lock().unwrap();
            queue.shut_down = true;
            let discarded = queue.heap.len();
            queue.heap.clear();
            if discarded > 0 {
                debug!("worker pool shutting down, discarding {discarded} queued task(s)");
            }
        }
        self.condvar.notify_all();

        // A task holds its own clone of the provider (and transitively of
        // this pool), so the last reference can be dropped from inside a
        // worker thread that is finishing that very task. Joining would
        // then mean a thread joining itself, which deadlocks forever.
        // Detach instead: the thread is already on its way out once it
        // observes `shut_down`.
        let current = std::thread::current().id();
        if self.worker_ids.contains(&current) {
            debug!("worker pool dropped from within one of its own workers, detaching threads");
            self.workers.clear();
            return;
        }

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(queue: Arc<Mutex<Queue>>, condvar: Arc<Condvar>) {
    loop {
        let task = {
            let mut guard = queue.lock().unwrap();
            loop {
                if let Some(scheduled) = guard.heap.pop() {
                    break Some(scheduled.task);
                }
                if guard.shut_down {
                    break None;
                }
                guard = condvar.wait(guard).unwrap();
            }
        };

        let Some(task) = task else {
            return;
        };

        trace!("worker running task");
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)).is_err() {
            debug!("worker task panicked, continuing");
        }
    }
}
