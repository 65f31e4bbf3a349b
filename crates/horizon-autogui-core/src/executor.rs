//! Dedicated executor threads for context subtrees.
//!
//! Host-object accessors can be slow and are not required to be
//! thread-safe, so every context subtree routes its reads, writes, and
//! action invocations through one [`ContextExecutor`]: a single thread
//! draining a bounded queue in submission order. Host state is only ever
//! mutated from that thread.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::executor::ContextExecutor;
//!
//! let executor = ContextExecutor::new("example").unwrap();
//! let handle = executor.spawn(|| 6 * 7).unwrap();
//! assert_eq!(handle.wait(), Some(Ok(42)));
//! executor.stop_and_join();
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::TaskError;
use crate::logging::targets;
use crate::signal::panic_message;
use crate::thread_check::{is_issued_from_interactive, with_interactive_origin};
use crate::threadpool::{TaskHandle, task_channel};

/// Default capacity of an executor queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration of a [`ContextExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name of the executor thread.
    pub name: String,
    /// Stack size in bytes. `None` uses the platform default.
    pub stack_size: Option<usize>,
    /// Capacity of the job queue.
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "autogui-executor".to_string(),
            stack_size: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Builder for [`ContextExecutor`].
#[derive(Debug, Default)]
pub struct ExecutorBuilder {
    config: ExecutorConfig,
}

impl ExecutorBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the thread stack size.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Set the queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Start the executor.
    pub fn build(self) -> Result<ContextExecutor, TaskError> {
        ContextExecutor::with_config(self.config)
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

struct ExecutorState {
    running: AtomicBool,
    pending: AtomicUsize,
    thread_id: Mutex<Option<ThreadId>>,
}

/// A dedicated thread executing context tasks in submission order.
pub struct ContextExecutor {
    name: String,
    sender: Sender<Message>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<ExecutorState>,
}

impl ContextExecutor {
    /// Start an executor with the given thread name.
    pub fn new(name: impl Into<String>) -> Result<Self, TaskError> {
        ExecutorBuilder::new().name(name).build()
    }

    /// Start an executor with a custom configuration.
    pub fn with_config(config: ExecutorConfig) -> Result<Self, TaskError> {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let state = Arc::new(ExecutorState {
            running: AtomicBool::new(true),
            pending: AtomicUsize::new(0),
            thread_id: Mutex::new(None),
        });

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_state = state.clone();
        let handle = builder
            .spawn(move || {
                *thread_state.thread_id.lock() = Some(thread::current().id());
                executor_loop(receiver, &thread_state);
                thread_state.running.store(false, Ordering::Release);
            })
            .map_err(|e| TaskError::Spawn {
                name: config.name.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(target: targets::EXECUTOR, name = %config.name, "executor started");

        Ok(Self {
            name: config.name,
            sender,
            handle: Mutex::new(Some(handle)),
            state,
        })
    }

    /// The executor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the executor accepts work.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Number of queued or running jobs.
    pub fn pending_jobs(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// Returns true when called from this executor's own thread.
    ///
    /// Waiting on the executor from its own thread would deadlock, so nested
    /// submissions run inline instead.
    pub fn is_current_thread(&self) -> bool {
        *self.state.thread_id.lock() == Some(thread::current().id())
    }

    /// Queue a job. The interactive-origin flag of the caller is propagated
    /// to the job.
    pub fn execute<F>(&self, job: F) -> Result<(), TaskError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_running() {
            return Err(TaskError::ExecutorStopped(self.name.clone()));
        }
        let issued = is_issued_from_interactive();
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        let wrapped: Job = Box::new(move || with_interactive_origin(issued, job));
        match self.sender.try_send(Message::Run(wrapped)) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state.pending.fetch_sub(1, Ordering::AcqRel);
                Err(match e {
                    TrySendError::Full(_) => TaskError::QueueFull(self.name.clone()),
                    TrySendError::Disconnected(_) => TaskError::ExecutorStopped(self.name.clone()),
                })
            }
        }
    }

    /// Queue a task and return a handle to its result. A panicking task
    /// delivers [`TaskError::Panicked`].
    pub fn spawn<F, T>(&self, task: F) -> Result<TaskHandle<Result<T, TaskError>>, TaskError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (completion, handle) = task_channel();
        self.execute(move || {
            let result = catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
            completion.complete(result);
        })?;
        Ok(handle)
    }

    /// Stop accepting work. Queued jobs still run.
    pub fn stop(&self) {
        if self.state.running.swap(false, Ordering::AcqRel) {
            tracing::debug!(target: targets::EXECUTOR, name = %self.name, "executor stopping");
        }
        let _ = self.sender.try_send(Message::Shutdown);
    }

    /// Wait for the thread to exit. Returns false if already joined or the
    /// thread panicked.
    pub fn join(&self) -> bool {
        if self.is_current_thread() {
            return false;
        }
        match self.handle.lock().take() {
            Some(handle) => handle.join().is_ok(),
            None => false,
        }
    }

    /// Stop, then join.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl Drop for ContextExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ContextExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextExecutor")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

fn executor_loop(receiver: Receiver<Message>, state: &ExecutorState) {
    loop {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(Message::Run(job)) => run_job(job, state),
            Ok(Message::Shutdown) => {
                // Drain what was queued before the shutdown request
                while let Ok(message) = receiver.try_recv() {
                    if let Message::Run(job) = message {
                        run_job(job, state);
                    }
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !state.running.load(Ordering::Acquire) && state.pending.load(Ordering::Acquire) == 0 {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Run one job; a panic is logged and the thread keeps serving the queue.
fn run_job(job: Job, state: &ExecutorState) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(
            target: targets::EXECUTOR,
            panic = %panic_message(payload.as_ref()),
            "executor job panicked"
        );
    }
    state.pending.fetch_sub(1, Ordering::AcqRel);
}

static_assertions::assert_impl_all!(ContextExecutor: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_check::{clear_interactive_thread, set_interactive_thread};

    #[test]
    fn test_jobs_run_in_order() {
        let executor = ContextExecutor::new("order").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            executor.execute(move || order.lock().push(i)).unwrap();
        }
        assert!(executor.stop_and_join());
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panic_becomes_error() {
        let executor = ContextExecutor::new("panics").unwrap();
        let handle = executor.spawn(|| -> i32 { panic!("accessor failed") }).unwrap();
        assert_eq!(
            handle.wait(),
            Some(Err(TaskError::Panicked("accessor failed".to_string())))
        );
        // The executor survives the panic
        let handle = executor.spawn(|| 1).unwrap();
        assert_eq!(handle.wait(), Some(Ok(1)));
        executor.stop_and_join();
    }

    #[test]
    fn test_panicking_raw_job_keeps_thread_alive() {
        let executor = ContextExecutor::new("raw-panics").unwrap();
        executor.execute(|| panic!("raw job failed")).unwrap();
        let handle = executor.spawn(|| 2).unwrap();
        assert_eq!(handle.wait(), Some(Ok(2)));
        assert!(executor.is_running());
        assert!(executor.stop_and_join());
        assert_eq!(executor.pending_jobs(), 0);
    }

    #[test]
    fn test_stopped_executor_rejects_work() {
        let executor = ContextExecutor::new("stopped").unwrap();
        executor.stop_and_join();
        assert!(!executor.is_running());
        assert!(matches!(executor.execute(|| {}), Err(TaskError::ExecutorStopped(_))));
    }

    #[test]
    fn test_interactive_origin_is_propagated() {
        let executor = Arc::new(ContextExecutor::new("origin").unwrap());

        set_interactive_thread();
        let from_interactive = executor.spawn(is_issued_from_interactive).unwrap();
        clear_interactive_thread();
        let from_elsewhere = executor.spawn(is_issued_from_interactive).unwrap();

        assert_eq!(from_interactive.wait(), Some(Ok(true)));
        assert_eq!(from_elsewhere.wait(), Some(Ok(false)));
        executor.stop_and_join();
    }

    #[test]
    fn test_is_current_thread() {
        let executor = Arc::new(ContextExecutor::new("current").unwrap());
        assert!(!executor.is_current_thread());
        let inner = executor.clone();
        let handle = executor.spawn(move || inner.is_current_thread()).unwrap();
        assert_eq!(handle.wait(), Some(Ok(true)));
        executor.stop_and_join();
    }
}
