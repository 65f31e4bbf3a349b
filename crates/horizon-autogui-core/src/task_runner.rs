//! Running context operations off the interactive thread.
//!
//! [`TaskRunner`] submits a task to its [`ContextExecutor`] and waits for at
//! most the fast-wait bound. What happens next depends on how the task ends:
//!
//! | outcome | continuation receives |
//! |---------|-----------------------|
//! | finished within the bound | [`TaskResult::Present`] |
//! | still running at the bound | [`TaskResult::Timeout`] now, then [`TaskResult::PresentedWithDelay`] from a background waiter |
//! | wait token cancelled | [`TaskResult::Cancel`] |
//! | task returned an error or panicked | [`TaskResult::Failed`] |
//!
//! Cancelling the wait token during the fast wait only abandons the wait:
//! the task keeps running and nothing is delivered later. Cancelling it
//! during the background wait also cancels the task's own token, and the
//! continuation receives `Cancel` instead of a delayed value.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::task_runner::{TaskResult, TaskRunner};
//!
//! let runner = TaskRunner::with_defaults("example").unwrap();
//! let result = runner.run(|_ctx| Ok(1 + 1)).unwrap();
//! assert_eq!(result, TaskResult::Present(2));
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::dispatch::{ImmediateDispatcher, InteractiveDispatcher};
use crate::error::{AutoGuiError, TaskError};
use crate::executor::{ContextExecutor, ExecutorBuilder};
use crate::logging::targets;
use crate::progress::{ProgressMonitor, ProgressReporter};
use crate::signal::panic_message;
use crate::thread_check::is_issued_from_interactive;
use crate::threadpool::{CancellationToken, WaitOutcome, WaiterPool};

/// Default fast-wait bound.
pub const DEFAULT_FAST_WAIT: Duration = Duration::from_secs(2);

/// The kinds of operation a representation may route through the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Reading a value for display.
    GetValue,
    /// Writing a value edited in the GUI.
    SetValue,
    /// Invoking an action.
    Action,
}

/// The result handed to a continuation.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult<T> {
    /// Finished within the fast wait.
    Present(T),
    /// Finished after a timeout had already been delivered.
    PresentedWithDelay(T),
    /// Still running when the fast wait ended.
    Timeout,
    /// The wait was cancelled.
    Cancel,
    /// The task failed.
    Failed(TaskError),
}

impl<T> TaskResult<T> {
    /// Finished within the fast wait.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Finished after a timeout.
    pub fn is_presented_with_delay(&self) -> bool {
        matches!(self, Self::PresentedWithDelay(_))
    }

    /// Still running at the end of the fast wait.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// The wait was cancelled.
    pub fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel)
    }

    /// The task failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The value, if the task finished.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Present(v) | Self::PresentedWithDelay(v) => Some(v),
            _ => None,
        }
    }

    /// Take the value, if the task finished.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Present(v) | Self::PresentedWithDelay(v) => Some(v),
            _ => None,
        }
    }

    /// The error, if the task failed.
    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Convert the value, keeping the state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TaskResult<U> {
        match self {
            Self::Present(v) => TaskResult::Present(f(v)),
            Self::PresentedWithDelay(v) => TaskResult::PresentedWithDelay(f(v)),
            Self::Timeout => TaskResult::Timeout,
            Self::Cancel => TaskResult::Cancel,
            Self::Failed(e) => TaskResult::Failed(e),
        }
    }
}

/// Per-task information available to the task body.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Whether the task was transitively issued from the interactive thread.
    pub issued_from_interactive: bool,
    /// Cancelled when the background wait is cancelled.
    pub cancellation: CancellationToken,
    /// Progress shown while a background wait is active.
    pub progress: ProgressReporter,
}

impl TaskContext {
    /// Check if the task has been asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Handle to a submitted task.
#[derive(Debug, Clone)]
pub struct TaskTicket {
    wait: CancellationToken,
    task: CancellationToken,
    delayed: Arc<AtomicBool>,
}

impl TaskTicket {
    /// Cancel the wait. During the background wait this also cancels the
    /// task and delivers [`TaskResult::Cancel`].
    pub fn cancel_wait(&self) {
        self.wait.cancel();
    }

    /// Ask the task itself to stop.
    pub fn cancel_task(&self) {
        self.task.cancel();
    }

    /// Returns true if a background waiter was started.
    pub fn is_delayed(&self) -> bool {
        self.delayed.load(Ordering::Acquire)
    }

    /// The token observed by the task body.
    pub fn task_token(&self) -> &CancellationToken {
        &self.task
    }
}

/// Guards an action against concurrent re-activation.
#[derive(Debug, Clone)]
pub struct ActionGuard {
    name: Arc<str>,
    running: Arc<AtomicBool>,
}

impl ActionGuard {
    /// Create a guard for the named action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if an activation is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Mark the action running. Fails, with a warning, if it already is.
    pub fn try_begin(&self) -> Result<RunningAction, TaskError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                target: targets::TASK,
                action = %self.name,
                "action is already running; activation rejected"
            );
            return Err(TaskError::AlreadyRunning(self.name.to_string()));
        }
        Ok(RunningAction {
            running: self.running.clone(),
        })
    }
}

/// Proof that an action activation is running. Clears the flag on drop.
#[derive(Debug)]
pub struct RunningAction {
    running: Arc<AtomicBool>,
}

impl Drop for RunningAction {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Executes context-bound tasks with fast-wait, timeout, and cancel
/// semantics.
pub struct TaskRunner {
    executor: Arc<ContextExecutor>,
    waiters: Arc<WaiterPool>,
    dispatcher: Arc<dyn InteractiveDispatcher>,
    monitor: Arc<ProgressMonitor>,
    fast_wait: Duration,
}

impl TaskRunner {
    /// Create a runner from its parts.
    pub fn new(
        executor: Arc<ContextExecutor>,
        waiters: Arc<WaiterPool>,
        dispatcher: Arc<dyn InteractiveDispatcher>,
        fast_wait: Duration,
    ) -> Self {
        Self {
            executor,
            waiters,
            dispatcher,
            monitor: ProgressMonitor::new(),
            fast_wait,
        }
    }

    /// Create a runner with a fresh executor, the shared waiter pool, and an
    /// immediate dispatcher.
    pub fn with_defaults(name: impl Into<String>) -> Result<Self, AutoGuiError> {
        let executor = Arc::new(ExecutorBuilder::new().name(name).build()?);
        Ok(Self::new(
            executor,
            WaiterPool::shared_default()?,
            Arc::new(ImmediateDispatcher),
            DEFAULT_FAST_WAIT,
        ))
    }

    /// Replace the progress monitor.
    pub fn with_monitor(mut self, monitor: Arc<ProgressMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// The fast-wait bound.
    pub fn fast_wait(&self) -> Duration {
        self.fast_wait
    }

    /// The executor tasks run on.
    pub fn executor(&self) -> &Arc<ContextExecutor> {
        &self.executor
    }

    /// The monitor tracking background waits.
    pub fn monitor(&self) -> &Arc<ProgressMonitor> {
        &self.monitor
    }

    /// The dispatcher delayed results are posted through.
    pub fn dispatcher(&self) -> &Arc<dyn InteractiveDispatcher> {
        &self.dispatcher
    }

    fn task_context(&self, cancellation: CancellationToken) -> TaskContext {
        TaskContext {
            issued_from_interactive: is_issued_from_interactive(),
            cancellation,
            progress: ProgressReporter::new(),
        }
    }

    /// Run a task without a continuation.
    ///
    /// Waits for at most the fast-wait bound. A task that outlives it keeps
    /// running and its result is discarded. Failures are returned as `Err`.
    #[tracing::instrument(skip_all, target = "horizon_autogui_core::task", level = "trace")]
    pub fn run<T, F>(&self, task: F) -> Result<TaskResult<T>, TaskError>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static,
    {
        let ctx = self.task_context(CancellationToken::new());
        if self.executor.is_current_thread() {
            return task(&ctx).map(TaskResult::Present);
        }
        let handle = self.executor.spawn(move || task(&ctx))?;
        match handle.wait_cancellable(Some(self.fast_wait), &CancellationToken::new()) {
            WaitOutcome::Ready(Ok(Ok(value))) => Ok(TaskResult::Present(value)),
            WaitOutcome::Ready(Ok(Err(e)) | Err(e)) => Err(e),
            WaitOutcome::TimedOut => Ok(TaskResult::Timeout),
            WaitOutcome::Cancelled => Ok(TaskResult::Cancel),
            WaitOutcome::Abandoned => Err(TaskError::ExecutorStopped(self.executor.name().to_string())),
        }
    }

    /// Run a task, delivering its result to `continuation`.
    ///
    /// The continuation is called once on the calling thread, and a second
    /// time through the dispatcher if the first call was a timeout.
    pub fn run_with_continuation<T, F, C>(&self, task: F, continuation: C) -> TaskTicket
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static,
        C: FnMut(TaskResult<T>) + Send + 'static,
    {
        self.run_with_wait_token(CancellationToken::new(), task, continuation)
    }

    /// Like [`run_with_continuation`](Self::run_with_continuation), with a
    /// caller-supplied wait token so another thread can cancel the fast wait.
    #[tracing::instrument(skip_all, target = "horizon_autogui_core::task", level = "trace")]
    pub fn run_with_wait_token<T, F, C>(
        &self,
        wait: CancellationToken,
        task: F,
        mut continuation: C,
    ) -> TaskTicket
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static,
        C: FnMut(TaskResult<T>) + Send + 'static,
    {
        let task_token = CancellationToken::new();
        let ticket = TaskTicket {
            wait: wait.clone(),
            task: task_token.clone(),
            delayed: Arc::new(AtomicBool::new(false)),
        };
        let ctx = self.task_context(task_token.clone());
        let reporter = ctx.progress.clone();

        if self.executor.is_current_thread() {
            continuation(into_result(Ok(task(&ctx))));
            return ticket;
        }

        let handle = match self.executor.spawn(move || task(&ctx)) {
            Ok(handle) => handle,
            Err(e) => {
                log_failure(&e);
                continuation(TaskResult::Failed(e));
                return ticket;
            }
        };

        match handle.wait_cancellable(Some(self.fast_wait), &wait) {
            WaitOutcome::Ready(result) => continuation(into_result(result)),
            WaitOutcome::Cancelled => {
                tracing::debug!(target: targets::TASK, "fast wait cancelled; task left running");
                continuation(TaskResult::Cancel);
            }
            WaitOutcome::Abandoned => {
                continuation(TaskResult::Failed(TaskError::ExecutorStopped(
                    self.executor.name().to_string(),
                )));
            }
            WaitOutcome::TimedOut => {
                tracing::debug!(
                    target: targets::TASK,
                    fast_wait_ms = self.fast_wait.as_millis() as u64,
                    "task timed out; continuing in background"
                );
                continuation(TaskResult::Timeout);
                ticket.delayed.store(true, Ordering::Release);

                let progress = self.monitor.begin(self.executor.name(), reporter);
                let dispatcher = self.dispatcher.clone();
                self.waiters.spawn(move || {
                    let outcome = handle.wait_cancellable(None, &wait);
                    drop(progress);
                    let delayed = match outcome {
                        WaitOutcome::Ready(result) => match into_result(result) {
                            TaskResult::Present(value) => TaskResult::PresentedWithDelay(value),
                            other => other,
                        },
                        WaitOutcome::Cancelled | WaitOutcome::TimedOut => {
                            tracing::debug!(
                                target: targets::TASK,
                                "background wait cancelled; cancelling task"
                            );
                            task_token.cancel();
                            TaskResult::Cancel
                        }
                        WaitOutcome::Abandoned => TaskResult::Cancel,
                    };
                    dispatcher.dispatch(Box::new(move || continuation(delayed)));
                });
            }
        }
        ticket
    }

    /// Run a task on the calling thread and deliver its result before
    /// returning. For work that does not touch host state, such as reads of
    /// cached values.
    pub fn run_inline<T, F, C>(&self, task: F, mut continuation: C) -> TaskTicket
    where
        F: FnOnce(&TaskContext) -> Result<T, TaskError>,
        C: FnMut(TaskResult<T>),
    {
        let task_token = CancellationToken::new();
        let ticket = TaskTicket {
            wait: CancellationToken::new(),
            task: task_token.clone(),
            delayed: Arc::new(AtomicBool::new(false)),
        };
        let ctx = self.task_context(task_token);
        let result = catch_unwind(AssertUnwindSafe(|| task(&ctx)))
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
        continuation(into_result(result));
        ticket
    }

    /// [`run_action`](Self::run_action) on the calling thread.
    pub fn run_action_inline<T, F, C>(
        &self,
        guard: &ActionGuard,
        task: F,
        continuation: C,
    ) -> Result<TaskTicket, TaskError>
    where
        F: FnOnce(&TaskContext) -> Result<T, TaskError>,
        C: FnMut(TaskResult<T>),
    {
        let running = guard.try_begin()?;
        Ok(self.run_inline(
            move |ctx| {
                let _running = running;
                task(ctx)
            },
            continuation,
        ))
    }

    /// Run an action guarded against re-activation.
    ///
    /// Returns [`TaskError::AlreadyRunning`] without submitting anything if
    /// the previous activation has not finished. The guard clears when the
    /// task body returns, independent of how long the caller waited.
    pub fn run_action<T, F, C>(
        &self,
        guard: &ActionGuard,
        task: F,
        continuation: C,
    ) -> Result<TaskTicket, TaskError>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext) -> Result<T, TaskError> + Send + 'static,
        C: FnMut(TaskResult<T>) + Send + 'static,
    {
        let running = guard.try_begin()?;
        Ok(self.run_with_continuation(
            move |ctx| {
                let _running = running;
                task(ctx)
            },
            continuation,
        ))
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("executor", &self.executor)
            .field("fast_wait", &self.fast_wait)
            .finish()
    }
}

fn into_result<T>(result: Result<Result<T, TaskError>, TaskError>) -> TaskResult<T> {
    match result {
        Ok(Ok(value)) => TaskResult::Present(value),
        Ok(Err(e)) | Err(e) => {
            log_failure(&e);
            TaskResult::Failed(e)
        }
    }
}

fn log_failure(error: &TaskError) {
    tracing::error!(target: targets::TASK, error = %error, "task failed");
}

static_assertions::assert_impl_all!(TaskRunner: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::QueuedDispatcher;
    use crate::error::AccessError;
    use crate::threadpool::WaiterPoolConfig;
    use parking_lot::Mutex;
    use std::time::Instant;

    fn make_runner(fast_wait: Duration) -> TaskRunner {
        TaskRunner::new(
            Arc::new(ContextExecutor::new("test-runner").unwrap()),
            Arc::new(WaiterPool::new(WaiterPoolConfig::with_threads(2)).unwrap()),
            Arc::new(ImmediateDispatcher),
            fast_wait,
        )
    }

    fn collect<T: Send + 'static>() -> (Arc<Mutex<Vec<TaskResult<T>>>>, impl FnMut(TaskResult<T>) + Send + 'static) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        (results, move |r| sink.lock().push(r))
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_fast_result_is_present() {
        let runner = make_runner(Duration::from_secs(2));
        let (results, sink) = collect();
        let ticket = runner.run_with_continuation(|_| Ok(5), sink);
        assert!(!ticket.is_delayed());
        assert_eq!(*results.lock(), vec![TaskResult::Present(5)]);
    }

    #[test]
    fn test_timeout_then_delayed_delivery() {
        let runner = make_runner(Duration::from_millis(100));
        let (results, sink) = collect();
        let started = Instant::now();
        let ticket = runner.run_with_continuation(
            |_| {
                std::thread::sleep(Duration::from_millis(600));
                Ok("late")
            },
            sink,
        );

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(500));
        assert!(ticket.is_delayed());
        assert!(results.lock()[0].is_timeout());
        assert_eq!(runner.monitor().active_count(), 1);

        wait_for(|| results.lock().len() == 2);
        assert_eq!(results.lock()[1], TaskResult::PresentedWithDelay("late"));
        wait_for(|| runner.monitor().active_count() == 0);
    }

    #[test]
    fn test_failure_is_reported() {
        let runner = make_runner(Duration::from_secs(2));
        let (results, sink) = collect::<i32>();
        runner.run_with_continuation(|_| Err(AccessError::host("disk on fire").into()), sink);
        assert!(results.lock()[0].is_failed());

        let (results, sink) = collect::<i32>();
        runner.run_with_continuation(|_| panic!("boom"), sink);
        assert_eq!(
            results.lock()[0],
            TaskResult::Failed(TaskError::Panicked("boom".to_string()))
        );
    }

    #[test]
    fn test_run_without_continuation_propagates_errors() {
        let runner = make_runner(Duration::from_secs(2));
        assert_eq!(runner.run(|_| Ok(3)).unwrap(), TaskResult::Present(3));
        let err = runner
            .run::<i32, _>(|_| Err(TaskError::Access(AccessError::host("nope"))))
            .unwrap_err();
        assert_eq!(err, TaskError::Access(AccessError::host("nope")));

        let slow = make_runner(Duration::from_millis(20));
        let result = slow
            .run(|_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(1)
            })
            .unwrap();
        assert!(result.is_timeout());
    }

    #[test]
    fn test_fast_wait_cancel_leaves_task_running() {
        let runner = make_runner(Duration::from_secs(5));
        let finished = Arc::new(AtomicBool::new(false));
        let (results, sink) = collect();

        let wait = CancellationToken::new();
        let canceller = wait.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        let finished_clone = finished.clone();
        let ticket = runner.run_with_wait_token(
            wait,
            move |ctx| {
                std::thread::sleep(Duration::from_millis(150));
                finished_clone.store(!ctx.is_cancelled(), Ordering::SeqCst);
                Ok(())
            },
            sink,
        );

        assert_eq!(*results.lock(), vec![TaskResult::Cancel]);
        assert!(!ticket.is_delayed());
        wait_for(|| finished.load(Ordering::SeqCst));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(results.lock().len(), 1);
    }

    #[test]
    fn test_background_cancel_cancels_task() {
        let runner = make_runner(Duration::from_millis(20));
        let (results, sink) = collect();
        let observed_cancel = Arc::new(AtomicBool::new(false));

        let observed = observed_cancel.clone();
        let ticket = runner.run_with_continuation(
            move |ctx| {
                let deadline = Instant::now() + Duration::from_secs(5);
                while !ctx.is_cancelled() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(5));
                }
                observed.store(ctx.is_cancelled(), Ordering::SeqCst);
                Ok(0)
            },
            sink,
        );
        assert!(results.lock()[0].is_timeout());

        ticket.cancel_wait();
        wait_for(|| results.lock().len() == 2);
        assert_eq!(results.lock()[1], TaskResult::Cancel);
        wait_for(|| observed_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn test_delayed_result_goes_through_dispatcher() {
        let dispatcher = QueuedDispatcher::new();
        let runner = TaskRunner::new(
            Arc::new(ContextExecutor::new("queued-runner").unwrap()),
            Arc::new(WaiterPool::new(WaiterPoolConfig::with_threads(1)).unwrap()),
            dispatcher.clone(),
            Duration::from_millis(10),
        );
        let (results, sink) = collect();
        runner.run_with_continuation(
            |_| {
                std::thread::sleep(Duration::from_millis(60));
                Ok(9)
            },
            sink,
        );
        wait_for(|| dispatcher.has_pending());
        assert_eq!(results.lock().len(), 1);
        dispatcher.process_pending();
        assert_eq!(results.lock()[1], TaskResult::PresentedWithDelay(9));
    }

    #[test]
    fn test_action_reentrancy_is_rejected() {
        let runner = make_runner(Duration::from_millis(20));
        let guard = ActionGuard::new("slow");
        let executions = Arc::new(Mutex::new(0));

        let count = executions.clone();
        let first = runner.run_action(
            &guard,
            move |_| {
                *count.lock() += 1;
                std::thread::sleep(Duration::from_millis(500));
                Ok(())
            },
            |_| {},
        );
        assert!(first.is_ok());
        assert!(guard.is_running());

        let count = executions.clone();
        let second = runner.run_action(
            &guard,
            move |_| {
                *count.lock() += 1;
                Ok(())
            },
            |_| {},
        );
        assert!(matches!(second, Err(TaskError::AlreadyRunning(_))));

        wait_for(|| !guard.is_running());
        assert_eq!(*executions.lock(), 1);
    }

    #[test]
    fn test_nested_run_executes_inline() {
        let runner = Arc::new(make_runner(Duration::from_secs(2)));
        let inner = runner.clone();
        let result = runner
            .run(move |_| {
                let nested = inner.run(|_| Ok(21))?;
                Ok(nested.into_value().unwrap_or_default() * 2)
            })
            .unwrap();
        assert_eq!(result, TaskResult::Present(42));
    }

    #[test]
    fn test_inline_run_uses_calling_thread() {
        let runner = make_runner(Duration::from_secs(2));
        runner.executor().stop_and_join();
        let caller = std::thread::current().id();
        let (results, sink) = collect();
        let ticket = runner.run_inline(move |_| Ok(std::thread::current().id() == caller), sink);
        assert!(!ticket.is_delayed());
        assert_eq!(*results.lock(), vec![TaskResult::Present(true)]);

        let (results, sink) = collect::<i32>();
        runner.run_inline(|_| panic!("inline boom"), sink);
        assert_eq!(
            results.lock()[0],
            TaskResult::Failed(TaskError::Panicked("inline boom".to_string()))
        );
    }

    #[test]
    fn test_inline_action_holds_guard_while_running() {
        let runner = make_runner(Duration::from_secs(2));
        let guard = ActionGuard::new("inline");
        let (results, sink) = collect();
        let seen_running = Arc::new(AtomicBool::new(false));
        let seen = seen_running.clone();
        let shared_guard = guard.clone();
        runner
            .run_action_inline(
                &guard,
                move |_| {
                    seen.store(shared_guard.is_running(), Ordering::SeqCst);
                    Ok(1)
                },
                sink,
            )
            .unwrap();
        assert!(seen_running.load(Ordering::SeqCst));
        assert!(!guard.is_running());
        assert_eq!(*results.lock(), vec![TaskResult::Present(1)]);
    }
}
