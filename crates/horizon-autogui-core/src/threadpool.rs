//! Cancellation, task handles, and the delayed-waiter pool.
//!
//! A [`TaskHandle`] is the receiving end of a task running on a context
//! executor. It can be waited on with a deadline and a [`CancellationToken`]
//! that interrupts the wait. When a fast wait times out, the remaining wait
//! moves to the shared [`WaiterPool`], a small rayon pool reserved for those
//! background waits.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::threadpool::{CancellationToken, WaitOutcome, task_channel};
//! use std::time::Duration;
//!
//! let (completion, handle) = task_channel::<i32>();
//! std::thread::spawn(move || completion.complete(42));
//!
//! let token = CancellationToken::new();
//! match handle.wait_cancellable(Some(Duration::from_secs(5)), &token) {
//!     WaitOutcome::Ready(value) => assert_eq!(value, 42),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::error::ConfigError;

static DEFAULT_WAITERS: OnceLock<Arc<WaiterPool>> = OnceLock::new();

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Default number of delayed-waiter threads.
pub const DEFAULT_WAITER_THREADS: usize = 4;

/// A cancellation token for cooperative cancellation.
///
/// Tasks poll [`is_cancelled`](Self::is_cancelled); waits registered with
/// the token are woken as soon as it is cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Arc<TaskWakeup>>>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake every registered wait.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::Release) {
            let waiters = std::mem::take(&mut *self.inner.waiters.lock());
            for waker in waiters {
                waker.wake();
            }
        }
    }

    /// Returns true if both handles refer to the same token.
    pub fn same_token(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn register_waker(&self, waker: Arc<TaskWakeup>) {
        if self.is_cancelled() {
            waker.wake();
        } else {
            self.inner.waiters.lock().push(waker.clone());
            // cancel() may have swapped the flag between the check and the push
            if self.is_cancelled() {
                waker.wake();
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Wakes threads blocked on a task handle.
#[derive(Debug)]
struct TaskWakeup {
    ready: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl TaskWakeup {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    fn wake(&self) {
        // Hold the lock while setting ready to avoid a lost wakeup
        let _guard = self.mutex.lock();
        self.ready.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    /// Block until woken or until `deadline`. Returns false on timeout.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        let mut guard = self.mutex.lock();
        while !self.ready.load(Ordering::Acquire) {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        return self.ready.load(Ordering::Acquire);
                    }
                }
                None => self.condvar.wait(&mut guard),
            }
        }
        true
    }
}

/// The producing end of a [`TaskHandle`].
///
/// Dropping it without completing wakes waiters, which then observe
/// [`WaitOutcome::Abandoned`].
pub struct TaskCompletion<T> {
    sender: Option<Sender<T>>,
    wakeup: Arc<TaskWakeup>,
}

impl<T> TaskCompletion<T> {
    /// Deliver the result.
    pub fn complete(mut self, value: T) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(value);
        }
        self.wakeup.wake();
    }
}

impl<T> Drop for TaskCompletion<T> {
    fn drop(&mut self) {
        if self.sender.take().is_some() {
            self.wakeup.wake();
        }
    }
}

/// The result of waiting on a [`TaskHandle`].
#[derive(Debug, PartialEq)]
pub enum WaitOutcome<T> {
    /// The task finished and delivered a value.
    Ready(T),
    /// The deadline passed first.
    TimedOut,
    /// The wait token was cancelled first.
    Cancelled,
    /// The task was dropped without delivering a value.
    Abandoned,
}

/// A handle to a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: u64,
    receiver: Receiver<T>,
    wakeup: Arc<TaskWakeup>,
}

/// Create a connected completion/handle pair.
pub fn task_channel<T>() -> (TaskCompletion<T>, TaskHandle<T>) {
    let (sender, receiver) = bounded(1);
    let wakeup = Arc::new(TaskWakeup::new());
    let completion = TaskCompletion {
        sender: Some(sender),
        wakeup: wakeup.clone(),
    };
    let handle = TaskHandle {
        id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
        receiver,
        wakeup,
    };
    (completion, handle)
}

impl<T> TaskHandle<T> {
    /// The unique id of the task.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if a result is waiting.
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Take the result without blocking.
    pub fn try_get(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the result until `timeout` elapses (or forever with
    /// `None`), or until `token` is cancelled.
    ///
    /// A result that is already available wins over a cancellation.
    pub fn wait_cancellable(
        &self,
        timeout: Option<Duration>,
        token: &CancellationToken,
    ) -> WaitOutcome<T> {
        token.register_waker(self.wakeup.clone());
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let woken = self.wakeup.wait_until(deadline);
        match self.receiver.try_recv() {
            Ok(value) => WaitOutcome::Ready(value),
            Err(TryRecvError::Disconnected) if !token.is_cancelled() => WaitOutcome::Abandoned,
            Err(_) if token.is_cancelled() => WaitOutcome::Cancelled,
            Err(_) if !woken => WaitOutcome::TimedOut,
            // Woken by a token cancelled during an earlier wait
            Err(_) => WaitOutcome::Cancelled,
        }
    }

    /// Wait for the result without a deadline.
    pub fn wait(self) -> Option<T> {
        self.wakeup.wait_until(None);
        self.receiver.try_recv().ok()
    }
}

/// Configuration of a [`WaiterPool`].
#[derive(Debug, Clone)]
pub struct WaiterPoolConfig {
    /// Number of waiter threads.
    pub num_threads: usize,
    /// Name prefix for waiter threads.
    pub thread_name: String,
}

impl Default for WaiterPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_WAITER_THREADS,
            thread_name: "autogui-waiter".to_string(),
        }
    }
}

impl WaiterPoolConfig {
    /// Configuration with a custom thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }
}

/// A bounded pool of threads used only for background waits after a fast
/// wait timed out.
pub struct WaiterPool {
    pool: RayonThreadPool,
    active_waits: Arc<AtomicUsize>,
}

impl WaiterPool {
    /// Create a pool.
    pub fn new(config: WaiterPoolConfig) -> Result<Self, ConfigError> {
        let name = config.thread_name;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads.max(1))
            .thread_name(move |index| format!("{name}-{index}"))
            .build()
            .map_err(|e| ConfigError::WaiterPool(e.to_string()))?;
        Ok(Self {
            pool,
            active_waits: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The process-wide default pool, created on first use.
    pub fn shared_default() -> Result<Arc<WaiterPool>, ConfigError> {
        if let Some(pool) = DEFAULT_WAITERS.get() {
            return Ok(pool.clone());
        }
        let pool = Arc::new(WaiterPool::new(WaiterPoolConfig::default())?);
        Ok(DEFAULT_WAITERS.get_or_init(|| pool).clone())
    }

    /// Number of waiter threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Number of waits currently running.
    pub fn active_waits(&self) -> usize {
        self.active_waits.load(Ordering::Acquire)
    }

    /// Run a background wait on the pool.
    pub fn spawn<F>(&self, wait: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.active_waits.fetch_add(1, Ordering::AcqRel);
        let active_waits = self.active_waits.clone();
        self.pool.spawn(move || {
            struct Done(Arc<AtomicUsize>);

            impl Drop for Done {
                fn drop(&mut self) {
                    self.0.fetch_sub(1, Ordering::AcqRel);
                }
            }

            let _done = Done(active_waits);
            wait();
        });
    }
}

impl std::fmt::Debug for WaiterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaiterPool")
            .field("num_threads", &self.num_threads())
            .field("active_waits", &self.active_waits())
            .finish()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(WaiterPool: Send, Sync);
