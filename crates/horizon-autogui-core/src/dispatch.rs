//! Delivery of closures onto the interactive thread.
//!
//! The engine never touches the widget toolkit directly. Listener callbacks
//! and task continuations that must run on the interactive thread are handed
//! to an [`InteractiveDispatcher`], which the GUI layer implements on top of
//! its own main-loop posting mechanism.
//!
//! Two implementations ship with the crate:
//!
//! - [`ImmediateDispatcher`] runs closures inline on the calling thread
//! - [`QueuedDispatcher`] stores closures until the owning loop calls
//!   [`QueuedDispatcher::process_pending`]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A closure posted to the interactive thread.
pub type Posted = Box<dyn FnOnce() + Send + 'static>;

/// Posts closures onto the interactive thread.
pub trait InteractiveDispatcher: Send + Sync {
    /// Schedule `task` to run on the interactive thread.
    fn dispatch(&self, task: Posted);
}

/// Runs every posted closure immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl InteractiveDispatcher for ImmediateDispatcher {
    fn dispatch(&self, task: Posted) {
        task();
    }
}

/// Queues posted closures until the owning loop drains them.
#[derive(Default)]
pub struct QueuedDispatcher {
    pending: Mutex<VecDeque<Posted>>,
    processed: AtomicU64,
}

impl QueuedDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of closures waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if any closures are waiting.
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Total number of closures run so far.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Run every closure queued so far, in posting order.
    ///
    /// Closures posted while draining run on the next call. Returns the
    /// number of closures run.
    pub fn process_pending(&self) -> usize {
        let batch: Vec<Posted> = self.pending.lock().drain(..).collect();
        let count = batch.len();
        for task in batch {
            task();
        }
        self.processed.fetch_add(count as u64, Ordering::Relaxed);
        count
    }
}

impl InteractiveDispatcher for QueuedDispatcher {
    fn dispatch(&self, task: Posted) {
        self.pending.lock().push_back(task);
    }
}

impl<D: InteractiveDispatcher + ?Sized> InteractiveDispatcher for Arc<D> {
    fn dispatch(&self, task: Posted) {
        (**self).dispatch(task);
    }
}
