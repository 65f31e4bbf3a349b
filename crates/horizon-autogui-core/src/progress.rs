//! Progress reporting for slow tasks.
//!
//! A task that outlives the fast wait keeps running while a background
//! waiter holds a [`ProgressWait`] registered with the [`ProgressMonitor`].
//! The GUI connects to the monitor to show a busy indicator for as long as
//! any wait is active. Tasks can additionally report a fraction and a status
//! message through the [`ProgressReporter`] in their task context.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::progress::{ProgressMonitor, ProgressReporter};
//!
//! let monitor = ProgressMonitor::new();
//! let wait = monitor.begin("reading value", ProgressReporter::new());
//! assert_eq!(monitor.active_count(), 1);
//!
//! wait.reporter().update(0.5, "halfway");
//! drop(wait);
//! assert_eq!(monitor.active_count(), 0);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::logging::targets;
use crate::signal::Signal;

/// A progress value together with an optional message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Progress value from 0.0 to 1.0.
    pub progress: f32,
    /// Optional status message.
    pub message: Option<String>,
}

struct ProgressReporterInner {
    /// Progress stored as f32 bits for atomic access.
    progress_bits: AtomicU32,
    message: Mutex<Option<String>>,
    updated: Signal<ProgressUpdate>,
}

/// A thread-safe progress reporter handed to running tasks.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ProgressReporterInner>,
}

impl ProgressReporter {
    /// Create a reporter at 0.0 with no message.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProgressReporterInner {
                progress_bits: AtomicU32::new(0.0_f32.to_bits()),
                message: Mutex::new(None),
                updated: Signal::new(),
            }),
        }
    }

    /// The current progress (0.0 to 1.0).
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.inner.progress_bits.load(Ordering::Acquire))
    }

    /// The current status message.
    pub fn message(&self) -> Option<String> {
        self.inner.message.lock().clone()
    }

    /// Set the progress, clamped to 0.0..=1.0. Emits only on change.
    pub fn set_progress(&self, progress: f32) {
        let clamped = progress.clamp(0.0, 1.0);
        let old = f32::from_bits(
            self.inner
                .progress_bits
                .swap(clamped.to_bits(), Ordering::AcqRel),
        );
        if (clamped - old).abs() > f32::EPSILON {
            self.inner.updated.emit(ProgressUpdate {
                progress: clamped,
                message: self.message(),
            });
        }
    }

    /// Set progress and message together, emitting once.
    pub fn update(&self, progress: f32, message: impl Into<String>) {
        let clamped = progress.clamp(0.0, 1.0);
        let message = message.into();
        self.inner
            .progress_bits
            .store(clamped.to_bits(), Ordering::Release);
        *self.inner.message.lock() = Some(message.clone());
        self.inner.updated.emit(ProgressUpdate {
            progress: clamped,
            message: Some(message),
        });
    }

    /// Signal emitted on every progress or message change.
    pub fn on_updated(&self) -> &Signal<ProgressUpdate> {
        &self.inner.updated
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("progress", &self.progress())
            .field("message", &self.message())
            .finish()
    }
}

/// Describes one active background wait.
#[derive(Debug, Clone)]
pub struct WaitInfo {
    /// Unique id of the wait.
    pub id: u64,
    /// Human readable label, usually the context name.
    pub label: String,
    /// Progress reported by the awaited task.
    pub reporter: ProgressReporter,
}

/// Tracks background waits so the GUI can show a busy indicator.
pub struct ProgressMonitor {
    active: Mutex<Vec<WaitInfo>>,
    next_id: AtomicU64,
    started: Signal<WaitInfo>,
    finished: Signal<WaitInfo>,
}

impl ProgressMonitor {
    /// Create a monitor with no active waits.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            started: Signal::new(),
            finished: Signal::new(),
        })
    }

    /// Register a wait. It stays active until the returned guard drops.
    pub fn begin(self: &Arc<Self>, label: impl Into<String>, reporter: ProgressReporter) -> ProgressWait {
        let info = WaitInfo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            reporter,
        };
        self.active.lock().push(info.clone());
        tracing::debug!(
            target: targets::PROGRESS,
            id = info.id,
            label = %info.label,
            "background wait started"
        );
        self.started.emit(info.clone());
        ProgressWait {
            monitor: self.clone(),
            info,
        }
    }

    /// Number of active waits.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Snapshot of the active waits, oldest first.
    pub fn active_waits(&self) -> Vec<WaitInfo> {
        self.active.lock().clone()
    }

    /// Emitted when a wait begins.
    pub fn on_wait_started(&self) -> &Signal<WaitInfo> {
        &self.started
    }

    /// Emitted when a wait ends.
    pub fn on_wait_finished(&self) -> &Signal<WaitInfo> {
        &self.finished
    }

    fn end(&self, id: u64) {
        let removed = {
            let mut active = self.active.lock();
            active
                .iter()
                .position(|w| w.id == id)
                .map(|index| active.remove(index))
        };
        if let Some(info) = removed {
            tracing::debug!(
                target: targets::PROGRESS,
                id = info.id,
                "background wait finished"
            );
            self.finished.emit(info);
        }
    }
}

/// An active background wait. Ends on drop.
pub struct ProgressWait {
    monitor: Arc<ProgressMonitor>,
    info: WaitInfo,
}

impl ProgressWait {
    /// The id of this wait.
    pub fn id(&self) -> u64 {
        self.info.id
    }

    /// The reporter of the awaited task.
    pub fn reporter(&self) -> &ProgressReporter {
        &self.info.reporter
    }
}

impl Drop for ProgressWait {
    fn drop(&mut self) {
        self.monitor.end(self.info.id);
    }
}

static_assertions::assert_impl_all!(ProgressReporter: Send, Sync);
static_assertions::assert_impl_all!(ProgressMonitor: Send, Sync);
