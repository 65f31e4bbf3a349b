//! Interactive-thread tracking.
//!
//! The interactive thread is the thread running the GUI main loop. It must
//! never block indefinitely, so the task runner needs to know whether a call
//! comes from it, or was transitively issued from it through an executor.
//!
//! ```
//! use horizon_autogui_core::thread_check::{is_interactive_thread, set_interactive_thread};
//!
//! set_interactive_thread();
//! assert!(is_interactive_thread());
//!
//! std::thread::spawn(|| assert!(!is_interactive_thread()))
//!     .join()
//!     .unwrap();
//! ```

use std::cell::Cell;
use std::thread::ThreadId;

use crate::logging::targets;

thread_local! {
    static INTERACTIVE: Cell<bool> = const { Cell::new(false) };
    static ISSUED_FROM_INTERACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Mark the current thread as the interactive thread.
///
/// Typically called once by the GUI layer before the main loop starts.
pub fn set_interactive_thread() {
    INTERACTIVE.with(|flag| flag.set(true));
    tracing::debug!(
        target: targets::THREAD,
        thread = ?std::thread::current().id(),
        "registered interactive thread"
    );
}

/// Remove the interactive mark from the current thread.
pub fn clear_interactive_thread() {
    INTERACTIVE.with(|flag| flag.set(false));
}

/// Check if the current thread is the interactive thread.
#[inline]
pub fn is_interactive_thread() -> bool {
    INTERACTIVE.with(Cell::get)
}

/// Check if the current code runs on the interactive thread, or inside a
/// task that was submitted from it.
#[inline]
pub fn is_issued_from_interactive() -> bool {
    is_interactive_thread() || ISSUED_FROM_INTERACTIVE.with(Cell::get)
}

/// Run `f` with the issued-from-interactive flag set to `issued`, restoring
/// the previous flag afterwards, even if `f` panics.
pub(crate) fn with_interactive_origin<R>(issued: bool, f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            ISSUED_FROM_INTERACTIVE.with(|flag| flag.set(self.0));
        }
    }

    let _restore = Restore(ISSUED_FROM_INTERACTIVE.with(|flag| flag.replace(issued)));
    f()
}

/// Records the thread an object was created on.
#[derive(Debug, Clone, Copy)]
pub struct ThreadAffinity {
    thread_id: ThreadId,
}

impl Default for ThreadAffinity {
    fn default() -> Self {
        Self::current()
    }
}

impl ThreadAffinity {
    /// Affinity for the current thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            thread_id: std::thread::current().id(),
        }
    }

    /// The recorded thread.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Check if the current thread matches the recorded one.
    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_flag_is_per_thread() {
        set_interactive_thread();
        assert!(is_interactive_thread());
        assert!(is_issued_from_interactive());

        let other = std::thread::spawn(is_interactive_thread).join().unwrap();
        assert!(!other);

        clear_interactive_thread();
        assert!(!is_interactive_thread());
    }

    #[test]
    fn test_origin_flag_is_restored() {
        assert!(!is_issued_from_interactive());
        let inner = with_interactive_origin(true, || {
            let nested = with_interactive_origin(false, is_issued_from_interactive);
            (is_issued_from_interactive(), nested)
        });
        assert_eq!(inner, (true, false));
        assert!(!is_issued_from_interactive());

        let result = std::panic::catch_unwind(|| {
            with_interactive_origin(true, || panic!("boom"));
        });
        assert!(result.is_err());
        assert!(!is_issued_from_interactive());
    }

    #[test]
    fn test_thread_affinity() {
        let affinity = ThreadAffinity::current();
        assert!(affinity.is_same_thread());
        let same = std::thread::spawn(move || affinity.is_same_thread()).join().unwrap();
        assert!(!same);
    }
}
