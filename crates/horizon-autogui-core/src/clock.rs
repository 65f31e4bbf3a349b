//! Logical clocks ordering value updates.
//!
//! Every context carries a [`TaskClock`] that advances on each value touch.
//! A widget keeps its own copy and applies an incoming update only when the
//! incoming clock is not older than the one it holds. A late update from a
//! slow background read is then dropped instead of overwriting a newer user
//! edit.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::clock::TaskClock;
//!
//! let mut shown = TaskClock::default();
//! let newer = TaskClock::new(0, 3);
//! let older = TaskClock::new(0, 2);
//!
//! assert!(!shown.is_older_with_set(newer));
//! assert!(shown.is_older_with_set(older));
//! assert_eq!(shown, newer);
//! ```

use std::fmt;

use parking_lot::Mutex;

/// A `(generation, count)` logical timestamp, ordered lexicographically.
///
/// The generation is the tree epoch and is bumped when a tree is reset with
/// a new root object; the count advances on every value touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TaskClock {
    /// Tree epoch.
    pub generation: u32,
    /// Per-context counter.
    pub count: u64,
}

impl TaskClock {
    /// Create a clock at the given position.
    pub const fn new(generation: u32, count: u64) -> Self {
        Self { generation, count }
    }

    /// The clock following this one within the same generation.
    pub fn next(self) -> Self {
        Self {
            generation: self.generation,
            count: self.count.wrapping_add(1),
        }
    }

    /// Returns true if this clock is strictly older than `other`.
    pub fn is_older_than(&self, other: &TaskClock) -> bool {
        self < other
    }

    /// Compare-and-set gate.
    ///
    /// Returns true, leaving `self` untouched, if `incoming` is strictly
    /// older. Otherwise adopts `incoming` and returns false.
    pub fn is_older_with_set(&mut self, incoming: TaskClock) -> bool {
        if incoming < *self {
            true
        } else {
            *self = incoming;
            false
        }
    }
}

impl fmt::Display for TaskClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generation, self.count)
    }
}

/// A clock shared between threads.
#[derive(Debug, Default)]
pub struct SharedTaskClock {
    inner: Mutex<TaskClock>,
}

impl SharedTaskClock {
    /// Create a shared clock starting at `clock`.
    pub fn new(clock: TaskClock) -> Self {
        Self {
            inner: Mutex::new(clock),
        }
    }

    /// The current clock.
    pub fn get(&self) -> TaskClock {
        *self.inner.lock()
    }

    /// Advance the count and return the new clock.
    pub fn increment(&self) -> TaskClock {
        let mut clock = self.inner.lock();
        *clock = clock.next();
        *clock
    }

    /// Advance to at least `incoming`, then past it.
    ///
    /// Used when an edit arrives carrying a clock: the context clock ends up
    /// newer than both its previous value and the incoming one, so it never
    /// decreases.
    pub fn advance_past(&self, incoming: TaskClock) -> TaskClock {
        let mut clock = self.inner.lock();
        if incoming > *clock {
            *clock = incoming;
        }
        *clock = clock.next();
        *clock
    }

    /// Start a new generation with a zero count.
    pub fn bump_generation(&self) -> TaskClock {
        let mut clock = self.inner.lock();
        *clock = TaskClock::new(clock.generation.wrapping_add(1), 0);
        *clock
    }

    /// See [`TaskClock::is_older_with_set`].
    pub fn is_older_with_set(&self, incoming: TaskClock) -> bool {
        self.inner.lock().is_older_with_set(incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_order() {
        assert!(TaskClock::new(0, 9).is_older_than(&TaskClock::new(1, 0)));
        assert!(TaskClock::new(1, 1).is_older_than(&TaskClock::new(1, 2)));
        assert!(!TaskClock::new(1, 2).is_older_than(&TaskClock::new(1, 2)));
    }

    #[test]
    fn test_out_of_order_delivery_keeps_newest() {
        let updates = [(3, "c"), (1, "a"), (4, "d"), (2, "b")];
        let mut held = TaskClock::default();
        let mut shown = "";
        for (count, value) in updates {
            if !held.is_older_with_set(TaskClock::new(0, count)) {
                shown = value;
            }
        }
        assert_eq!(shown, "d");
        assert_eq!(held, TaskClock::new(0, 4));
    }

    #[test]
    fn test_equal_clock_is_applied() {
        let mut held = TaskClock::new(0, 5);
        assert!(!held.is_older_with_set(TaskClock::new(0, 5)));
    }

    #[test]
    fn test_shared_clock_never_decreases() {
        let clock = SharedTaskClock::default();
        assert_eq!(clock.increment(), TaskClock::new(0, 1));
        assert_eq!(clock.advance_past(TaskClock::new(0, 10)), TaskClock::new(0, 11));
        assert_eq!(clock.advance_past(TaskClock::new(0, 3)), TaskClock::new(0, 12));
        assert_eq!(clock.bump_generation(), TaskClock::new(1, 0));
        assert!(clock.is_older_with_set(TaskClock::new(0, 50)));
    }
}
