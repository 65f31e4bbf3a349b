//! Listener registration and notification.
//!
//! A [`Signal`] keeps an ordered set of listeners. Emitting it calls each
//! listener in registration order. A panicking listener is logged and
//! skipped; the remaining listeners still run.
//!
//! Listeners are either called directly on the emitting thread, or posted
//! through an [`InteractiveDispatcher`] so they run on the interactive
//! thread.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::signal::Signal;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let changed = Signal::<i32>::new();
//! let total = Arc::new(AtomicI32::new(0));
//!
//! let total_clone = total.clone();
//! let id = changed.connect(move |&n| {
//!     total_clone.fetch_add(n, Ordering::SeqCst);
//! });
//!
//! changed.emit(5);
//! changed.disconnect(id);
//! changed.emit(7);
//! assert_eq!(total.load(Ordering::SeqCst), 5);
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::dispatch::InteractiveDispatcher;
use crate::logging::targets;

new_key_type! {
    /// Identifies one listener connection of a [`Signal`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// How a listener is invoked.
#[derive(Clone)]
enum Delivery {
    /// Called on the emitting thread.
    Direct,
    /// Posted to the interactive thread.
    Queued(Arc<dyn InteractiveDispatcher>),
}

struct Connection<Args> {
    slot: Slot<Args>,
    delivery: Delivery,
}

struct Connections<Args> {
    slots: SlotMap<ConnectionId, Connection<Args>>,
    /// Registration order. Slotmap iteration order is not stable across
    /// removals, so order is tracked separately.
    order: Vec<ConnectionId>,
}

/// An ordered set of listeners notified with `&Args`.
pub struct Signal<Args> {
    connections: Mutex<Connections<Args>>,
    blocked: AtomicBool,
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Create a signal with no listeners.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Connections {
                slots: SlotMap::with_key(),
                order: Vec::new(),
            }),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a listener called on the emitting thread.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.insert(Arc::new(slot), Delivery::Direct)
    }

    /// Connect a listener posted through `dispatcher` on every emit.
    pub fn connect_queued<F>(&self, dispatcher: Arc<dyn InteractiveDispatcher>, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.insert(Arc::new(slot), Delivery::Queued(dispatcher))
    }

    fn insert(&self, slot: Slot<Args>, delivery: Delivery) -> ConnectionId {
        let mut connections = self.connections.lock();
        let id = connections.slots.insert(Connection { slot, delivery });
        connections.order.push(id);
        id
    }

    /// Disconnect a listener. Returns false if it was not connected.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock();
        if connections.slots.remove(id).is_some() {
            connections.order.retain(|other| *other != id);
            true
        } else {
            false
        }
    }

    /// Disconnect every listener.
    pub fn disconnect_all(&self) {
        let mut connections = self.connections.lock();
        connections.slots.clear();
        connections.order.clear();
    }

    /// Number of connected listeners.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().slots.len()
    }

    /// Suppress or resume emission.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if emission is suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Notify every listener in registration order.
    ///
    /// Listeners are snapshotted first, so a listener may connect or
    /// disconnect others without deadlocking. Returns the number of
    /// listeners that ran (or were posted) without panicking.
    #[tracing::instrument(skip_all, target = "horizon_autogui_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) -> usize {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return 0;
        }

        let snapshot: Vec<(Slot<Args>, Delivery)> = {
            let connections = self.connections.lock();
            connections
                .order
                .iter()
                .filter_map(|id| connections.slots.get(*id))
                .map(|c| (c.slot.clone(), c.delivery.clone()))
                .collect()
        };
        tracing::trace!(
            target: targets::SIGNAL,
            listener_count = snapshot.len(),
            "emitting signal"
        );

        let mut delivered = 0;
        for (slot, delivery) in snapshot {
            match delivery {
                Delivery::Direct => {
                    if invoke_isolated(&slot, &args) {
                        delivered += 1;
                    }
                }
                Delivery::Queued(dispatcher) => {
                    let args = args.clone();
                    dispatcher.dispatch(Box::new(move || {
                        invoke_isolated(&slot, &args);
                    }));
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

fn invoke_isolated<Args>(slot: &Slot<Args>, args: &Args) -> bool {
    match catch_unwind(AssertUnwindSafe(|| slot(args))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                target: targets::SIGNAL,
                panic = %panic_message(payload.as_ref()),
                "listener panicked; continuing with remaining listeners"
            );
            false
        }
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connections.lock().order.len())
            .field("blocked", &self.blocked.load(Ordering::Relaxed))
            .finish()
    }
}

/// Extract the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
