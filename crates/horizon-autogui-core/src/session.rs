//! Sessions: a context tree plus the controls bound to it.
//!
//! A renderer registers one control per widget it builds. Controls live in
//! a slotmap arena owned by the [`Session`]; closing the session detaches
//! every control, disconnects all listeners in the tree, and stops the
//! tree's executor if the tree created it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::config::EngineConfig;
use crate::context::{ContextTree, MappingContext};
use crate::describe::Describe;
use crate::error::{AccessError, AutoGuiError, TaskError};
use crate::logging::targets;
use crate::signal::Signal;
use crate::task_runner::{TaskResult, TaskTicket};
use crate::type_model::ElementKind;
use crate::value::{Shared, Value};
use crate::view::ValueBinding;

new_key_type! {
    /// Identifies a control registered with a [`Session`].
    pub struct ControlId;
}

impl ControlId {
    /// Convert to a raw value for external bookkeeping.
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }

    /// Rebuild from a raw value. Does not check that the control exists.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// A control triggering an action context.
///
/// Every binding to the same action shares the context's re-entrancy
/// guard, so a button and a menu entry cannot run the action twice at once.
#[derive(Debug, Clone)]
pub struct ActionBinding {
    context: Arc<MappingContext>,
}

impl ActionBinding {
    /// Bind to an action or action-list context.
    pub fn new(context: Arc<MappingContext>) -> Result<Self, AccessError> {
        if context.action_guard().is_none() {
            return Err(AccessError::Unsupported(context.name().to_string()));
        }
        Ok(Self { context })
    }

    /// The bound context.
    pub fn context(&self) -> &Arc<MappingContext> {
        &self.context
    }

    /// Text for the control.
    pub fn label(&self) -> &str {
        self.context.display_name()
    }

    /// Keyboard accelerator, if annotated.
    pub fn accelerator(&self) -> Option<&str> {
        self.context.element().accelerator.as_deref()
    }

    /// Returns true while an activation is running.
    pub fn is_running(&self) -> bool {
        self.context.action_guard().is_some_and(|guard| guard.is_running())
    }

    /// Run the action on the context's task runner.
    pub fn activate<C>(&self, continuation: C) -> Result<TaskTicket, TaskError>
    where
        C: FnMut(TaskResult<Value>) + Send + 'static,
    {
        self.context.activate_action(continuation)
    }
}

/// A registered control.
#[derive(Debug, Clone)]
pub enum Control {
    /// A value widget.
    Value(Arc<ValueBinding>),
    /// A button or menu entry.
    Action(ActionBinding),
}

impl Control {
    /// The bound context.
    pub fn context(&self) -> &Arc<MappingContext> {
        match self {
            Control::Value(binding) => binding.context(),
            Control::Action(binding) => binding.context(),
        }
    }

    fn detach(&self) {
        if let Control::Value(binding) = self {
            binding.detach();
        }
    }
}

/// A context tree and its controls.
pub struct Session {
    tree: ContextTree,
    controls: Mutex<SlotMap<ControlId, Control>>,
    closed: AtomicBool,
    on_closed: Signal<()>,
}

impl Session {
    /// Take ownership of a tree and populate it.
    pub fn new(tree: ContextTree) -> Self {
        tree.populate();
        Self {
            tree,
            controls: Mutex::new(SlotMap::with_key()),
            closed: AtomicBool::new(false),
            on_closed: Signal::new(),
        }
    }

    /// Build a populated session over `object`.
    pub fn for_object<T: Describe>(config: Arc<EngineConfig>, object: Shared<T>) -> Result<Self, AutoGuiError> {
        Ok(Self::new(ContextTree::for_object(config, object)?))
    }

    /// The context tree.
    pub fn tree(&self) -> &ContextTree {
        &self.tree
    }

    /// Register a control for `context`. Action contexts get an
    /// [`ActionBinding`], everything else a [`ValueBinding`].
    pub fn bind(&self, context: &Arc<MappingContext>) -> Result<ControlId, AccessError> {
        if self.is_closed() {
            return Err(AccessError::Host("session is closed".into()));
        }
        if context.is_row_template() {
            return Err(AccessError::Unsupported(context.path()));
        }
        let control = match context.kind() {
            ElementKind::Action | ElementKind::ActionList => Control::Action(ActionBinding::new(context.clone())?),
            _ => Control::Value(ValueBinding::attach(context.clone())),
        };
        let id = self.controls.lock().insert(control);
        tracing::trace!(
            target: targets::SESSION,
            ?id,
            context = %context.path(),
            "bound control"
        );
        Ok(id)
    }

    /// Register a control for every context outside collection rows.
    pub fn bind_all(&self) -> Result<Vec<ControlId>, AccessError> {
        self.tree
            .contexts()
            .iter()
            .filter(|context| !context.is_row_template())
            .map(|context| self.bind(context))
            .collect()
    }

    /// Look up a control.
    pub fn control(&self, id: ControlId) -> Option<Control> {
        self.controls.lock().get(id).cloned()
    }

    /// Controls bound to `context`.
    pub fn controls_for(&self, context: &MappingContext) -> Vec<ControlId> {
        self.controls
            .lock()
            .iter()
            .filter(|(_, control)| std::ptr::eq(control.context().as_ref(), context))
            .map(|(id, _)| id)
            .collect()
    }

    /// Remove a control. Returns false if it was not registered.
    pub fn unbind(&self, id: ControlId) -> bool {
        let removed = self.controls.lock().remove(id);
        match removed {
            Some(control) => {
                control.detach();
                true
            }
            None => false,
        }
    }

    /// Number of registered controls.
    pub fn len(&self) -> usize {
        self.controls.lock().len()
    }

    /// Returns true if no controls are registered.
    pub fn is_empty(&self) -> bool {
        self.controls.lock().is_empty()
    }

    /// Returns true once [`close`](Self::close) ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Emitted once when the session closes.
    pub fn on_closed(&self) -> &Signal<()> {
        &self.on_closed
    }

    /// Tear the session down. Runs once; later calls do nothing.
    #[tracing::instrument(skip_all, target = "horizon_autogui_core::session", level = "debug")]
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let controls: Vec<Control> = self.controls.lock().drain().map(|(_, control)| control).collect();
        for control in &controls {
            control.detach();
        }
        self.tree.disconnect_all();
        self.tree.shutdown();
        tracing::debug!(
            target: targets::SESSION,
            controls = controls.len(),
            "session closed"
        );
        self.on_closed.emit(());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("tree", &self.tree)
            .field("controls", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

static_assertions::assert_impl_all!(Session: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{MemberAttrs, TypeInfo, Visibility};
    use crate::value::shared;
    use std::time::{Duration, Instant};

    static GATE: Mutex<()> = parking_lot::const_mutex(());

    struct Job {
        runs: u32,
        items: Vec<String>,
    }

    impl Describe for Job {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .field_read_only::<u32>("runs", |j| &j.runs, MemberAttrs::new(), Visibility::Public)
                .field::<Vec<String>>("items", |j| &j.items, |j| &mut j.items, MemberAttrs::new(), Visibility::Public)
                .action("run", MemberAttrs::new().accelerator("Ctrl+R"), Visibility::Public, |j| {
                    let _gate = GATE.lock();
                    j.runs += 1;
                    Ok(Value::Null)
                })
                .build()
        }
    }

    fn session(fast_wait: Duration) -> (Shared<Job>, Session) {
        let object = shared(Job {
            runs: 0,
            items: vec!["a".into()],
        });
        let config = EngineConfig::builder().fast_wait(fast_wait).build().unwrap();
        let session = Session::for_object(Arc::new(config), object.clone()).unwrap();
        (object, session)
    }

    #[test]
    fn test_bind_all_skips_rows() {
        let (_object, session) = session(Duration::from_secs(2));
        let ids = session.bind_all().unwrap();
        // Job, runs, items, items collection, run
        assert_eq!(ids.len(), 5);
        let run = session.tree().root().child("run").unwrap();
        let controls = session.controls_for(&run);
        assert_eq!(controls.len(), 1);
        match session.control(controls[0]).unwrap() {
            Control::Action(binding) => {
                assert_eq!(binding.label(), "Run");
                assert_eq!(binding.accelerator(), Some("Ctrl+R"));
            }
            Control::Value(_) => panic!("expected an action binding"),
        }
    }

    #[test]
    fn test_control_id_raw_round_trip() {
        let (_object, session) = session(Duration::from_secs(2));
        let id = session.bind(&session.tree().root().child("runs").unwrap()).unwrap();
        assert_eq!(ControlId::from_raw(id.as_raw()), id);
    }

    #[test]
    fn test_unbind_detaches_listener() {
        let (_object, session) = session(Duration::from_secs(2));
        let runs = session.tree().root().child("runs").unwrap();
        let id = session.bind(&runs).unwrap();
        assert_eq!(runs.source_update_listener_count(), 1);
        assert!(session.unbind(id));
        assert!(!session.unbind(id));
        assert_eq!(runs.source_update_listener_count(), 0);
    }

    #[test]
    fn test_action_bindings_share_guard() {
        let (object, session) = session(Duration::from_millis(20));
        let run = session.tree().root().child("run").unwrap();
        let first = ActionBinding::new(run.clone()).unwrap();
        let second = ActionBinding::new(run).unwrap();

        let held = GATE.lock();
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        first
            .activate(move |result| sink.lock().push(result.is_timeout() || result.is_presented_with_delay()))
            .unwrap();
        assert!(second.is_running());
        assert!(matches!(second.activate(|_| {}), Err(TaskError::AlreadyRunning(_))));
        drop(held);

        let deadline = Instant::now() + Duration::from_secs(5);
        while first.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!first.is_running());
        assert_eq!(object.read().runs, 1);
    }

    #[test]
    fn test_close_tears_down() {
        let (_object, session) = session(Duration::from_secs(2));
        session.bind_all().unwrap();
        let runs = session.tree().root().child("runs").unwrap();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = closed.clone();
        session.on_closed().connect(move |_| flag.store(true, Ordering::SeqCst));

        session.close();
        session.close();
        assert!(session.is_closed());
        assert!(session.is_empty());
        assert_eq!(runs.source_update_listener_count(), 0);
        assert!(closed.load(Ordering::SeqCst));
        assert!(session.bind(&runs).is_err());
    }
}
