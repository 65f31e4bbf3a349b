//! The mapping context tree.
//!
//! A [`ContextTree`] mirrors a [`TypeModel`] element tree over one live
//! root object. Each [`MappingContext`] binds one element at one position
//! in the tree to:
//!
//! - the representation resolved for it,
//! - the last value read from the host object,
//! - a [`TaskClock`] advanced on every touch,
//! - its source-update listeners,
//! - lazily created preferences keyed by its path.
//!
//! Children are created at most once, in element order, by
//! [`create_sub_contexts`](MappingContext::create_sub_contexts). Contexts
//! below a collection element are row templates: they hold no value of
//! their own and are read per row with [`value_at`](MappingContext::value_at).
//!
//! Host accessors run on whatever thread calls the synchronous methods.
//! GUI code uses the `*_async` variants and [`activate_action`](MappingContext::activate_action),
//! which go through the context's [`TaskRunner`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_autogui_core::config::EngineConfig;
//! use horizon_autogui_core::context::ContextTree;
//! use horizon_autogui_core::describe::{Describe, MemberAttrs, TypeInfo, Visibility};
//! use horizon_autogui_core::value::{Value, shared};
//!
//! struct Settings {
//!     volume: u8,
//! }
//!
//! impl Describe for Settings {
//!     fn describe() -> TypeInfo {
//!         TypeInfo::builder::<Self>()
//!             .field::<u8>("volume", |s| &s.volume, |s| &mut s.volume, MemberAttrs::new(), Visibility::Public)
//!             .build()
//!     }
//! }
//!
//! let settings = shared(Settings { volume: 3 });
//! let tree = ContextTree::for_object(Arc::new(EngineConfig::default()), settings.clone()).unwrap();
//! tree.populate();
//!
//! let volume = tree.root().member("volume").unwrap();
//! assert_eq!(volume.source_value(), Value::Integer(3));
//! volume.set_value_from_gui(Value::Integer(300), volume.clock()).unwrap();
//! assert_eq!(settings.read().volume, 255);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};

use crate::clock::{SharedTaskClock, TaskClock};
use crate::config::EngineConfig;
use crate::describe::{Describe, MemberAccess};
use crate::error::{AccessError, AutoGuiError, TaskError, ValueError};
use crate::logging::targets;
use crate::preferences::{ContextPreferences, PATH_SEPARATOR, PreferencesStore};
use crate::repr::Representation;
use crate::signal::{ConnectionId, Signal, panic_message};
use crate::task_runner::{ActionGuard, TaskContext, TaskKind, TaskResult, TaskRunner, TaskTicket};
use crate::type_model::{ElementId, ElementKind, TypeElement, TypeModel};
use crate::value::{ObjectRef, Shared, Value};

/// Delivered to source-update listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUpdate {
    /// The new value.
    pub value: Value,
    /// The context clock after the update.
    pub clock: TaskClock,
}

/// Result of a clock-gated write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The value was written; the context clock is now the given one.
    Applied(TaskClock),
    /// The incoming clock was older than the context clock; nothing was
    /// written.
    Stale,
}

#[derive(Debug, Default)]
struct SourceState {
    value: Value,
    read: bool,
}

struct TreeShared {
    config: Arc<EngineConfig>,
    model: Arc<TypeModel>,
    runner: Arc<TaskRunner>,
    preferences: Arc<PreferencesStore>,
    root_value: RwLock<Value>,
}

/// A live node binding a type element to its current value.
pub struct MappingContext {
    shared: Arc<TreeShared>,
    element_id: ElementId,
    parent: Weak<MappingContext>,
    row_template: bool,
    representation: OnceLock<Arc<dyn Representation>>,
    source: Mutex<SourceState>,
    clock: SharedTaskClock,
    children: OnceLock<Vec<Arc<MappingContext>>>,
    listeners: Signal<SourceUpdate>,
    preferences: OnceLock<Arc<ContextPreferences>>,
    runner_override: RwLock<Option<Arc<TaskRunner>>>,
    selection: Mutex<Vec<usize>>,
    selection_changed: Signal<Vec<usize>>,
    action_guard: Option<ActionGuard>,
}

impl MappingContext {
    fn new(
        shared: Arc<TreeShared>,
        element_id: ElementId,
        parent: Option<&Arc<MappingContext>>,
        generation: u32,
    ) -> Arc<Self> {
        let element = &shared.model[element_id];
        let row_template =
            element.kind == ElementKind::Element || parent.is_some_and(|p| p.row_template);
        let action_guard = matches!(element.kind, ElementKind::Action | ElementKind::ActionList)
            .then(|| ActionGuard::new(element.name.clone()));

        Arc::new(Self {
            shared,
            element_id,
            parent: parent.map(Arc::downgrade).unwrap_or_default(),
            row_template,
            representation: OnceLock::new(),
            source: Mutex::new(SourceState::default()),
            clock: SharedTaskClock::new(TaskClock::new(generation, 0)),
            children: OnceLock::new(),
            listeners: Signal::new(),
            preferences: OnceLock::new(),
            runner_override: RwLock::new(None),
            selection: Mutex::new(Vec::new()),
            selection_changed: Signal::new(),
            action_guard,
        })
    }

    /// The element this context binds.
    pub fn element(&self) -> &TypeElement {
        &self.shared.model[self.element_id]
    }

    /// The element id.
    pub fn element_id(&self) -> ElementId {
        self.element_id
    }

    /// The element kind.
    pub fn kind(&self) -> ElementKind {
        self.element().kind
    }

    /// The element name.
    pub fn name(&self) -> &str {
        &self.element().name
    }

    /// The name shown to the user.
    pub fn display_name(&self) -> &str {
        &self.element().display_name
    }

    /// The type model of the tree.
    pub fn model(&self) -> &TypeModel {
        &self.shared.model
    }

    /// The engine configuration of the tree.
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// The parent context, `None` for the root.
    pub fn parent(&self) -> Option<Arc<MappingContext>> {
        self.parent.upgrade()
    }

    /// Child contexts. Empty until [`create_sub_contexts`](Self::create_sub_contexts) ran.
    pub fn children(&self) -> &[Arc<MappingContext>] {
        self.children.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The direct child with the given element name.
    pub fn child(&self, name: &str) -> Option<Arc<MappingContext>> {
        self.children().iter().find(|c| c.name() == name).cloned()
    }

    /// Find a member by name, looking through the object pane of a
    /// property holding a nested object.
    pub fn member(&self, name: &str) -> Option<Arc<MappingContext>> {
        self.child(name).or_else(|| match self.children() {
            [only] if only.kind() == ElementKind::Object => only.child(name),
            _ => None,
        })
    }

    /// Names of this context and its ancestors, root first, joined by `/`.
    pub fn path(&self) -> String {
        let mut names = vec![self.name().to_string()];
        let mut current = self.parent();
        while let Some(context) = current {
            names.push(context.name().to_string());
            current = context.parent();
        }
        names.reverse();
        names.join(&PATH_SEPARATOR.to_string())
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(context) = current {
            depth += 1;
            current = context.parent();
        }
        depth
    }

    /// Returns true for contexts at or below a collection element.
    pub fn is_row_template(&self) -> bool {
        self.row_template
    }

    /// The representation, resolved on first use.
    pub fn representation(&self) -> Arc<dyn Representation> {
        self.representation
            .get_or_init(|| {
                self.shared
                    .config
                    .representations()
                    .resolve(&self.shared.model, self.element())
            })
            .clone()
    }

    /// The last value read from the host object.
    pub fn source_value(&self) -> Value {
        self.source.lock().value.clone()
    }

    /// Returns true once the value has been read at least once.
    pub fn has_been_read(&self) -> bool {
        self.source.lock().read
    }

    /// The current clock.
    pub fn clock(&self) -> TaskClock {
        self.clock.get()
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create the child contexts of this context and, depth-first, of all
    /// descendants. Returns the existing children when run again.
    ///
    /// An object context whose element already appears among its ancestors
    /// gets no children, so recursive types stop after one level.
    pub fn create_sub_contexts(self: &Arc<Self>) -> &[Arc<MappingContext>] {
        let children = self.children.get_or_init(|| self.build_children());
        for child in children {
            child.create_sub_contexts();
        }
        children
    }

    fn build_children(self: &Arc<Self>) -> Vec<Arc<MappingContext>> {
        if self.kind() == ElementKind::Object && self.has_ancestor_element(self.element_id) {
            tracing::debug!(
                target: targets::CONTEXT,
                context = %self.name(),
                "recursive object type; not expanding"
            );
            return Vec::new();
        }
        let generation = self.clock.get().generation;
        self.element()
            .children
            .iter()
            .map(|id| MappingContext::new(self.shared.clone(), *id, Some(self), generation))
            .collect()
    }

    fn has_ancestor_element(&self, element_id: ElementId) -> bool {
        let mut current = self.parent();
        while let Some(context) = current {
            if context.element_id == element_id {
                return true;
            }
            current = context.parent();
        }
        false
    }

    // -------------------------------------------------------------------------
    // Reading from the host object
    // -------------------------------------------------------------------------

    /// Re-read this context and all descendants, advancing each touched
    /// context's clock and notifying listeners of contexts whose value
    /// changed. A failing accessor keeps the previous value; siblings still
    /// update.
    #[tracing::instrument(skip_all, target = "horizon_autogui_core::context", level = "trace", fields(context = %self.name()))]
    pub fn update_source_sub_tree(&self) {
        self.update_source();
        for child in self.children() {
            child.update_source_sub_tree();
        }
    }

    /// Re-read this context only. Returns true if the value changed.
    /// Row templates are not read.
    pub fn update_source(&self) -> bool {
        if self.row_template {
            return false;
        }
        let representation = self.representation();
        match catch_unwind(AssertUnwindSafe(|| representation.get_value(self, None))) {
            Ok(Ok(value)) => self.store_source(value),
            Ok(Err(e)) => {
                tracing::error!(
                    target: targets::CONTEXT,
                    context = %self.path(),
                    error = %e,
                    "failed to read value; keeping previous"
                );
                false
            }
            Err(payload) => {
                tracing::error!(
                    target: targets::CONTEXT,
                    context = %self.path(),
                    panic = %panic_message(payload.as_ref()),
                    "accessor panicked; keeping previous value"
                );
                false
            }
        }
    }

    fn store_source(&self, value: Value) -> bool {
        // The clock only moves on a change; a widget holding the last
        // delivered clock must still be able to commit afterwards.
        let clock = {
            let mut source = self.source.lock();
            if source.read && source.value == value {
                return false;
            }
            source.value = value.clone();
            source.read = true;
            self.clock.increment()
        };
        self.listeners.emit(SourceUpdate { value, clock });
        true
    }

    /// Refresh the subtree on the context's task runner.
    ///
    /// A subtree whose representations all read cached values rather than
    /// the host object is refreshed on the calling thread.
    pub fn update_source_sub_tree_async<C>(self: &Arc<Self>, continuation: C) -> TaskTicket
    where
        C: FnMut(TaskResult<()>) + Send + 'static,
    {
        let this = self.clone();
        let task = move |_ctx: &TaskContext| {
            this.update_source_sub_tree();
            Ok(())
        };
        if self.uses_task_runner_in_subtree(TaskKind::GetValue) {
            self.task_runner().run_with_continuation(task, continuation)
        } else {
            self.task_runner().run_inline(task, continuation)
        }
    }

    /// Whether any context in this subtree routes `kind` through the task
    /// runner. Row templates are never read directly and are skipped.
    pub fn uses_task_runner_in_subtree(&self, kind: TaskKind) -> bool {
        (!self.row_template && self.representation().is_task_runner_used_for(kind))
            || self.children().iter().any(|child| child.uses_task_runner_in_subtree(kind))
    }

    /// Read the value of one row. Only meaningful for row templates and
    /// collections; other contexts ignore the row.
    pub fn value_at(&self, row: usize) -> Result<Value, AccessError> {
        self.representation().get_value(self, Some(row))
    }

    /// Number of rows of the collection this context belongs to.
    pub fn row_count(&self) -> usize {
        match self.enclosing_collection() {
            Some(collection) => collection.source_value().as_list().map_or(0, <[Value]>::len),
            None => 0,
        }
    }

    fn enclosing_collection(&self) -> Option<Arc<MappingContext>> {
        if self.kind() == ElementKind::Collection {
            // Recover the owning Arc through the parent
            return self.parent().and_then(|p| p.child(self.name()));
        }
        let mut current = self.parent();
        while let Some(context) = current {
            if context.kind() == ElementKind::Collection {
                return Some(context);
            }
            current = context.parent();
        }
        None
    }

    /// The value of this context as seen by its children.
    fn current_value(&self, row: Option<usize>) -> Result<Value, AccessError> {
        if self.row_template {
            return self.representation().get_value(self, row);
        }
        {
            let source = self.source.lock();
            if source.read {
                return Ok(source.value.clone());
            }
        }
        self.representation().get_value(self, None)
    }

    fn owner_object(&self, row: Option<usize>) -> Result<ObjectRef, AccessError> {
        let parent = self
            .parent()
            .ok_or_else(|| AccessError::MissingOwner(self.name().to_string()))?;
        match parent.current_value(row)? {
            Value::Object(object) => Ok(object),
            _ => Err(AccessError::MissingOwner(self.name().to_string())),
        }
    }

    /// Read the raw member value through the element accessors.
    ///
    /// Objects read their parent's value (or the root object), properties
    /// call their getter on the owning object, and collection elements pick
    /// their row out of the collection.
    pub(crate) fn read_member(&self, row: Option<usize>) -> Result<Value, AccessError> {
        let element = self.element();
        match element.kind {
            ElementKind::Object => match self.parent() {
                None => Ok(self.shared.root_value.read().clone()),
                Some(parent) => parent.current_value(row),
            },
            ElementKind::Property => {
                let owner = self.owner_object(row)?;
                match &element.access {
                    Some(MemberAccess::Field { get, .. }) => {
                        let guard = owner.read();
                        let object: &dyn Any = &*guard;
                        get(object)
                    }
                    _ => Err(AccessError::Unsupported(element.name.clone())),
                }
            }
            ElementKind::Collection | ElementKind::Value => match self.parent() {
                Some(parent) => parent.current_value(row),
                None => Err(AccessError::MissingOwner(element.name.clone())),
            },
            ElementKind::Element => {
                let Some(row) = row else {
                    return Ok(Value::Null);
                };
                let collection = self
                    .parent()
                    .ok_or_else(|| AccessError::MissingOwner(element.name.clone()))?;
                let items = list_items(collection.current_value(None)?);
                let len = items.len();
                items
                    .into_iter()
                    .nth(row)
                    .ok_or(AccessError::RowOutOfBounds { row, len })
            }
            ElementKind::Action | ElementKind::ActionList => Ok(Value::Null),
        }
    }

    // -------------------------------------------------------------------------
    // Writing to the host object
    // -------------------------------------------------------------------------

    /// Write the raw member value through the element accessors.
    pub(crate) fn write_member(&self, row: Option<usize>, value: Value) -> Result<(), AccessError> {
        let element = self.element();
        match element.kind {
            ElementKind::Property => {
                let owner = self.owner_object(row)?;
                match &element.access {
                    Some(MemberAccess::Field { set: Some(set), .. }) if !element.attrs.read_only => {
                        let mut guard = owner.write();
                        let object: &mut dyn Any = &mut *guard;
                        set(object, value)
                    }
                    _ => Err(AccessError::ReadOnly(element.name.clone())),
                }
            }
            ElementKind::Collection | ElementKind::Value => match self.parent() {
                Some(parent) => parent.write_member(row, value),
                None => Err(AccessError::MissingOwner(element.name.clone())),
            },
            ElementKind::Element => {
                let row = row.ok_or_else(|| AccessError::Unsupported(element.name.clone()))?;
                let collection = self
                    .parent()
                    .ok_or_else(|| AccessError::MissingOwner(element.name.clone()))?;
                let mut items = list_items(collection.current_value(None)?);
                let len = items.len();
                let slot = items
                    .get_mut(row)
                    .ok_or(AccessError::RowOutOfBounds { row, len })?;
                *slot = value;
                collection.write_member(None, Value::List(items))
            }
            _ => Err(AccessError::ReadOnly(element.name.clone())),
        }
    }

    /// Whether the member behind this context has a usable setter.
    pub fn is_member_writable(&self) -> bool {
        match self.kind() {
            ElementKind::Property => self.element().is_writable(),
            ElementKind::Collection | ElementKind::Element | ElementKind::Value => {
                self.parent().is_some_and(|p| p.is_member_writable())
            }
            _ => false,
        }
    }

    /// Write a value edited in the GUI, gated by the widget's clock.
    ///
    /// If `clock` is older than the context clock the write is dropped and
    /// [`UpdateOutcome::Stale`] returned. Otherwise the value goes through
    /// the representation, is read back, recorded in the history, and
    /// delivered to listeners with a clock newer than both.
    #[tracing::instrument(skip_all, target = "horizon_autogui_core::context", level = "trace", fields(context = %self.name()))]
    pub fn set_value_from_gui(&self, value: Value, clock: TaskClock) -> Result<UpdateOutcome, AccessError> {
        if self.clock.is_older_with_set(clock) {
            tracing::debug!(
                target: targets::CONTEXT,
                context = %self.path(),
                incoming = %clock,
                current = %self.clock.get(),
                "stale update dropped"
            );
            return Ok(UpdateOutcome::Stale);
        }

        let representation = self.representation();
        representation.set_value(self, None, value)?;
        let current = representation.get_value(self, None)?;
        self.record_history(representation.as_ref(), &current);

        let new_clock = {
            let mut source = self.source.lock();
            source.value = current.clone();
            source.read = true;
            self.clock.advance_past(clock)
        };
        self.listeners.emit(SourceUpdate {
            value: current,
            clock: new_clock,
        });
        for child in self.children() {
            child.update_source_sub_tree();
        }
        Ok(UpdateOutcome::Applied(new_clock))
    }

    /// [`set_value_from_gui`](Self::set_value_from_gui) on the task runner,
    /// or on the calling thread if the representation handles writes
    /// locally.
    pub fn set_value_from_gui_async<C>(self: &Arc<Self>, value: Value, clock: TaskClock, continuation: C) -> TaskTicket
    where
        C: FnMut(TaskResult<UpdateOutcome>) + Send + 'static,
    {
        let this = self.clone();
        let task = move |_ctx: &TaskContext| this.set_value_from_gui(value, clock).map_err(TaskError::from);
        if self.representation().is_task_runner_used_for(TaskKind::SetValue) {
            self.task_runner().run_with_continuation(task, continuation)
        } else {
            self.task_runner().run_inline(task, continuation)
        }
    }

    /// Write the value of one row and refresh the enclosing collection.
    /// Returns the value read back.
    pub fn set_value_at(&self, row: usize, value: Value) -> Result<Value, AccessError> {
        let representation = self.representation();
        representation.set_value(self, Some(row), value)?;
        if let Some(collection) = self.enclosing_collection() {
            if let Some(property) = collection.parent() {
                property.update_source();
            }
            collection.update_source();
        }
        representation.get_value(self, Some(row))
    }

    // -------------------------------------------------------------------------
    // Actions and selection
    // -------------------------------------------------------------------------

    /// Call the action accessor on the owning object.
    pub(crate) fn invoke_member(&self, argument: Option<Value>) -> Result<Value, AccessError> {
        let element = self.element();
        let invoke = match &element.access {
            Some(MemberAccess::Action { invoke } | MemberAccess::ActionList { invoke, .. }) => invoke.clone(),
            _ => return Err(AccessError::Unsupported(element.name.clone())),
        };
        let owner = self.owner_object(None)?;
        let mut guard = owner.write();
        let object: &mut dyn Any = &mut *guard;
        invoke(object, argument)
    }

    /// Invoke the action synchronously, then refresh the owning object and
    /// apply selection updates.
    pub fn invoke_action(&self) -> Result<Value, AccessError> {
        let result = self.representation().invoke(self)?;
        if let Some(owner) = self.parent() {
            owner.update_source_sub_tree();
        }
        if self.element().attrs.selection_updater {
            self.apply_selection_update(&result);
        }
        Ok(result)
    }

    /// Invoke the action on the task runner, rejecting re-activation while
    /// a previous activation is still running.
    pub fn activate_action<C>(self: &Arc<Self>, continuation: C) -> Result<TaskTicket, TaskError>
    where
        C: FnMut(TaskResult<Value>) + Send + 'static,
    {
        let guard = self
            .action_guard
            .as_ref()
            .ok_or_else(|| AccessError::Unsupported(self.name().to_string()))?;
        let this = self.clone();
        let task = move |_ctx: &TaskContext| this.invoke_action().map_err(TaskError::from);
        if self.representation().is_task_runner_used_for(TaskKind::Action) {
            self.task_runner().run_action(guard, task, continuation)
        } else {
            self.task_runner().run_action_inline(guard, task, continuation)
        }
    }

    /// The re-entrancy guard of an action context.
    pub fn action_guard(&self) -> Option<&ActionGuard> {
        self.action_guard.as_ref()
    }

    /// Collection contexts among the siblings this action is linked to.
    ///
    /// A `selection_target` restricts the result to the named member; list
    /// actions only link to collections whose element type matches their
    /// parameter.
    pub fn linked_collections(&self) -> Vec<Arc<MappingContext>> {
        let Some(owner) = self.parent() else {
            return Vec::new();
        };
        let element = self.element();
        let parameter = match element.kind {
            ElementKind::ActionList => element.value_type.element_type(),
            _ => None,
        };
        owner
            .children()
            .iter()
            .filter(|sibling| sibling.kind() == ElementKind::Property)
            .filter(|sibling| {
                element
                    .attrs
                    .selection_target
                    .as_deref()
                    .is_none_or(|target| target == sibling.name())
            })
            .filter_map(|sibling| {
                sibling
                    .children()
                    .iter()
                    .find(|c| c.kind() == ElementKind::Collection)
                    .cloned()
            })
            .filter(|collection| {
                parameter.is_none_or(|p| collection.element().value_type.element_type() == Some(p))
            })
            .collect()
    }

    /// The selected elements of the first linked collection, as a list.
    pub fn selected_elements(&self) -> Result<Value, AccessError> {
        let collection = self
            .linked_collections()
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::Unsupported(self.name().to_string()))?;
        let items = list_items(collection.source_value());
        let selected = collection
            .selection()
            .into_iter()
            .filter_map(|row| items.get(row).cloned())
            .collect();
        Ok(Value::List(selected))
    }

    fn apply_selection_update(&self, result: &Value) {
        let targets: Vec<Value> = match result {
            Value::Null => return,
            Value::List(items) => items.clone(),
            other => vec![other.clone()],
        };
        for collection in self.linked_collections() {
            let rows: Vec<usize> = list_items(collection.source_value())
                .iter()
                .enumerate()
                .filter(|(_, item)| targets.contains(item))
                .map(|(row, _)| row)
                .collect();
            if !rows.is_empty() {
                collection.set_selection(rows);
            }
        }
    }

    /// Selected rows of a collection context, ascending.
    pub fn selection(&self) -> Vec<usize> {
        self.selection.lock().clone()
    }

    /// Replace the selection. Emits `selection_changed` if it differs.
    pub fn set_selection(&self, mut rows: Vec<usize>) {
        rows.sort_unstable();
        rows.dedup();
        let changed = {
            let mut selection = self.selection.lock();
            if *selection == rows {
                false
            } else {
                *selection = rows.clone();
                true
            }
        };
        if changed {
            self.selection_changed.emit(rows);
        }
    }

    /// Emitted with the new rows whenever the selection changes.
    pub fn on_selection_changed(&self) -> &Signal<Vec<usize>> {
        &self.selection_changed
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    /// Register a listener notified when the source value changes.
    /// Listeners run in registration order; a panicking listener does not
    /// stop the others.
    pub fn add_source_update_listener<F>(&self, listener: F) -> ConnectionId
    where
        F: Fn(&SourceUpdate) + Send + Sync + 'static,
    {
        self.listeners.connect(listener)
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove_source_update_listener(&self, id: ConnectionId) -> bool {
        self.listeners.disconnect(id)
    }

    /// Number of registered listeners.
    pub fn source_update_listener_count(&self) -> usize {
        self.listeners.connection_count()
    }

    /// The listener signal, e.g. for queued connections.
    pub fn source_updates(&self) -> &Signal<SourceUpdate> {
        &self.listeners
    }

    // -------------------------------------------------------------------------
    // Text, history, and task runner
    // -------------------------------------------------------------------------

    /// Canonical text of `value`.
    pub fn to_display_string(&self, value: &Value) -> String {
        self.representation().to_human_readable_string(self, value)
    }

    /// Parse canonical text.
    pub fn from_display_string(&self, text: &str) -> Result<Value, ValueError> {
        self.representation().from_human_readable_string(self, text)
    }

    /// Whether the GUI may edit this context.
    pub fn is_editable(&self) -> bool {
        self.representation().is_editable(self)
    }

    /// The preferences of this context.
    pub fn preferences(&self) -> Arc<ContextPreferences> {
        self.preferences
            .get_or_init(|| self.shared.preferences.context(&self.path()))
            .clone()
    }

    /// Recent committed values, most recent first.
    pub fn history(&self) -> Vec<Value> {
        let representation = self.representation();
        if !representation.is_history_supported(self) {
            return Vec::new();
        }
        self.preferences()
            .history_values()
            .iter()
            .filter_map(|json| representation.from_json(self, json))
            .collect()
    }

    fn record_history(&self, representation: &dyn Representation, value: &Value) {
        if !representation.is_history_supported(self) {
            return;
        }
        if let Some(json) = representation.to_json(self, value) {
            self.preferences().add_history_value(json);
        }
    }

    /// The runner for this subtree: the nearest override, or the tree's.
    pub fn task_runner(&self) -> Arc<TaskRunner> {
        if let Some(runner) = self.runner_override.read().clone() {
            return runner;
        }
        match self.parent() {
            Some(parent) => parent.task_runner(),
            None => self.shared.runner.clone(),
        }
    }

    /// Route this subtree through a different runner, or back to the
    /// inherited one with `None`.
    pub fn set_task_runner(&self, runner: Option<Arc<TaskRunner>>) {
        *self.runner_override.write() = runner;
    }

    fn bump_generation(&self) {
        self.clock.bump_generation();
        // Re-deliver on the next read so widgets pick up the new generation
        self.source.lock().read = false;
        for child in self.children() {
            child.bump_generation();
        }
    }

    fn disconnect_subtree(&self) {
        self.listeners.disconnect_all();
        self.selection_changed.disconnect_all();
        for child in self.children() {
            child.disconnect_subtree();
        }
    }
}

fn list_items(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) => items,
        _ => Vec::new(),
    }
}

impl fmt::Debug for MappingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingContext")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("clock", &self.clock())
            .field("children", &self.children().len())
            .finish()
    }
}

/// Builder for [`ContextTree`].
pub struct ContextTreeBuilder {
    config: Arc<EngineConfig>,
    model: Arc<TypeModel>,
    root_element: ElementId,
    root: Value,
    name: String,
    runner: Option<Arc<TaskRunner>>,
    preferences: Option<Arc<PreferencesStore>>,
}

impl ContextTreeBuilder {
    /// Name of the executor thread created for the tree.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use an existing task runner instead of creating one.
    pub fn runner(mut self, runner: Arc<TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Use an existing preferences store.
    pub fn preferences(mut self, preferences: Arc<PreferencesStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Create the tree with its root context. Sub-contexts are created by
    /// [`ContextTree::populate`].
    pub fn build(self) -> Result<ContextTree, AutoGuiError> {
        let owns_runner = self.runner.is_none();
        let runner = match self.runner {
            Some(runner) => runner,
            None => Arc::new(self.config.create_task_runner(&self.name)?),
        };
        let preferences = self
            .preferences
            .unwrap_or_else(|| Arc::new(PreferencesStore::new(self.config.history_limit())));
        let shared = Arc::new(TreeShared {
            config: self.config,
            model: self.model,
            runner,
            preferences,
            root_value: RwLock::new(self.root),
        });
        let root = MappingContext::new(shared.clone(), self.root_element, None, 0);
        tracing::debug!(
            target: targets::CONTEXT,
            root = %root.name(),
            "context tree created"
        );
        Ok(ContextTree {
            shared,
            root,
            owns_runner,
        })
    }
}

/// A context tree over one root object.
pub struct ContextTree {
    shared: Arc<TreeShared>,
    root: Arc<MappingContext>,
    owns_runner: bool,
}

impl ContextTree {
    /// Create a tree with a runner of its own and fresh preferences.
    pub fn new(
        config: Arc<EngineConfig>,
        model: Arc<TypeModel>,
        root_element: ElementId,
        root: Value,
    ) -> Result<Self, AutoGuiError> {
        Self::builder(config, model, root_element, root).build()
    }

    /// Start building a tree over `root` for the element `root_element` of
    /// a frozen model.
    pub fn builder(
        config: Arc<EngineConfig>,
        model: Arc<TypeModel>,
        root_element: ElementId,
        root: Value,
    ) -> ContextTreeBuilder {
        ContextTreeBuilder {
            config,
            model,
            root_element,
            root,
            name: "autogui-context".to_string(),
            runner: None,
            preferences: None,
        }
    }

    /// Describe `T`, freeze the model, and create a tree over `object`.
    pub fn for_object<T: Describe>(config: Arc<EngineConfig>, object: Shared<T>) -> Result<Self, AutoGuiError> {
        let mut model = TypeModel::new(config.inclusion());
        let root_element = model.describe::<T>();
        Self::new(config, Arc::new(model), root_element, Value::Object(ObjectRef::new(object)))
    }

    /// The root context.
    pub fn root(&self) -> &Arc<MappingContext> {
        &self.root
    }

    /// The frozen type model.
    pub fn model(&self) -> &Arc<TypeModel> {
        &self.shared.model
    }

    /// The engine configuration.
    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.shared.config
    }

    /// The default task runner.
    pub fn runner(&self) -> &Arc<TaskRunner> {
        &self.shared.runner
    }

    /// The preferences store.
    pub fn preferences(&self) -> &Arc<PreferencesStore> {
        &self.shared.preferences
    }

    /// The root object.
    pub fn root_value(&self) -> Value {
        self.shared.root_value.read().clone()
    }

    /// Create all contexts and read their values.
    pub fn populate(&self) {
        self.root.create_sub_contexts();
        self.root.update_source_sub_tree();
    }

    /// Point the tree at a new root object. Clocks move to a new generation
    /// and every context is re-read.
    pub fn reset_root(&self, root: Value) {
        *self.shared.root_value.write() = root;
        self.root.bump_generation();
        self.root.update_source_sub_tree();
    }

    /// Find a context by its path.
    pub fn find(&self, path: &str) -> Option<Arc<MappingContext>> {
        let mut names = path.split(PATH_SEPARATOR).filter(|s| !s.is_empty());
        if names.next()? != self.root.name() {
            return None;
        }
        names.try_fold(self.root.clone(), |context, name| context.child(name))
    }

    /// All contexts, depth-first, root first.
    pub fn contexts(&self) -> Vec<Arc<MappingContext>> {
        fn walk(context: &Arc<MappingContext>, out: &mut Vec<Arc<MappingContext>>) {
            out.push(context.clone());
            for child in context.children() {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// Disconnect every listener in the tree.
    pub fn disconnect_all(&self) {
        self.root.disconnect_subtree();
    }

    /// Stop the executor thread if the tree created its runner. Runners
    /// passed to the builder are left alone.
    pub fn shutdown(&self) {
        if !self.owns_runner {
            return;
        }
        let executor = self.shared.runner.executor();
        if executor.is_current_thread() {
            executor.stop();
        } else {
            executor.stop_and_join();
        }
    }
}

impl fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextTree")
            .field("root", &self.root.name())
            .field("contexts", &self.contexts().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(MappingContext: Send, Sync);
static_assertions::assert_impl_all!(ContextTree: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{MemberAttrs, TypeInfo, Visibility};
    use crate::value::shared;
    use crate::repr::RepresentationSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handles `title` and `add_item` without the task runner.
    #[derive(Debug)]
    struct CallerThreadRepr;

    impl Representation for CallerThreadRepr {
        fn name(&self) -> &'static str {
            "caller-thread"
        }

        fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
            element.name == "title" || element.name == "add_item"
        }

        fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
            value.as_str().unwrap_or_default().to_string()
        }

        fn from_human_readable_string(&self, _context: &MappingContext, text: &str) -> Result<Value, ValueError> {
            Ok(Value::from(text))
        }

        fn is_task_runner_used_for(&self, _kind: TaskKind) -> bool {
            false
        }

        fn invoke(&self, context: &MappingContext) -> Result<Value, AccessError> {
            context.invoke_member(None)
        }
    }

    struct Item {
        label: String,
        weight: f64,
    }

    impl Describe for Item {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .describe_with(Self::describe)
                .field::<String>("label", |i| &i.label, |i| &mut i.label, MemberAttrs::new(), Visibility::Public)
                .field::<f64>("weight", |i| &i.weight, |i| &mut i.weight, MemberAttrs::new(), Visibility::Public)
                .build()
        }
    }

    struct Node {
        name: String,
        next: Option<Shared<Node>>,
    }

    impl Describe for Node {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .describe_with(Self::describe)
                .field::<String>("name", |n| &n.name, |n| &mut n.name, MemberAttrs::new(), Visibility::Public)
                .field::<Option<Shared<Node>>>("next", |n| &n.next, |n| &mut n.next, MemberAttrs::new(), Visibility::Public)
                .build()
        }
    }

    struct Store {
        title: String,
        count: u8,
        tags: Vec<String>,
        items: Vec<Shared<Item>>,
        fail: bool,
    }

    impl Describe for Store {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .describe_with(Self::describe)
                .field::<String>("title", |s| &s.title, |s| &mut s.title, MemberAttrs::new(), Visibility::Public)
                .field::<u8>("count", |s| &s.count, |s| &mut s.count, MemberAttrs::new(), Visibility::Public)
                .field::<Vec<String>>("tags", |s| &s.tags, |s| &mut s.tags, MemberAttrs::new(), Visibility::Public)
                .field::<Vec<Shared<Item>>>("items", |s| &s.items, |s| &mut s.items, MemberAttrs::new(), Visibility::Public)
                .property::<String>(
                    "status",
                    |s: &Store| {
                        if s.fail {
                            panic!("status unavailable");
                        }
                        Value::from("ok")
                    },
                    None::<fn(&mut Store, String)>,
                    MemberAttrs::new(),
                    Visibility::Public,
                )
                .action_list::<Vec<Shared<Item>>>(
                    "heavier",
                    MemberAttrs::new().selection_updater(),
                    Visibility::Public,
                    |_, selected| {
                        for item in &selected {
                            item.write().weight += 1.0;
                        }
                        Ok(Value::List(selected.iter().map(|i| Value::Object(ObjectRef::new(i.clone()))).collect()))
                    },
                )
                .action("add_item", MemberAttrs::new().selection_updater(), Visibility::Public, |s| {
                    let item = shared(Item { label: format!("item {}", s.items.len()), weight: 0.0 });
                    s.items.push(item.clone());
                    Ok(Value::Object(ObjectRef::new(item)))
                })
                .build()
        }
    }

    fn store() -> Shared<Store> {
        shared(Store {
            title: "shop".into(),
            count: 1,
            tags: vec!["a".into(), "b".into()],
            items: vec![
                shared(Item { label: "apple".into(), weight: 1.5 }),
                shared(Item { label: "pear".into(), weight: 2.0 }),
            ],
            fail: false,
        })
    }

    fn tree_for<T: Describe>(object: Shared<T>) -> ContextTree {
        tree_with(Arc::new(EngineConfig::default()), object)
    }

    fn tree_with<T: Describe>(config: Arc<EngineConfig>, object: Shared<T>) -> ContextTree {
        let runner = Arc::new(TaskRunner::with_defaults("context-test").unwrap());
        let mut model = TypeModel::new(config.inclusion());
        let root_element = model.describe::<T>();
        ContextTree::builder(config, Arc::new(model), root_element, Value::Object(ObjectRef::new(object)))
            .runner(runner)
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_sub_contexts_is_idempotent() {
        let tree = tree_for(store());
        let first: Vec<_> = tree.root().create_sub_contexts().iter().map(Arc::as_ptr).collect();
        let count = tree.contexts().len();
        let second: Vec<_> = tree.root().create_sub_contexts().iter().map(Arc::as_ptr).collect();
        assert_eq!(first, second);
        assert_eq!(tree.contexts().len(), count);
    }

    #[test]
    fn test_collection_subtree_has_depth_two() {
        let tree = tree_for(store());
        tree.populate();
        for name in ["tags", "items"] {
            let property = tree.root().child(name).unwrap();
            let collection = &property.children()[0];
            assert_eq!(collection.kind(), ElementKind::Collection);
            let element = &collection.children()[0];
            assert_eq!(element.kind(), ElementKind::Element);
            let leaf = &element.children()[0];
            assert!(matches!(leaf.kind(), ElementKind::Value | ElementKind::Object));
            assert_eq!(leaf.depth() - collection.depth(), 2);
            assert!(leaf.is_row_template());
        }
    }

    #[test]
    fn test_recursive_type_stops_at_repeated_object() {
        let node = shared(Node {
            name: "head".into(),
            next: Some(shared(Node { name: "tail".into(), next: None })),
        });
        let tree = tree_for(node);
        tree.populate();
        let next = tree.root().child("next").unwrap();
        assert_eq!(next.children().len(), 1);
        assert!(next.children()[0].children().is_empty());
    }

    #[test]
    fn test_populate_reads_values_and_paths() {
        let tree = tree_for(store());
        tree.populate();
        let root = tree.root();
        assert_eq!(root.child("title").unwrap().source_value(), Value::from("shop"));
        assert_eq!(root.child("count").unwrap().source_value(), Value::Integer(1));
        assert_eq!(root.child("title").unwrap().path(), "Store/title");
        assert_eq!(tree.find("Store/items/items").unwrap().kind(), ElementKind::Collection);
        assert!(tree.find("Other/title").is_none());
    }

    #[test]
    fn test_update_notifies_only_changed_contexts() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        let title = tree.root().child("title").unwrap();
        let count = tree.root().child("count").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        for context in [&title, &count] {
            let seen = seen.clone();
            let name = context.name().to_string();
            context.add_source_update_listener(move |u| seen.lock().push((name.clone(), u.value.clone())));
        }

        let before = count.clock();
        object.write().title = "market".into();
        tree.root().update_source_sub_tree();

        assert_eq!(*seen.lock(), vec![("title".to_string(), Value::from("market"))]);
        assert_eq!(count.clock(), before);
    }

    #[test]
    fn test_failing_accessor_keeps_previous_value() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        let status = tree.root().child("status").unwrap();
        assert_eq!(status.source_value(), Value::from("ok"));

        object.write().fail = true;
        object.write().count = 9;
        let before = status.clock();
        tree.root().update_source_sub_tree();

        assert_eq!(status.source_value(), Value::from("ok"));
        assert_eq!(status.clock(), before);
        let count = tree.root().child("count").unwrap();
        assert_eq!(count.source_value(), Value::Integer(9));
    }

    #[test]
    fn test_set_value_from_gui_coerces_and_records_history() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        let count = tree.root().child("count").unwrap();

        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        count.add_source_update_listener(move |u| sink.lock().push(u.clone()));

        let outcome = count.set_value_from_gui(Value::Integer(1000), count.clock()).unwrap();
        assert_eq!(object.read().count, 255);
        let UpdateOutcome::Applied(clock) = outcome else {
            panic!("expected the write to apply");
        };
        assert_eq!(clock, count.clock());
        assert_eq!(updates.lock()[0].value, Value::Integer(255));
        assert_eq!(count.history(), vec![Value::Integer(255)]);
    }

    #[test]
    fn test_stale_gui_update_is_dropped() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        let title = tree.root().child("title").unwrap();

        let stale = title.clock();
        title.set_value_from_gui(Value::from("new"), title.clock()).unwrap();
        let outcome = title.set_value_from_gui(Value::from("old"), TaskClock::new(stale.generation, 0)).unwrap();

        assert_eq!(outcome, UpdateOutcome::Stale);
        assert_eq!(object.read().title, "new");
        assert_eq!(title.source_value(), Value::from("new"));
    }

    #[test]
    fn test_clock_never_decreases() {
        let tree = tree_for(store());
        tree.populate();
        let title = tree.root().child("title").unwrap();
        let mut last = title.clock();
        for incoming in [TaskClock::new(0, 50), TaskClock::new(0, 3), TaskClock::new(0, 51)] {
            let _ = title.set_value_from_gui(Value::from("x"), incoming);
            title.update_source();
            assert!(!title.clock().is_older_than(&last));
            last = title.clock();
        }
    }

    #[test]
    fn test_row_access() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();

        let tags = tree.find("Store/tags/tags").unwrap();
        let tag = tags.children()[0].clone();
        assert_eq!(tag.source_value(), Value::Null);
        assert_eq!(tag.row_count(), 2);
        assert_eq!(tag.value_at(1).unwrap(), Value::from("b"));
        assert_eq!(tag.set_value_at(1, Value::from("z")).unwrap(), Value::from("z"));
        assert_eq!(object.read().tags, vec!["a".to_string(), "z".to_string()]);
        assert!(matches!(tag.value_at(5), Err(AccessError::RowOutOfBounds { row: 5, len: 2 })));

        let item = tree.find("Store/items/items").unwrap().children()[0].children()[0].clone();
        let label = item.child("label").unwrap();
        assert_eq!(label.value_at(1).unwrap(), Value::from("pear"));
        label.set_value_at(0, Value::from("quince")).unwrap();
        assert_eq!(object.read().items[0].read().label, "quince");
    }

    #[test]
    fn test_action_list_uses_selection_and_updates_it() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        let items = tree.find("Store/items/items").unwrap();
        let heavier = tree.root().child("heavier").unwrap();

        items.set_selection(vec![1]);
        heavier.invoke_action().unwrap();
        assert_eq!(object.read().items[1].read().weight, 3.0);
        assert_eq!(object.read().items[0].read().weight, 1.5);

        let add = tree.root().child("add_item").unwrap();
        let selections = Arc::new(AtomicUsize::new(0));
        let counter = selections.clone();
        items.on_selection_changed().connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        add.invoke_action().unwrap();
        assert_eq!(items.selection(), vec![2]);
        assert_eq!(items.row_count(), 3);
        assert_eq!(selections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_action_without_collection_has_no_selection() {
        let tree = tree_for(store());
        tree.populate();
        let title = tree.root().child("title").unwrap();
        assert!(title.selected_elements().is_err());
    }

    #[test]
    fn test_activate_action_runs_on_runner() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        let add = tree.root().child("add_item").unwrap();
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        add.activate_action(move |r| sink.lock().push(r.is_present())).unwrap();
        assert_eq!(*results.lock(), vec![true]);
        assert_eq!(object.read().items.len(), 3);
    }

    #[test]
    fn test_reset_root_bumps_generation() {
        let tree = tree_for(store());
        tree.populate();
        let title = tree.root().child("title").unwrap();
        let before = title.clock();

        let other = store();
        other.write().title = "other".into();
        tree.reset_root(Value::Object(ObjectRef::new(other)));

        assert_eq!(title.clock().generation, before.generation + 1);
        assert_eq!(title.source_value(), Value::from("other"));
    }

    #[test]
    fn test_task_runner_override_applies_to_subtree() {
        let tree = tree_for(store());
        tree.populate();
        let items = tree.root().child("items").unwrap();
        let collection = items.children()[0].clone();
        let other = Arc::new(TaskRunner::with_defaults("override").unwrap());

        items.set_task_runner(Some(other.clone()));
        assert!(Arc::ptr_eq(&collection.task_runner(), &other));
        assert!(Arc::ptr_eq(&tree.root().task_runner(), tree.runner()));
        items.set_task_runner(None);
        assert!(Arc::ptr_eq(&collection.task_runner(), tree.runner()));
    }

    #[test]
    fn test_async_refresh() {
        let object = store();
        let tree = tree_for(object.clone());
        tree.populate();
        object.write().count = 42;
        let done = Arc::new(Mutex::new(Vec::new()));
        let sink = done.clone();
        tree.root().update_source_sub_tree_async(move |r| sink.lock().push(r.is_present()));
        assert_eq!(*done.lock(), vec![true]);
        assert_eq!(tree.root().child("count").unwrap().source_value(), Value::Integer(42));
    }

    #[test]
    fn test_refresh_stays_on_caller_without_host_reads() {
        let tree = tree_for(store());
        tree.populate();
        tree.runner().executor().stop_and_join();
        let collection = tree.root().child("items").unwrap().children()[0].clone();
        assert!(!collection.uses_task_runner_in_subtree(TaskKind::GetValue));
        assert!(tree.root().uses_task_runner_in_subtree(TaskKind::GetValue));

        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        collection.update_source_sub_tree_async(move |r| sink.lock().push(r));
        assert!(matches!(results.lock()[0], TaskResult::Present(())));

        let sink = results.clone();
        tree.root().update_source_sub_tree_async(move |r| sink.lock().push(r));
        assert!(matches!(results.lock()[1], TaskResult::Failed(TaskError::ExecutorStopped(_))));
    }

    #[test]
    fn test_writes_and_actions_follow_representation_routing() {
        let mut representations = RepresentationSet::standard();
        representations.insert(0, CallerThreadRepr);
        let config = Arc::new(EngineConfig::builder().representations(representations).build().unwrap());
        let object = store();
        let tree = tree_with(config, object.clone());
        tree.populate();
        tree.runner().executor().stop_and_join();
        let root = tree.root();

        let title = root.child("title").unwrap();
        assert_eq!(title.representation().name(), "caller-thread");
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = written.clone();
        title.set_value_from_gui_async(Value::from("market"), title.clock(), move |r| sink.lock().push(r));
        assert!(matches!(written.lock()[0], TaskResult::Present(UpdateOutcome::Applied(_))));
        assert_eq!(object.read().title, "market");

        // `count` keeps the standard representation and needs the stopped executor
        let count = root.child("count").unwrap();
        let sink = written.clone();
        count.set_value_from_gui_async(Value::Integer(7), count.clock(), move |r| sink.lock().push(r));
        assert!(matches!(written.lock()[1], TaskResult::Failed(TaskError::ExecutorStopped(_))));
        assert_eq!(object.read().count, 1);

        let activated = Arc::new(Mutex::new(Vec::new()));
        let sink = activated.clone();
        root.child("add_item")
            .unwrap()
            .activate_action(move |r| sink.lock().push(r.is_present()))
            .unwrap();
        assert_eq!(*activated.lock(), vec![true]);
        assert_eq!(object.read().items.len(), 3);

        let sink = activated.clone();
        root.child("heavier")
            .unwrap()
            .activate_action(move |r| sink.lock().push(r.is_present()))
            .unwrap();
        assert_eq!(*activated.lock(), vec![true, false]);
    }
}
