//! View selection and the widget side of the update protocol.
//!
//! Widgets are external. This module tells a renderer which kind of view to
//! build for a context ([`ViewMappingSet`]), names the capabilities a widget
//! adapter exposes, and provides [`ValueBinding`], the clock-gated value
//! holder a widget keeps for its context.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::clock::TaskClock;
use crate::context::{MappingContext, SourceUpdate, UpdateOutcome};
use crate::error::{AccessError, AutoGuiError, ValueError};
use crate::logging::targets;
use crate::signal::{ConnectionId, Signal};
use crate::task_runner::{TaskResult, TaskTicket};
use crate::value::Value;

/// Whether a view is requested on its own or as a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    /// A standalone view in a pane.
    View,
    /// A cell renderer/editor in a collection table.
    TableColumn,
}

/// The kind of widget a renderer should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    CheckBox,
    Spinner,
    TextField,
    FilePathField,
    ComboBox,
    Button,
    /// Button acting on the selection of a linked collection.
    SelectionButton,
    Table,
    Pane,
    TabbedPane,
    Label,
    /// A view registered by the application.
    Custom(&'static str),
}

/// Maps (representation name, match type) to a view kind.
#[derive(Debug, Clone)]
pub struct ViewMappingSet {
    mappings: HashMap<(&'static str, MatchType), ViewKind>,
}

impl Default for ViewMappingSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl ViewMappingSet {
    /// A set with no mappings; everything resolves to [`ViewKind::Label`].
    pub fn empty() -> Self {
        Self {
            mappings: HashMap::new(),
        }
    }

    /// Mappings for the standard representations.
    pub fn standard() -> Self {
        use MatchType::{TableColumn, View};

        let mut set = Self::empty();
        for (name, kind) in [
            ("bool", ViewKind::CheckBox),
            ("number", ViewKind::Spinner),
            ("string", ViewKind::TextField),
            ("file-path", ViewKind::FilePathField),
            ("enum", ViewKind::ComboBox),
            ("action", ViewKind::Button),
        ] {
            set.register(name, View, kind);
            set.register(name, TableColumn, kind);
        }
        set.register("action-list", View, ViewKind::SelectionButton);
        set.register("collection-table", View, ViewKind::Table);
        set.register("collection-element", View, ViewKind::Label);
        set.register("property-pane", View, ViewKind::Pane);
        set.register("object-pane", View, ViewKind::Pane);
        set.register("object-tabbed-pane", View, ViewKind::TabbedPane);
        set.register("label", View, ViewKind::Label);
        set
    }

    /// Register or replace a mapping.
    pub fn register(&mut self, representation: &'static str, match_type: MatchType, kind: ViewKind) {
        self.mappings.insert((representation, match_type), kind);
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns true if there are no mappings.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// The view kind for a representation name. Unmapped pairs fall back to
    /// [`ViewKind::Label`].
    pub fn lookup(&self, representation: &'static str, match_type: MatchType) -> ViewKind {
        self.mappings
            .get(&(representation, match_type))
            .copied()
            .unwrap_or(ViewKind::Label)
    }

    /// The view kind for a context.
    pub fn view_kind(&self, context: &MappingContext, match_type: MatchType) -> ViewKind {
        self.lookup(context.representation().name(), match_type)
    }
}

/// Receives the outcome of a committed edit.
pub type CommitCallback = Box<dyn FnMut(TaskResult<UpdateOutcome>) + Send>;

/// A widget whose value the user can edit.
pub trait Editable {
    /// Whether editing is currently allowed.
    fn is_editable(&self) -> bool;

    /// Commit an edited value through the context's task runner. `done`
    /// receives the outcome, and again through the dispatcher if the first
    /// delivery was a timeout.
    fn commit(&self, value: Value, done: CommitCallback) -> TaskTicket;
}

/// A widget offering recent values.
pub trait HistorySupported {
    /// Recent values, newest first.
    fn history(&self) -> Vec<Value>;
}

/// A widget whose value has a canonical text form.
pub trait StringConvertible {
    /// The current value as text.
    fn to_text(&self) -> String;

    /// Parse text and commit it like [`Editable::commit`]. Text that does
    /// not parse is rejected before anything is submitted.
    fn set_from_text(&self, text: &str, done: CommitCallback) -> Result<TaskTicket, ValueError>;
}

/// A context usable as a table column.
pub trait TableColumnRenderable {
    /// Cell text for `row`.
    fn cell_text(&self, row: usize) -> Result<String, AccessError>;

    /// Parse and write cell text for `row`. Returns the value read back.
    fn set_cell_text(&self, row: usize, text: &str) -> Result<Value, AutoGuiError>;
}

impl TableColumnRenderable for MappingContext {
    fn cell_text(&self, row: usize) -> Result<String, AccessError> {
        let value = self.value_at(row)?;
        Ok(self.to_display_string(&value))
    }

    fn set_cell_text(&self, row: usize, text: &str) -> Result<Value, AutoGuiError> {
        let value = self.from_display_string(text)?;
        Ok(self.set_value_at(row, value)?)
    }
}

struct BindingState {
    value: Value,
    clock: TaskClock,
}

/// The value a widget holds for its context.
///
/// Updates from the context are applied only if their clock is not older
/// than the last one applied, so a slow refresh finishing after a newer
/// one is discarded.
pub struct ValueBinding {
    context: Arc<MappingContext>,
    state: Mutex<BindingState>,
    connection: Mutex<Option<ConnectionId>>,
    changed: Signal<Value>,
}

impl ValueBinding {
    /// Bind to `context`, starting from its current value, and listen for
    /// source updates.
    pub fn attach(context: Arc<MappingContext>) -> Arc<Self> {
        let binding = Arc::new(Self {
            state: Mutex::new(BindingState {
                value: context.source_value(),
                clock: context.clock(),
            }),
            context,
            connection: Mutex::new(None),
            changed: Signal::new(),
        });
        let weak: Weak<Self> = Arc::downgrade(&binding);
        let id = binding.context.add_source_update_listener(move |update| {
            if let Some(binding) = weak.upgrade() {
                binding.apply(update);
            }
        });
        *binding.connection.lock() = Some(id);
        binding
    }

    /// The bound context.
    pub fn context(&self) -> &Arc<MappingContext> {
        &self.context
    }

    /// The value shown by the widget.
    pub fn value(&self) -> Value {
        self.state.lock().value.clone()
    }

    /// The clock of the last applied update.
    pub fn clock(&self) -> TaskClock {
        self.state.lock().clock
    }

    /// Apply an update unless it is older than the last applied one.
    /// Returns true if it was applied.
    pub fn apply(&self, update: &SourceUpdate) -> bool {
        {
            let mut state = self.state.lock();
            if update.clock.is_older_than(&state.clock) {
                tracing::trace!(
                    target: targets::VIEW,
                    incoming = %update.clock,
                    held = %state.clock,
                    "discarding out-of-order update"
                );
                return false;
            }
            state.value = update.value.clone();
            state.clock = update.clock;
        }
        self.changed.emit(update.value.clone());
        true
    }

    /// Emitted with the new value whenever an update is applied.
    pub fn on_changed(&self) -> &Signal<Value> {
        &self.changed
    }

    /// Stop listening to the context.
    pub fn detach(&self) {
        if let Some(id) = self.connection.lock().take() {
            self.context.remove_source_update_listener(id);
        }
    }

    /// Returns true while listening.
    pub fn is_attached(&self) -> bool {
        self.connection.lock().is_some()
    }
}

impl Drop for ValueBinding {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Editable for ValueBinding {
    fn is_editable(&self) -> bool {
        self.context.is_editable()
    }

    fn commit(&self, value: Value, done: CommitCallback) -> TaskTicket {
        self.context.set_value_from_gui_async(value, self.clock(), done)
    }
}

impl HistorySupported for ValueBinding {
    fn history(&self) -> Vec<Value> {
        self.context.history()
    }
}

impl StringConvertible for ValueBinding {
    fn to_text(&self) -> String {
        self.context.to_display_string(&self.value())
    }

    fn set_from_text(&self, text: &str, done: CommitCallback) -> Result<TaskTicket, ValueError> {
        let value = self.context.from_display_string(text)?;
        Ok(self.commit(value, done))
    }
}

impl std::fmt::Debug for ValueBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBinding")
            .field("context", &self.context.name())
            .field("clock", &self.clock())
            .field("attached", &self.is_attached())
            .finish()
    }
}
