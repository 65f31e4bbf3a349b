//! Representations: per-context read, write, and format strategies.
//!
//! Every [`MappingContext`] is assigned exactly one [`Representation`] when
//! it is first asked for one. The [`RepresentationSet`] is scanned in order
//! and the first representation whose [`matches`](Representation::matches)
//! accepts the context's element wins. The standard chain ends in
//! [`LabelRepr`], which matches everything and displays it read-only.
//!
//! Representations hold no per-context state. They are shared by `Arc`
//! across all contexts of the same kind; values, clocks, and selections live
//! in the context.
//!
//! Accessor errors are returned as they are. They are caught and logged at
//! the task runner boundary, never inside a representation.

mod action;
mod collection;
mod label;
mod object;
mod value;

use std::fmt;
use std::sync::Arc;

pub use action::{ActionListRepr, ActionRepr};
pub use collection::{CollectionElementRepr, CollectionTableRepr};
pub use label::LabelRepr;
pub use object::{ObjectPaneRepr, ObjectTabbedPaneRepr, PropertyPaneRepr};
pub use value::{BoolRepr, EnumRepr, FilePathRepr, NumberRepr, StringRepr};

pub(crate) use value::{scalar_from_string, scalar_to_string};

use crate::context::MappingContext;
use crate::error::{AccessError, ValueError};
use crate::logging::targets;
use crate::task_runner::TaskKind;
use crate::type_model::{TypeElement, TypeModel};
use crate::value::Value;

/// Strategy defining how a context's value is read, written, and shown.
pub trait Representation: Send + Sync + fmt::Debug {
    /// Short name used in logs, debug dumps, and view mappings.
    fn name(&self) -> &'static str;

    /// Check if this representation can handle `element`.
    fn matches(&self, model: &TypeModel, element: &TypeElement) -> bool;

    /// Read the context's value from the host object.
    ///
    /// `row` addresses one element of the nearest enclosing collection and
    /// is only meaningful below a collection element.
    fn get_value(&self, context: &MappingContext, row: Option<usize>) -> Result<Value, AccessError> {
        let raw = context.read_member(row)?;
        self.to_update_value(context, raw)
            .map_err(|e| AccessError::conversion(context.name(), e))
    }

    /// Write a value to the host object.
    fn set_value(
        &self,
        context: &MappingContext,
        row: Option<usize>,
        value: Value,
    ) -> Result<(), AccessError> {
        if !self.is_editable(context) {
            return Err(AccessError::ReadOnly(context.name().to_string()));
        }
        let value = self
            .to_update_value(context, value)
            .map_err(|e| AccessError::conversion(context.name(), e))?;
        context.write_member(row, value)
    }

    /// Normalize a raw value before it is shown or stored.
    fn to_update_value(&self, _context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        Ok(raw)
    }

    /// Canonical text of a value, used by clipboard and history menus.
    fn to_human_readable_string(&self, context: &MappingContext, value: &Value) -> String;

    /// Parse text produced by
    /// [`to_human_readable_string`](Self::to_human_readable_string).
    fn from_human_readable_string(&self, context: &MappingContext, text: &str) -> Result<Value, ValueError>;

    /// Whether the GUI may edit the value.
    fn is_editable(&self, context: &MappingContext) -> bool {
        context.is_member_writable()
    }

    /// Whether operations of `kind` must be routed through the task runner.
    fn is_task_runner_used_for(&self, _kind: TaskKind) -> bool {
        true
    }

    /// Whether committed values are recorded in the context history.
    fn is_history_supported(&self, _context: &MappingContext) -> bool {
        false
    }

    /// Convert a value for persistence.
    fn to_json(&self, _context: &MappingContext, value: &Value) -> Option<serde_json::Value> {
        value.to_json()
    }

    /// Read a persisted value back. `None` if it does not fit.
    fn from_json(&self, context: &MappingContext, json: &serde_json::Value) -> Option<Value> {
        Value::from_json(json, &context.element().value_type)
    }

    /// Invoke the context's action.
    fn invoke(&self, context: &MappingContext) -> Result<Value, AccessError> {
        Err(AccessError::Unsupported(context.name().to_string()))
    }
}

/// An ordered chain of representations.
#[derive(Clone)]
pub struct RepresentationSet {
    entries: Vec<Arc<dyn Representation>>,
    fallback: Arc<dyn Representation>,
}

impl RepresentationSet {
    /// An empty chain. Everything resolves to the label fallback.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            fallback: Arc::new(LabelRepr),
        }
    }

    /// The standard chain.
    ///
    /// Collection table and element representations come before the object
    /// panes so list members are never rendered as expandable objects.
    pub fn standard() -> Self {
        Self::with_min_tabs(ObjectTabbedPaneRepr::default().min_tabs)
    }

    /// The standard chain with a custom tab threshold for object panes.
    pub fn with_min_tabs(min_tabs: usize) -> Self {
        let mut set = Self::empty();
        set.push(CollectionTableRepr);
        set.push(CollectionElementRepr);
        set.push(ActionRepr);
        set.push(ActionListRepr);
        set.push(BoolRepr);
        set.push(NumberRepr);
        set.push(StringRepr);
        set.push(FilePathRepr);
        set.push(EnumRepr);
        set.push(PropertyPaneRepr);
        set.push(ObjectTabbedPaneRepr { min_tabs });
        set.push(ObjectPaneRepr);
        set.push(LabelRepr);
        set
    }

    /// Append a representation to the end of the chain.
    pub fn push(&mut self, representation: impl Representation + 'static) {
        self.entries.push(Arc::new(representation));
    }

    /// Insert a representation at `index`, ahead of later entries.
    pub fn insert(&mut self, index: usize, representation: impl Representation + 'static) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, Arc::new(representation));
    }

    /// Number of entries, not counting the fallback.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the chain in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Representation>> {
        self.entries.iter()
    }

    /// Resolve the representation of `element`: first match wins.
    pub fn resolve(&self, model: &TypeModel, element: &TypeElement) -> Arc<dyn Representation> {
        match self.entries.iter().find(|r| r.matches(model, element)) {
            Some(representation) => representation.clone(),
            None => {
                tracing::debug!(
                    target: targets::REPR,
                    element = %element.name,
                    "no representation matched; using label"
                );
                self.fallback.clone()
            }
        }
    }
}

impl Default for RepresentationSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for RepresentationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|r| r.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::{Describe, MemberAttrs, TypeInfo, Visibility};
    use crate::type_model::{ElementId, InclusionPolicy};
    use crate::value::Shared;

    struct Leaf {
        on: bool,
    }

    impl Describe for Leaf {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .describe_with(Self::describe)
                .field::<bool>("on", |l| &l.on, |l| &mut l.on, MemberAttrs::new(), Visibility::Public)
                .build()
        }
    }

    struct Root {
        leaf: Shared<Leaf>,
        leaves: Vec<Shared<Leaf>>,
        title: String,
    }

    impl Describe for Root {
        fn describe() -> TypeInfo {
            TypeInfo::builder::<Self>()
                .field::<Shared<Leaf>>("leaf", |r| &r.leaf, |r| &mut r.leaf, MemberAttrs::new(), Visibility::Public)
                .field::<Vec<Shared<Leaf>>>("leaves", |r| &r.leaves, |r| &mut r.leaves, MemberAttrs::new(), Visibility::Public)
                .field::<String>("title", |r| &r.title, |r| &mut r.title, MemberAttrs::new(), Visibility::Public)
                .action("reset", MemberAttrs::new(), Visibility::Public, |_| Ok(Value::Null))
                .build()
        }
    }

    fn resolved_names(model: &TypeModel, set: &RepresentationSet, ids: &[ElementId]) -> Vec<&'static str> {
        ids.iter().map(|id| set.resolve(model, &model[*id]).name()).collect()
    }

    #[test]
    fn test_standard_chain_resolution() {
        let mut model = TypeModel::new(InclusionPolicy::default());
        let root = model.describe::<Root>();
        let set = RepresentationSet::standard();

        assert_eq!(set.resolve(&model, &model[root]).name(), "object-tabbed-pane");
        assert_eq!(
            resolved_names(&model, &set, model.children(root)),
            vec!["property-pane", "property-pane", "string", "action"]
        );

        let leaves = model.children(root)[1];
        let collection = model.children(leaves)[0];
        let element = model.children(collection)[0];
        let leaf_object = model.children(element)[0];
        assert_eq!(set.resolve(&model, &model[collection]).name(), "collection-table");
        assert_eq!(set.resolve(&model, &model[element]).name(), "collection-element");
        assert_eq!(set.resolve(&model, &model[leaf_object]).name(), "object-pane");
    }

    #[test]
    fn test_empty_chain_falls_back_to_label() {
        let mut model = TypeModel::new(InclusionPolicy::default());
        let root = model.describe::<Root>();
        let set = RepresentationSet::empty();
        assert_eq!(set.resolve(&model, &model[root]).name(), "label");
    }

    #[test]
    fn test_insert_takes_precedence() {
        let mut model = TypeModel::new(InclusionPolicy::default());
        let root = model.describe::<Root>();
        let mut set = RepresentationSet::standard();
        set.insert(0, LabelRepr);
        assert_eq!(set.len(), 14);
        let title = model.children(root)[2];
        assert_eq!(set.resolve(&model, &model[title]).name(), "label");
    }
}
