//! Panes for nested objects.

use crate::context::MappingContext;
use crate::error::ValueError;
use crate::task_runner::TaskKind;
use crate::type_model::{ElementKind, TypeElement, TypeModel};
use crate::value::{Value, ValueType, short_type_name};

use super::{Representation, scalar_to_string};

/// One-line summary of an object: `Type { member: text, .. }`.
///
/// Members are taken from the context's children using their cached
/// values; composite members and actions are left out.
fn object_summary(context: &MappingContext, value: &Value) -> String {
    let type_name = match value {
        Value::Object(object) => short_type_name(object.type_name()).to_string(),
        Value::Null => return String::new(),
        other => return scalar_to_string(other),
    };
    let members: Vec<String> = context
        .children()
        .iter()
        .filter(|child| child.kind() == ElementKind::Property && child.children().is_empty())
        .map(|child| {
            let text = child
                .representation()
                .to_human_readable_string(child, &child.source_value());
            format!("{}: {}", child.name(), text)
        })
        .collect();
    if members.is_empty() {
        type_name
    } else {
        format!("{} {{ {} }}", type_name, members.join(", "))
    }
}

fn is_composite(model: &TypeModel, element: &TypeElement) -> bool {
    element.kind == ElementKind::Property
        && element
            .children
            .first()
            .is_some_and(|child| matches!(model[*child].kind, ElementKind::Object | ElementKind::Collection))
}

/// A property holding a nested object or a collection. The pane hosts the
/// child's view; the property itself is not edited in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyPaneRepr;

impl Representation for PropertyPaneRepr {
    fn name(&self) -> &'static str {
        "property-pane"
    }

    fn matches(&self, model: &TypeModel, element: &TypeElement) -> bool {
        is_composite(model, element)
    }

    fn to_human_readable_string(&self, context: &MappingContext, value: &Value) -> String {
        match context.children().first() {
            Some(child) => child.representation().to_human_readable_string(child, value),
            None => scalar_to_string(value),
        }
    }

    fn from_human_readable_string(&self, _context: &MappingContext, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::NotParsable("property pane"))
    }

    fn is_editable(&self, _context: &MappingContext) -> bool {
        false
    }
}

/// An object whose composite members are shown as tabs.
#[derive(Debug, Clone, Copy)]
pub struct ObjectTabbedPaneRepr {
    /// Minimum number of composite members before tabs are used.
    pub min_tabs: usize,
}

impl Default for ObjectTabbedPaneRepr {
    fn default() -> Self {
        Self { min_tabs: 2 }
    }
}

impl Representation for ObjectTabbedPaneRepr {
    fn name(&self) -> &'static str {
        "object-tabbed-pane"
    }

    fn matches(&self, model: &TypeModel, element: &TypeElement) -> bool {
        element.kind == ElementKind::Object
            && element
                .children
                .iter()
                .filter(|child| is_composite(model, &model[**child]))
                .count()
                >= self.min_tabs
    }

    fn to_human_readable_string(&self, context: &MappingContext, value: &Value) -> String {
        object_summary(context, value)
    }

    fn from_human_readable_string(&self, _context: &MappingContext, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::NotParsable("object"))
    }

    fn is_editable(&self, _context: &MappingContext) -> bool {
        false
    }

    fn is_task_runner_used_for(&self, kind: TaskKind) -> bool {
        kind != TaskKind::GetValue
    }

    fn to_json(&self, _context: &MappingContext, _value: &Value) -> Option<serde_json::Value> {
        None
    }
}

/// An object whose members are laid out in one pane.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectPaneRepr;

impl Representation for ObjectPaneRepr {
    fn name(&self) -> &'static str {
        "object-pane"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        element.kind == ElementKind::Object && matches!(element.value_type, ValueType::Object(_))
    }

    fn to_human_readable_string(&self, context: &MappingContext, value: &Value) -> String {
        object_summary(context, value)
    }

    fn from_human_readable_string(&self, _context: &MappingContext, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::NotParsable("object"))
    }

    fn is_editable(&self, _context: &MappingContext) -> bool {
        false
    }

    fn is_task_runner_used_for(&self, kind: TaskKind) -> bool {
        kind != TaskKind::GetValue
    }

    fn to_json(&self, _context: &MappingContext, _value: &Value) -> Option<serde_json::Value> {
        None
    }
}
