//! Tables over collection members and their row templates.

use crate::context::MappingContext;
use crate::error::ValueError;
use crate::task_runner::TaskKind;
use crate::type_model::{ElementKind, TypeElement, TypeModel};
use crate::value::{Value, ValueType};

use super::{Representation, scalar_from_string, scalar_to_string};

fn is_scalar(value_type: &ValueType) -> bool {
    matches!(
        value_type,
        ValueType::Bool | ValueType::Number(_) | ValueType::String | ValueType::Path | ValueType::Enum(_)
    )
}

/// A table with one row per element.
///
/// Lists of scalars use JSON array text, so any list round-trips. Lists of
/// objects have no text form.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionTableRepr;

impl Representation for CollectionTableRepr {
    fn name(&self) -> &'static str {
        "collection-table"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        element.kind == ElementKind::Collection
    }

    fn to_update_value(&self, _context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        match raw {
            Value::Null => Ok(Value::List(Vec::new())),
            Value::List(items) => Ok(Value::List(items)),
            other => Err(ValueError::mismatch("list", other.kind_name())),
        }
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        match value.to_json() {
            Some(json) => json.to_string(),
            None => scalar_to_string(value),
        }
    }

    fn from_human_readable_string(&self, context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        let list_type = &context.element().value_type;
        if !list_type.element_type().is_some_and(is_scalar) {
            return Err(ValueError::NotParsable("collection"));
        }
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|_| ValueError::parse(text, "list"))?;
        Value::from_json(&json, list_type).ok_or_else(|| ValueError::parse(text, "list"))
    }

    fn is_task_runner_used_for(&self, kind: TaskKind) -> bool {
        // Reads come from the owning property's cached value
        kind != TaskKind::GetValue
    }
}

/// The row template of a collection. Reads with a row index return that
/// element; reads without one return null.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionElementRepr;

impl Representation for CollectionElementRepr {
    fn name(&self) -> &'static str {
        "collection-element"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        element.kind == ElementKind::Element
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        scalar_from_string(text, &context.element().value_type)
    }

    fn is_editable(&self, context: &MappingContext) -> bool {
        is_scalar(&context.element().value_type) && context.is_member_writable()
    }

    fn is_task_runner_used_for(&self, kind: TaskKind) -> bool {
        kind != TaskKind::GetValue
    }
}
