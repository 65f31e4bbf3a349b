//! Buttons for actions and list actions.

use crate::context::MappingContext;
use crate::error::{AccessError, ValueError};
use crate::task_runner::TaskKind;
use crate::type_model::{ElementKind, TypeElement, TypeModel};
use crate::value::Value;

use super::Representation;

/// A zero-argument action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionRepr;

impl Representation for ActionRepr {
    fn name(&self) -> &'static str {
        "action"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        element.kind == ElementKind::Action
    }

    fn get_value(&self, _context: &MappingContext, _row: Option<usize>) -> Result<Value, AccessError> {
        Ok(Value::Null)
    }

    fn to_human_readable_string(&self, context: &MappingContext, _value: &Value) -> String {
        context.element().display_name.clone()
    }

    fn from_human_readable_string(&self, _context: &MappingContext, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::NotParsable("action"))
    }

    fn is_editable(&self, _context: &MappingContext) -> bool {
        false
    }

    fn is_task_runner_used_for(&self, kind: TaskKind) -> bool {
        kind != TaskKind::GetValue
    }

    fn invoke(&self, context: &MappingContext) -> Result<Value, AccessError> {
        context.invoke_member(None)
    }
}

/// An action applied to the selected rows of a sibling collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionListRepr;

impl Representation for ActionListRepr {
    fn name(&self) -> &'static str {
        "action-list"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        element.kind == ElementKind::ActionList
    }

    fn get_value(&self, _context: &MappingContext, _row: Option<usize>) -> Result<Value, AccessError> {
        Ok(Value::Null)
    }

    fn to_human_readable_string(&self, context: &MappingContext, _value: &Value) -> String {
        context.element().display_name.clone()
    }

    fn from_human_readable_string(&self, _context: &MappingContext, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::NotParsable("action"))
    }

    fn is_editable(&self, _context: &MappingContext) -> bool {
        false
    }

    fn is_task_runner_used_for(&self, kind: TaskKind) -> bool {
        kind != TaskKind::GetValue
    }

    fn invoke(&self, context: &MappingContext) -> Result<Value, AccessError> {
        let selection = context.selected_elements()?;
        context.invoke_member(Some(selection))
    }
}
