use crate::context::MappingContext;
use crate::error::ValueError;
use crate::type_model::{TypeElement, TypeModel};
use crate::value::Value;

use super::{Representation, scalar_to_string};

/// Read-only text. Matches every element and terminates the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelRepr;

impl Representation for LabelRepr {
    fn name(&self) -> &'static str {
        "label"
    }

    fn matches(&self, _model: &TypeModel, _element: &TypeElement) -> bool {
        true
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, _context: &MappingContext, _text: &str) -> Result<Value, ValueError> {
        Err(ValueError::NotParsable("label"))
    }

    fn is_editable(&self, _context: &MappingContext) -> bool {
        false
    }
}
