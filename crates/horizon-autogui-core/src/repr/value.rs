//! Representations of scalar values.

use std::path::PathBuf;

use crate::context::MappingContext;
use crate::error::ValueError;
use crate::type_model::{ElementKind, TypeElement, TypeModel};
use crate::value::{EnumInfo, EnumValue, NumberKind, Value, ValueType};

use super::Representation;

fn is_scalar_member(element: &TypeElement) -> bool {
    matches!(element.kind, ElementKind::Property | ElementKind::Value)
}

/// Canonical text of a scalar value.
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::Path(p) => p.to_string_lossy().into_owned(),
        Value::Enum(e) => e.variant.clone(),
        Value::List(items) => {
            let parts: Vec<_> = items.iter().map(scalar_to_string).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(object) => crate::value::short_type_name(object.type_name()).to_string(),
    }
}

/// Parse scalar text according to the declared type.
pub(crate) fn scalar_from_string(text: &str, value_type: &ValueType) -> Result<Value, ValueError> {
    match value_type {
        ValueType::Bool => parse_bool(text),
        ValueType::Number(kind) => kind.coerce(Value::String(text.to_string())),
        ValueType::String => Ok(Value::String(text.to_string())),
        ValueType::Path => Ok(Value::Path(PathBuf::from(text))),
        ValueType::Enum(info) => parse_variant(text, info),
        ValueType::Object(_) => Err(ValueError::NotParsable("object")),
        ValueType::List(_) => Err(ValueError::NotParsable("list")),
        ValueType::Opaque(name) => Err(ValueError::NotParsable(name)),
    }
}

fn parse_bool(text: &str) -> Result<Value, ValueError> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(Value::Bool(true))
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(Value::Bool(false))
    } else {
        Err(ValueError::parse(text, "bool"))
    }
}

fn parse_variant(text: &str, info: &EnumInfo) -> Result<Value, ValueError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    info.variants
        .iter()
        .find(|v| **v == trimmed)
        .map(|v| {
            Value::Enum(EnumValue {
                type_name: info.type_name,
                variant: v.to_string(),
            })
        })
        .ok_or_else(|| ValueError::UnknownVariant {
            type_name: info.type_name,
            variant: trimmed.to_string(),
        })
}

/// Check boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolRepr;

impl Representation for BoolRepr {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        is_scalar_member(element) && element.value_type == ValueType::Bool
    }

    fn to_update_value(&self, _context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        match raw {
            Value::Null => Ok(Value::Bool(false)),
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::String(s) => parse_bool(&s),
            other => Err(ValueError::mismatch("bool", other.kind_name())),
        }
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, _context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        parse_bool(text)
    }

    fn is_history_supported(&self, _context: &MappingContext) -> bool {
        true
    }
}

/// Numeric spinners and text fields.
///
/// Edits are coerced into the member's numeric kind: integers are clamped
/// into range and floats truncated for integer members.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRepr;

impl NumberRepr {
    fn kind(context: &MappingContext) -> NumberKind {
        match context.element().value_type {
            ValueType::Number(kind) => kind,
            _ => NumberKind::F64,
        }
    }
}

impl Representation for NumberRepr {
    fn name(&self) -> &'static str {
        "number"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        is_scalar_member(element) && matches!(element.value_type, ValueType::Number(_))
    }

    fn to_update_value(&self, context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        Self::kind(context).coerce(raw)
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        Self::kind(context).coerce(Value::String(text.to_string()))
    }

    fn is_history_supported(&self, _context: &MappingContext) -> bool {
        true
    }
}

/// Text fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringRepr;

impl Representation for StringRepr {
    fn name(&self) -> &'static str {
        "string"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        is_scalar_member(element) && element.value_type == ValueType::String
    }

    fn to_update_value(&self, _context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        match raw {
            Value::String(s) => Ok(Value::String(s)),
            Value::Object(_) | Value::List(_) => Err(ValueError::mismatch("string", raw.kind_name())),
            other => Ok(Value::String(scalar_to_string(&other))),
        }
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, _context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        Ok(Value::String(text.to_string()))
    }

    fn is_history_supported(&self, _context: &MappingContext) -> bool {
        true
    }
}

/// File choosers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePathRepr;

impl Representation for FilePathRepr {
    fn name(&self) -> &'static str {
        "file-path"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        is_scalar_member(element) && element.value_type == ValueType::Path
    }

    fn to_update_value(&self, _context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        match raw {
            Value::Null => Ok(Value::Path(PathBuf::new())),
            Value::Path(p) => Ok(Value::Path(p)),
            Value::String(s) => Ok(Value::Path(PathBuf::from(s))),
            other => Err(ValueError::mismatch("path", other.kind_name())),
        }
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, _context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        Ok(Value::Path(PathBuf::from(text)))
    }

    fn is_history_supported(&self, _context: &MappingContext) -> bool {
        true
    }
}

/// Combo boxes over the variants of a [`Choice`](crate::value::Choice)
/// enum. Null means no selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumRepr;

impl EnumRepr {
    fn info(context: &MappingContext) -> Option<EnumInfo> {
        match context.element().value_type {
            ValueType::Enum(info) => Some(info),
            _ => None,
        }
    }
}

impl Representation for EnumRepr {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn matches(&self, _model: &TypeModel, element: &TypeElement) -> bool {
        is_scalar_member(element) && matches!(element.value_type, ValueType::Enum(_))
    }

    fn to_update_value(&self, context: &MappingContext, raw: Value) -> Result<Value, ValueError> {
        let Some(info) = Self::info(context) else {
            return Ok(raw);
        };
        match raw {
            Value::Null => Ok(Value::Null),
            Value::Enum(e) => parse_variant(&e.variant, &info),
            Value::String(s) => parse_variant(&s, &info),
            other => Err(ValueError::mismatch("enum", other.kind_name())),
        }
    }

    fn to_human_readable_string(&self, _context: &MappingContext, value: &Value) -> String {
        scalar_to_string(value)
    }

    fn from_human_readable_string(&self, context: &MappingContext, text: &str) -> Result<Value, ValueError> {
        match Self::info(context) {
            Some(info) => parse_variant(text, &info),
            None => Err(ValueError::NotParsable("enum")),
        }
    }

    fn is_history_supported(&self, _context: &MappingContext) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODE: EnumInfo = EnumInfo {
        type_name: "demo::Mode",
        variants: &["Fast", "Slow"],
    };

    #[test]
    fn test_scalar_round_trip() {
        let cases = [
            (ValueType::Bool, Value::Bool(true)),
            (ValueType::Number(NumberKind::I32), Value::Integer(-17)),
            (ValueType::Number(NumberKind::F64), Value::Float(0.1)),
            (ValueType::Number(NumberKind::F64), Value::Float(1e300)),
            (ValueType::Number(NumberKind::F32), Value::Float(0.1_f32 as f64)),
            (ValueType::String, Value::String("a, b\nc".into())),
            (ValueType::Path, Value::Path(PathBuf::from("/tmp/x y.txt"))),
            (
                ValueType::Enum(MODE),
                Value::Enum(EnumValue {
                    type_name: MODE.type_name,
                    variant: "Slow".into(),
                }),
            ),
        ];
        for (value_type, value) in cases {
            let text = scalar_to_string(&value);
            assert_eq!(scalar_from_string(&text, &value_type).unwrap(), value, "{text}");
        }
    }

    #[test]
    fn test_scalar_parse_failures() {
        assert!(scalar_from_string("maybe", &ValueType::Bool).is_err());
        assert!(scalar_from_string("x1", &ValueType::Number(NumberKind::U8)).is_err());
        assert!(matches!(
            scalar_from_string("Medium", &ValueType::Enum(MODE)),
            Err(ValueError::UnknownVariant { .. })
        ));
        assert_eq!(scalar_from_string("", &ValueType::Enum(MODE)).unwrap(), Value::Null);
        assert_eq!(
            scalar_from_string("999", &ValueType::Number(NumberKind::U8)).unwrap(),
            Value::Integer(255)
        );
    }

    #[test]
    fn test_float_text_of_integral_value() {
        let text = scalar_to_string(&Value::Float(2.0));
        assert_eq!(
            scalar_from_string(&text, &ValueType::Number(NumberKind::F64)).unwrap(),
            Value::Float(2.0)
        );
    }
}
