//! Dynamic values carried through the context tree.
//!
//! Host objects keep their state in ordinary Rust fields. The engine reads
//! and writes those fields through [`HostValue`] conversions, which map each
//! field type to a [`Value`] and report its declared [`ValueType`].
//!
//! Nested objects are shared through [`Shared<T>`] handles so that a child
//! context can mutate the same instance its parent holds.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::value::{HostValue, Value, ValueType, NumberKind};
//!
//! assert_eq!(i32::value_type(), ValueType::Number(NumberKind::I32));
//! assert_eq!(42_i32.to_value(), Value::Integer(42));
//! assert_eq!(i32::from_value(Value::Integer(7)).unwrap(), 7);
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::describe::{Describe, TypeInfo};
use crate::error::ValueError;

/// A shared, lockable host object.
///
/// Nested object members are declared with this type so that the object
/// graph can be walked and edited in place.
pub type Shared<T> = Arc<RwLock<T>>;

/// Wrap a value into a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

/// Numeric member types, used to coerce edits back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumberKind {
    /// Returns true for floating point kinds.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// The Rust name of the kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Inclusive integer bounds of the kind. Floats report the i64 range.
    pub fn integer_bounds(self) -> (i128, i128) {
        match self {
            Self::I8 => (i8::MIN.into(), i8::MAX.into()),
            Self::I16 => (i16::MIN.into(), i16::MAX.into()),
            Self::I32 => (i32::MIN.into(), i32::MAX.into()),
            Self::U8 => (0, u8::MAX.into()),
            Self::U16 => (0, u16::MAX.into()),
            Self::U32 => (0, u32::MAX.into()),
            Self::U64 => (0, u64::MAX.into()),
            Self::I64 | Self::F32 | Self::F64 => (i64::MIN.into(), i64::MAX.into()),
        }
    }

    /// The value used when a numeric member has no value yet.
    pub fn zero(self) -> Value {
        if self.is_float() {
            Value::Float(0.0)
        } else {
            Value::Integer(0)
        }
    }

    /// Coerce a raw value into this kind, clamping integers into range.
    ///
    /// Null becomes zero; strings are parsed; floats are truncated for
    /// integer kinds.
    pub fn coerce(self, raw: Value) -> Result<Value, ValueError> {
        let (min, max) = self.integer_bounds();
        match raw {
            Value::Null => Ok(self.zero()),
            Value::Integer(i) if self.is_float() => Ok(Value::Float(i as f64)),
            Value::Integer(i) => Ok(Value::Integer(i.clamp(min, max))),
            Value::Float(f) if self.is_float() => {
                if self == Self::F32 {
                    Ok(Value::Float(f as f32 as f64))
                } else {
                    Ok(Value::Float(f))
                }
            }
            Value::Float(f) if f.is_finite() => {
                Ok(Value::Integer((f.trunc() as i128).clamp(min, max)))
            }
            Value::Float(f) => Err(ValueError::OutOfRange {
                value: f.to_string(),
                target: self.name(),
            }),
            Value::Bool(b) => self.coerce(Value::Integer(b.into())),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i128>() {
                    self.coerce(Value::Integer(i))
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    self.coerce(Value::Float(f))
                } else {
                    Err(ValueError::parse(s, self.name()))
                }
            }
            other => Err(ValueError::mismatch(self.name(), other.kind_name())),
        }
    }
}

/// Variant metadata of a unit-only enum exposed as a choice.
#[derive(Debug, Clone, Copy)]
pub struct EnumInfo {
    /// The enum type name.
    pub type_name: &'static str,
    /// Variant names in declaration order.
    pub variants: &'static [&'static str],
}

impl PartialEq for EnumInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.variants == other.variants
    }
}

/// Reference to a describable object type, resolved lazily to avoid
/// infinite recursion on self-referential types.
#[derive(Clone, Copy)]
pub struct ObjectType {
    /// The type id of the host type.
    pub type_id: TypeId,
    /// The host type name.
    pub type_name: &'static str,
    /// Produces the member listing of the type. `None` for programmatic
    /// descriptions that must be registered with the type model up front.
    pub describe: Option<fn() -> TypeInfo>,
}

impl ObjectType {
    /// Reference the type `T`.
    pub fn of<T: Describe>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            describe: Some(T::describe as fn() -> TypeInfo),
        }
    }
}

impl PartialEq for ObjectType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectType").field(&self.type_name).finish()
    }
}

/// The declared type of a member.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    Number(NumberKind),
    String,
    Path,
    Enum(EnumInfo),
    Object(ObjectType),
    List(Box<ValueType>),
    /// A type the engine cannot map. Members of this type are skipped.
    Opaque(&'static str),
}

impl ValueType {
    /// Element type of a list type.
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            Self::List(element) => Some(element),
            _ => None,
        }
    }

    /// Short name used in logs and debug output.
    pub fn name(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Number(kind) => kind.name().to_string(),
            Self::String => "String".to_string(),
            Self::Path => "PathBuf".to_string(),
            Self::Enum(info) => short_type_name(info.type_name).to_string(),
            Self::Object(object) => short_type_name(object.type_name).to_string(),
            Self::List(element) => format!("Vec<{}>", element.name()),
            Self::Opaque(name) => short_type_name(name).to_string(),
        }
    }
}

/// Strip the module path from a type name.
pub(crate) fn short_type_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    let offset = base.rfind("::").map(|i| i + 2).unwrap_or(0);
    &name[offset..]
}

/// A selected enum variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// The enum type name.
    pub type_name: &'static str,
    /// The variant name.
    pub variant: String,
}

/// A dynamically typed value flowing between host objects and views.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    /// Any host integer; wide enough for the full `u64` and `i64` ranges.
    Integer(i128),
    Float(f64),
    String(String),
    Path(PathBuf),
    Enum(EnumValue),
    List(Vec<Value>),
    Object(ObjectRef),
}

impl Value {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Path(_) => "path",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Returns this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as a float, converting integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns this value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the object handle, if this value is an object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to a JSON value for persistence. Objects are not persisted.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;
        Some(match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => match (i64::try_from(*i), u64::try_from(*i)) {
                (Ok(i), _) => Json::from(i),
                (_, Ok(u)) => Json::from(u),
                _ => return None,
            },
            Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number)?,
            Value::String(s) => Json::String(s.clone()),
            Value::Path(p) => Json::String(p.to_string_lossy().into_owned()),
            Value::Enum(e) => Json::String(e.variant.clone()),
            Value::List(items) => {
                Json::Array(items.iter().map(|v| v.to_json()).collect::<Option<_>>()?)
            }
            Value::Object(_) => return None,
        })
    }

    /// Read a persisted JSON value back according to the declared type.
    ///
    /// Returns `None` when the JSON does not fit the type.
    pub fn from_json(json: &serde_json::Value, value_type: &ValueType) -> Option<Value> {
        use serde_json::Value as Json;
        match (value_type, json) {
            (_, Json::Null) => Some(Value::Null),
            (ValueType::Bool, Json::Bool(b)) => Some(Value::Bool(*b)),
            (ValueType::Number(kind), Json::Number(n)) => {
                let raw = match (n.as_i64(), n.as_u64()) {
                    (Some(i), _) => Value::Integer(i.into()),
                    (_, Some(u)) => Value::Integer(u.into()),
                    _ => Value::Float(n.as_f64()?),
                };
                kind.coerce(raw).ok()
            }
            (ValueType::String, Json::String(s)) => Some(Value::String(s.clone())),
            (ValueType::Path, Json::String(s)) => Some(Value::Path(PathBuf::from(s))),
            (ValueType::Enum(info), Json::String(s)) => info
                .variants
                .contains(&s.as_str())
                .then(|| Value::Enum(EnumValue {
                    type_name: info.type_name,
                    variant: s.clone(),
                })),
            (ValueType::List(element), Json::Array(items)) => items
                .iter()
                .map(|item| Value::from_json(item, element))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Integer(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Type-erased access to a [`Shared`] cell.
trait ObjectCell: Send + Sync {
    fn read_any(&self) -> MappedRwLockReadGuard<'_, dyn Any + Send + Sync>;
    fn write_any(&self) -> MappedRwLockWriteGuard<'_, dyn Any + Send + Sync>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> ObjectCell for RwLock<T> {
    fn read_any(&self) -> MappedRwLockReadGuard<'_, dyn Any + Send + Sync> {
        RwLockReadGuard::map(self.read(), |value| value as &(dyn Any + Send + Sync))
    }

    fn write_any(&self) -> MappedRwLockWriteGuard<'_, dyn Any + Send + Sync> {
        RwLockWriteGuard::map(self.write(), |value| value as &mut (dyn Any + Send + Sync))
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A type-erased handle to a shared host object.
///
/// Equality is identity: two handles are equal when they point at the
/// same allocation.
#[derive(Clone)]
pub struct ObjectRef {
    cell: Arc<dyn ObjectCell>,
}

impl ObjectRef {
    /// Create a handle from a shared object.
    pub fn new<T: Any + Send + Sync>(object: Shared<T>) -> Self {
        Self { cell: object }
    }

    /// Lock the object for reading.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, dyn Any + Send + Sync> {
        self.cell.read_any()
    }

    /// Lock the object for writing.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, dyn Any + Send + Sync> {
        self.cell.write_any()
    }

    /// Recover the typed handle.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Shared<T>> {
        self.cell.clone().into_any().downcast::<RwLock<T>>().ok()
    }

    /// The concrete type name of the referenced object.
    pub fn type_name(&self) -> &'static str {
        self.cell.type_name()
    }

    /// Returns true if both handles reference the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.cell), Arc::as_ptr(&other.cell))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ObjectRef({} @ {:p})",
            short_type_name(self.type_name()),
            Arc::as_ptr(&self.cell)
        )
    }
}

/// Conversion between a host field type and [`Value`].
pub trait HostValue: Sized + Send + Sync + 'static {
    /// The declared type of fields of this type.
    fn value_type() -> ValueType;

    /// Read the field into a value.
    fn to_value(&self) -> Value;

    /// Convert a value back into the field type.
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

/// Unit-only enums exposed as a fixed set of choices.
///
/// Implemented by `#[derive(Choice)]`.
pub trait Choice: Sized + Copy + Send + Sync + 'static {
    /// Variant metadata.
    const INFO: EnumInfo;

    /// The name of the selected variant.
    fn variant_name(&self) -> &'static str;

    /// Look up a variant by name.
    fn from_variant_name(name: &str) -> Option<Self>;

    /// Convert into an enum value.
    fn to_enum_value(&self) -> Value {
        Value::Enum(EnumValue {
            type_name: Self::INFO.type_name,
            variant: self.variant_name().to_string(),
        })
    }

    /// Convert an enum (or variant name string) value back.
    fn from_enum_value(value: Value) -> Result<Self, ValueError> {
        let name = match value {
            Value::Enum(e) => e.variant,
            Value::String(s) => s,
            other => return Err(ValueError::mismatch("enum", other.kind_name())),
        };
        Self::from_variant_name(&name).ok_or(ValueError::UnknownVariant {
            type_name: Self::INFO.type_name,
            variant: name,
        })
    }
}

impl HostValue for () {
    fn value_type() -> ValueType {
        ValueType::Opaque("()")
    }

    fn to_value(&self) -> Value {
        Value::Null
    }

    fn from_value(_value: Value) -> Result<Self, ValueError> {
        Ok(())
    }
}

impl HostValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(ValueError::mismatch("bool", other.kind_name())),
        }
    }
}

macro_rules! impl_host_integer {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl HostValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::Number(NumberKind::$kind)
                }

                fn to_value(&self) -> Value {
                    Value::Integer(*self as i128)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match NumberKind::$kind.coerce(value)? {
                        Value::Integer(i) => <$ty>::try_from(i).map_err(|_| ValueError::OutOfRange {
                            value: i.to_string(),
                            target: stringify!($ty),
                        }),
                        other => Err(ValueError::mismatch(stringify!($ty), other.kind_name())),
                    }
                }
            }
        )*
    };
}

impl_host_integer!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => U64,
    isize => I64,
);

impl HostValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Number(NumberKind::F64)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match NumberKind::F64.coerce(value)? {
            Value::Float(f) => Ok(f),
            other => Err(ValueError::mismatch("f64", other.kind_name())),
        }
    }
}

impl HostValue for f32 {
    fn value_type() -> ValueType {
        ValueType::Number(NumberKind::F32)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match NumberKind::F32.coerce(value)? {
            Value::Float(f) => Ok(f as f32),
            other => Err(ValueError::mismatch("f32", other.kind_name())),
        }
    }
}

impl HostValue for String {
    fn value_type() -> ValueType {
        ValueType::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            Value::Path(p) => Ok(p.to_string_lossy().into_owned()),
            other => Err(ValueError::mismatch("String", other.kind_name())),
        }
    }
}

impl HostValue for PathBuf {
    fn value_type() -> ValueType {
        ValueType::Path
    }

    fn to_value(&self) -> Value {
        Value::Path(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Path(p) => Ok(p),
            Value::String(s) => Ok(PathBuf::from(s)),
            Value::Null => Ok(PathBuf::new()),
            other => Err(ValueError::mismatch("PathBuf", other.kind_name())),
        }
    }
}

impl<T: HostValue> HostValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: HostValue> HostValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(HostValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(ValueError::mismatch("list", other.kind_name())),
        }
    }
}

impl<T: Describe> HostValue for Shared<T> {
    fn value_type() -> ValueType {
        ValueType::Object(ObjectType::of::<T>())
    }

    fn to_value(&self) -> Value {
        Value::Object(ObjectRef::new(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Object(object) => object
                .downcast::<T>()
                .ok_or_else(|| ValueError::mismatch(std::any::type_name::<T>(), "object")),
            other => Err(ValueError::mismatch("object", other.kind_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_coercion_clamps() {
        assert_eq!(NumberKind::U8.coerce(Value::Integer(300)).unwrap(), Value::Integer(255));
        assert_eq!(NumberKind::I8.coerce(Value::Integer(-300)).unwrap(), Value::Integer(-128));
        assert_eq!(NumberKind::I32.coerce(Value::Float(3.9)).unwrap(), Value::Integer(3));
        assert_eq!(NumberKind::I32.coerce(Value::Null).unwrap(), Value::Integer(0));
        assert_eq!(NumberKind::F64.coerce(Value::Integer(2)).unwrap(), Value::Float(2.0));
        assert!(NumberKind::I32.coerce(Value::String("abc".into())).is_err());
    }

    #[test]
    fn test_host_value_conversions() {
        assert_eq!(u16::from_value(Value::Integer(70000)).unwrap(), u16::MAX);
        assert_eq!(String::from_value(Value::Null).unwrap(), "");
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Vec::<bool>::from_value(Value::List(vec![Value::Bool(true)])).unwrap(),
            vec![true]
        );
        assert!(bool::from_value(Value::Integer(1)).is_err());
    }

    #[test]
    fn test_u64_extremes_are_lossless() {
        for n in [u64::MAX, i64::MAX as u64 + 1, 0] {
            let value = n.to_value();
            assert_eq!(u64::from_value(value.clone()).unwrap(), n);
            let json = value.to_json().unwrap();
            let ty = u64::value_type();
            assert_eq!(Value::from_json(&json, &ty), Some(value));
        }
        assert_eq!(i64::from_value(i64::MIN.to_value()).unwrap(), i64::MIN);
        assert_eq!(
            NumberKind::U64.coerce(Value::from("18446744073709551615")).unwrap(),
            Value::from(u64::MAX)
        );
        assert_eq!(NumberKind::U64.coerce(Value::Integer(-5)).unwrap(), Value::Integer(0));
        assert_eq!(NumberKind::I64.coerce(Value::from(u64::MAX)).unwrap(), Value::from(i64::MAX));
    }

    #[test]
    fn test_object_ref_identity_and_downcast() {
        let a = shared(5_i32);
        let r1 = ObjectRef::new(a.clone());
        let r2 = ObjectRef::new(a.clone());
        let other = ObjectRef::new(shared(5_i32));

        assert!(r1.ptr_eq(&r2));
        assert_eq!(Value::Object(r1.clone()), Value::Object(r2));
        assert_ne!(Value::Object(r1.clone()), Value::Object(other));

        let back = r1.downcast::<i32>().unwrap();
        *back.write() = 9;
        assert_eq!(*a.read(), 9);
        assert!(r1.downcast::<u8>().is_none());
        assert_eq!(r1.read().downcast_ref::<i32>(), Some(&9));
    }

    #[test]
    fn test_json_conversion() {
        let ty = ValueType::List(Box::new(ValueType::Number(NumberKind::I32)));
        let value = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        let json = value.to_json().unwrap();
        assert_eq!(json, serde_json::json!([1, 2]));
        assert_eq!(Value::from_json(&json, &ty), Some(value));
        assert_eq!(Value::from_json(&serde_json::json!("x"), &ty), None);
        assert!(Value::Object(ObjectRef::new(shared(1_u8))).to_json().is_none());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Thing"), "Thing");
        assert_eq!(short_type_name("Thing"), "Thing");
        assert_eq!(short_type_name("a::Wrap<b::Inner>"), "Wrap<b::Inner>");
    }
}
