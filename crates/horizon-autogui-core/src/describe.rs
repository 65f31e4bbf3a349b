//! Member descriptions of host types.
//!
//! A host type exposes its shape by implementing [`Describe`], which returns
//! a [`TypeInfo`]: the ordered list of its members together with type-erased
//! accessors. The `#[derive(Describe)]` and `#[actions]` macros from
//! `horizon-autogui-macros` generate these implementations; the same
//! [`TypeInfoBuilder`] can be used directly to describe a type by hand.
//!
//! # Example
//!
//! ```
//! use horizon_autogui_core::describe::{Describe, MemberAttrs, TypeInfo, Visibility};
//!
//! struct Counter {
//!     count: i32,
//!     label: String,
//! }
//!
//! impl Describe for Counter {
//!     fn describe() -> TypeInfo {
//!         TypeInfo::builder::<Self>()
//!             .field::<i32>("count", |c| &c.count, |c| &mut c.count, MemberAttrs::new(), Visibility::Public)
//!             .field_read_only::<String>("label", |c| &c.label, MemberAttrs::new(), Visibility::Public)
//!             .action("reset", MemberAttrs::new(), Visibility::Public, |c| {
//!                 c.count = 0;
//!                 Ok(Default::default())
//!             })
//!             .build()
//!     }
//! }
//!
//! let info = Counter::describe();
//! assert_eq!(info.members().len(), 3);
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::AccessError;
use crate::value::{HostValue, ObjectType, Value, ValueType};

/// Type-erased member getter.
pub type Getter = Arc<dyn Fn(&dyn Any) -> Result<Value, AccessError> + Send + Sync>;

/// Type-erased member setter.
pub type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), AccessError> + Send + Sync>;

/// Type-erased action invoker. The argument carries the selection for
/// list actions and is `None` for plain actions.
pub type Invoker =
    Arc<dyn Fn(&mut dyn Any, Option<Value>) -> Result<Value, AccessError> + Send + Sync>;

/// A host type that can enumerate its members.
pub trait Describe: Any + Send + Sync {
    /// Describe the members of this type.
    fn describe() -> TypeInfo
    where
        Self: Sized;
}

/// Actions contributed by an `#[actions]` impl block.
///
/// `#[derive(Describe)]` appends these to the field members when the type
/// carries `#[autogui(actions)]`.
pub trait DescribeActions: Sized + Any + Send + Sync {
    /// Append the action members to `builder`.
    fn describe_actions(builder: TypeInfoBuilder<Self>) -> TypeInfoBuilder<Self>;
}

/// Source-level visibility of a member, used by relaxed inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// `pub`
    Public,
    /// `pub(crate)`, `pub(super)` or `pub(in path)`
    Crate,
    /// No visibility modifier.
    #[default]
    Private,
}

/// Annotation data attached to a member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberAttrs {
    /// The member carried an explicit inclusion annotation.
    pub annotated: bool,
    /// The member is explicitly excluded.
    pub excluded: bool,
    /// Explicit ordering index. Members without one keep declaration order
    /// after all indexed members.
    pub index: Option<i32>,
    /// Display name overriding the member name.
    pub display_name: Option<String>,
    /// Tooltip-style description.
    pub description: Option<String>,
    /// Accelerator key, e.g. `"ctrl R"`.
    pub accelerator: Option<String>,
    /// Forces the member to be read-only even when it has a setter.
    pub read_only: bool,
    /// The action's returned elements replace the selection of sibling
    /// collections.
    pub selection_updater: bool,
    /// Restricts selection updates and selection sources to the named
    /// sibling collection.
    pub selection_target: Option<String>,
}

impl MemberAttrs {
    /// Attributes for an unannotated member.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes for an annotated member.
    pub fn annotated() -> Self {
        Self {
            annotated: true,
            ..Self::default()
        }
    }

    /// Set the ordering index.
    pub fn index(mut self, index: i32) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the display name.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the accelerator key.
    pub fn accelerator(mut self, key: impl Into<String>) -> Self {
        self.accelerator = Some(key.into());
        self
    }

    /// Mark the member read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark the member excluded.
    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Mark the action as a selection updater.
    pub fn selection_updater(mut self) -> Self {
        self.selection_updater = true;
        self
    }

    /// Restrict the selection linkage to one sibling collection.
    pub fn selection_target(mut self, target: impl Into<String>) -> Self {
        self.selection_target = Some(target.into());
        self
    }
}

/// How a member is read, written, or invoked.
#[derive(Clone)]
pub enum MemberAccess {
    /// A readable (and possibly writable) value.
    Field { get: Getter, set: Option<Setter> },
    /// A zero-argument action.
    Action { invoke: Invoker },
    /// An action receiving the selected elements of a sibling collection.
    ActionList { param_type: ValueType, invoke: Invoker },
}

impl fmt::Debug for MemberAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { set, .. } => f
                .debug_struct("Field")
                .field("writable", &set.is_some())
                .finish(),
            Self::Action { .. } => f.write_str("Action"),
            Self::ActionList { param_type, .. } => f
                .debug_struct("ActionList")
                .field("param_type", param_type)
                .finish(),
        }
    }
}

/// The syntactic kind of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Action,
    ActionList,
}

/// One member of a described type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// The member name.
    pub name: String,
    /// Declared value type. Actions report their return type.
    pub value_type: ValueType,
    /// Annotation data.
    pub attrs: MemberAttrs,
    /// Source visibility.
    pub visibility: Visibility,
    /// Accessors.
    pub access: MemberAccess,
    /// Declaration position within the type.
    pub position: usize,
}

impl MemberDescriptor {
    /// The kind of this member.
    pub fn kind(&self) -> MemberKind {
        match self.access {
            MemberAccess::Field { .. } => MemberKind::Property,
            MemberAccess::Action { .. } => MemberKind::Action,
            MemberAccess::ActionList { .. } => MemberKind::ActionList,
        }
    }

    /// Returns true if the member name marks it as compiler- or
    /// macro-generated.
    pub fn is_synthetic(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// The member listing of a host type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// The host type.
    pub object_type: ObjectType,
    /// Display name overriding the type name.
    pub display_name: Option<String>,
    /// Type-level description.
    pub description: Option<String>,
    members: Vec<MemberDescriptor>,
}

impl TypeInfo {
    /// Start describing the type `T`.
    pub fn builder<T: Any + Send + Sync>() -> TypeInfoBuilder<T> {
        TypeInfoBuilder {
            info: TypeInfo {
                object_type: ObjectType {
                    type_id: TypeId::of::<T>(),
                    type_name: std::any::type_name::<T>(),
                    describe: None,
                },
                display_name: None,
                description: None,
                members: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Enumerate the members in declaration order.
    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Builder for [`TypeInfo`], typed on the described host type so accessors
/// can be written as ordinary closures.
pub struct TypeInfoBuilder<T> {
    info: TypeInfo,
    _marker: PhantomData<fn() -> T>,
}

fn downcast_owner<'a, T: Any>(obj: &'a dyn Any, member: &str) -> Result<&'a T, AccessError> {
    obj.downcast_ref::<T>()
        .ok_or_else(|| AccessError::OwnerTypeMismatch {
            member: member.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

fn downcast_owner_mut<'a, T: Any>(
    obj: &'a mut dyn Any,
    member: &str,
) -> Result<&'a mut T, AccessError> {
    obj.downcast_mut::<T>()
        .ok_or_else(|| AccessError::OwnerTypeMismatch {
            member: member.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

impl<T: Any + Send + Sync> TypeInfoBuilder<T> {
    /// Set the display name of the type.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.info.display_name = Some(name.into());
        self
    }

    /// Set the description of the type.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    /// Attach the lazy describe function so the type can be resolved from
    /// nested member types.
    pub fn describe_with(mut self, describe: fn() -> TypeInfo) -> Self {
        self.info.object_type.describe = Some(describe);
        self
    }

    /// Add a raw member descriptor.
    pub fn member(mut self, mut descriptor: MemberDescriptor) -> Self {
        descriptor.position = self.info.members.len();
        self.info.members.push(descriptor);
        self
    }

    /// Add a writable field.
    pub fn field<V: HostValue>(
        self,
        name: &str,
        get: fn(&T) -> &V,
        set: fn(&mut T) -> &mut V,
        attrs: MemberAttrs,
        visibility: Visibility,
    ) -> Self {
        self.property::<V>(
            name,
            move |t| get(t).to_value(),
            Some(move |t: &mut T, v: V| *set(t) = v),
            attrs,
            visibility,
        )
    }

    /// Add a field without a setter.
    pub fn field_read_only<V: HostValue>(
        self,
        name: &str,
        get: fn(&T) -> &V,
        attrs: MemberAttrs,
        visibility: Visibility,
    ) -> Self {
        self.property::<V>(
            name,
            move |t| get(t).to_value(),
            None::<fn(&mut T, V)>,
            attrs,
            visibility,
        )
    }

    /// Add a property backed by a getter and an optional setter.
    pub fn property<V: HostValue>(
        self,
        name: &str,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: Option<impl Fn(&mut T, V) + Send + Sync + 'static>,
        attrs: MemberAttrs,
        visibility: Visibility,
    ) -> Self {
        let member_name = name.to_string();
        let getter: Getter = Arc::new(move |obj| {
            let owner = downcast_owner::<T>(obj, &member_name)?;
            Ok(get(owner))
        });
        let setter: Option<Setter> = set.map(|set| {
            let member_name = name.to_string();
            Arc::new(move |obj: &mut dyn Any, value: Value| {
                let converted =
                    V::from_value(value).map_err(|e| AccessError::conversion(&member_name, e))?;
                let owner = downcast_owner_mut::<T>(obj, &member_name)?;
                set(owner, converted);
                Ok(())
            }) as Setter
        });
        self.member(MemberDescriptor {
            name: name.to_string(),
            value_type: V::value_type(),
            attrs,
            visibility,
            access: MemberAccess::Field {
                get: getter,
                set: setter,
            },
            position: 0,
        })
    }

    /// Add a member whose type cannot be mapped. The type model skips it.
    pub fn opaque(
        self,
        name: &str,
        type_name: &'static str,
        attrs: MemberAttrs,
        visibility: Visibility,
    ) -> Self {
        let member_name = name.to_string();
        self.member(MemberDescriptor {
            name: name.to_string(),
            value_type: ValueType::Opaque(type_name),
            attrs,
            visibility,
            access: MemberAccess::Field {
                get: Arc::new(move |_| Err(AccessError::Unsupported(member_name.clone()))),
                set: None,
            },
            position: 0,
        })
    }

    /// Add a zero-argument action.
    pub fn action(
        self,
        name: &str,
        attrs: MemberAttrs,
        visibility: Visibility,
        run: impl Fn(&mut T) -> Result<Value, AccessError> + Send + Sync + 'static,
    ) -> Self {
        let member_name = name.to_string();
        let invoke: Invoker = Arc::new(move |obj, _| {
            let owner = downcast_owner_mut::<T>(obj, &member_name)?;
            run(owner)
        });
        self.member(MemberDescriptor {
            name: name.to_string(),
            value_type: ValueType::Opaque("()"),
            attrs,
            visibility,
            access: MemberAccess::Action { invoke },
            position: 0,
        })
    }

    /// Add an action that receives selected collection elements as `P`.
    pub fn action_list<P: HostValue>(
        self,
        name: &str,
        attrs: MemberAttrs,
        visibility: Visibility,
        run: impl Fn(&mut T, P) -> Result<Value, AccessError> + Send + Sync + 'static,
    ) -> Self {
        let member_name = name.to_string();
        let invoke: Invoker = Arc::new(move |obj, argument| {
            let selection = P::from_value(argument.unwrap_or_default())
                .map_err(|e| AccessError::conversion(&member_name, e))?;
            let owner = downcast_owner_mut::<T>(obj, &member_name)?;
            run(owner, selection)
        });
        self.member(MemberDescriptor {
            name: name.to_string(),
            value_type: ValueType::Opaque("()"),
            attrs,
            visibility,
            access: MemberAccess::ActionList {
                param_type: P::value_type(),
                invoke,
            },
            position: 0,
        })
    }

    /// Finish the description.
    pub fn build(self) -> TypeInfo {
        self.info
    }
}
