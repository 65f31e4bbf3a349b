//! The type model: host types as trees of typed elements.
//!
//! [`TypeModel`] turns [`TypeInfo`] member listings into an arena of
//! [`TypeElement`]s. The shapes it produces are:
//!
//! ```text
//! Object
//! ├── Property (scalar)
//! ├── Property ── Object                      (nested object, shared per type)
//! ├── Property ── Collection ── Element ── Object | Value
//! ├── Action
//! └── ActionList
//! ```
//!
//! Object elements are cached per [`TypeId`] and inserted into the cache
//! before their members are built, so self-referential types terminate.
//! Members that cannot be mapped are skipped with a debug log.
//!
//! The model is built once and then frozen in an `Arc` before contexts are
//! created; it never changes afterwards.

use std::any::TypeId;
use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::describe::{Describe, MemberAccess, MemberAttrs, MemberDescriptor, TypeInfo, Visibility};
use crate::logging::targets;
use crate::value::{ObjectType, ValueType, short_type_name};

new_key_type! {
    /// Identifies an element in a [`TypeModel`].
    pub struct ElementId;
}

/// The syntactic kind of a type element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A scalar value inside a collection element.
    Value,
    /// A readable (and maybe writable) member.
    Property,
    /// A zero-argument action.
    Action,
    /// An action applied to the selected elements of a sibling collection.
    ActionList,
    /// The list held by a collection-typed property.
    Collection,
    /// The row template of a collection.
    Element,
    /// A described host type.
    Object,
}

/// Which members of a type are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InclusionPolicy {
    /// Only annotated members.
    Strict,
    /// Every public member that is not synthetic, and optionally
    /// crate-visible ones. Annotated members are always included.
    Relaxed { include_crate_visible: bool },
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self::Relaxed {
            include_crate_visible: false,
        }
    }
}

impl InclusionPolicy {
    /// Check if a member passes the policy.
    pub fn includes(&self, member: &MemberDescriptor) -> bool {
        if member.attrs.excluded {
            return false;
        }
        if member.attrs.annotated {
            return true;
        }
        match self {
            Self::Strict => false,
            Self::Relaxed {
                include_crate_visible,
            } => {
                !member.is_synthetic()
                    && match member.visibility {
                        Visibility::Public => true,
                        Visibility::Crate => *include_crate_visible,
                        Visibility::Private => false,
                    }
            }
        }
    }

    /// The included members of `info`, ordered by index then declaration.
    pub fn ordered_members<'a>(&self, info: &'a TypeInfo) -> Vec<&'a MemberDescriptor> {
        let mut members: Vec<_> = info.members().iter().filter(|m| self.includes(m)).collect();
        members.sort_by_key(|m| (m.attrs.index.unwrap_or(i32::MAX), m.position));
        members
    }
}

/// One node of the type model.
#[derive(Debug, Clone)]
pub struct TypeElement {
    /// Syntactic kind.
    pub kind: ElementKind,
    /// Member or type name.
    pub name: String,
    /// Name shown to the user.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional accelerator key.
    pub accelerator: Option<String>,
    /// Declared value type.
    pub value_type: ValueType,
    /// The enclosing element. `None` for object elements, which are shared.
    pub owner: Option<ElementId>,
    /// Child elements in display order.
    pub children: Vec<ElementId>,
    /// Accessors of members. `None` for structural elements.
    pub access: Option<MemberAccess>,
    /// Annotation data of members.
    pub attrs: MemberAttrs,
}

impl TypeElement {
    fn structural(kind: ElementKind, name: String, value_type: ValueType, owner: Option<ElementId>) -> Self {
        Self {
            kind,
            display_name: display_name_for(&name),
            name,
            description: None,
            accelerator: None,
            value_type,
            owner,
            children: Vec::new(),
            access: None,
            attrs: MemberAttrs::default(),
        }
    }

    /// Returns true if the member has a setter and is not marked read-only.
    pub fn is_writable(&self) -> bool {
        !self.attrs.read_only && matches!(self.access, Some(MemberAccess::Field { set: Some(_), .. }))
    }

    /// The element type of a collection-typed element.
    pub fn element_type(&self) -> Option<&ValueType> {
        self.value_type.element_type()
    }
}

/// Turn `file_name` into `File Name`.
pub fn display_name_for(name: &str) -> String {
    name.trim_matches('_')
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// An arena of type elements.
#[derive(Debug, Default)]
pub struct TypeModel {
    elements: SlotMap<ElementId, TypeElement>,
    objects: HashMap<TypeId, ElementId>,
    registered: HashMap<TypeId, TypeInfo>,
    policy: InclusionPolicy,
}

impl TypeModel {
    /// Create an empty model.
    pub fn new(policy: InclusionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// The inclusion policy.
    pub fn policy(&self) -> InclusionPolicy {
        self.policy
    }

    /// Describe `T` and return its object element.
    pub fn describe<T: Describe>(&mut self) -> ElementId {
        self.object_element_from_info(T::describe())
    }

    /// Register a programmatic description and return its object element.
    ///
    /// Registered types are also resolved when they appear as nested member
    /// types of other types.
    pub fn register_type_info(&mut self, info: TypeInfo) -> ElementId {
        let type_id = info.object_type.type_id;
        self.registered.insert(type_id, info.clone());
        self.object_element_from_info(info)
    }

    /// The object element of `object_type`, building it on first use.
    ///
    /// Returns `None` for a type without a describe function that was not
    /// registered.
    pub fn object_element(&mut self, object_type: &ObjectType) -> Option<ElementId> {
        if let Some(id) = self.objects.get(&object_type.type_id) {
            return Some(*id);
        }
        let info = match (self.registered.get(&object_type.type_id), object_type.describe) {
            (Some(info), _) => info.clone(),
            (None, Some(describe)) => describe(),
            (None, None) => return None,
        };
        Some(self.object_element_from_info(info))
    }

    /// Look up an element.
    pub fn get(&self, id: ElementId) -> Option<&TypeElement> {
        self.elements.get(id)
    }

    /// The children of an element, empty for unknown ids.
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.elements.get(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Number of elements in the arena.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The cached object element for a type id.
    pub fn object_for_type(&self, type_id: TypeId) -> Option<ElementId> {
        self.objects.get(&type_id).copied()
    }

    fn object_element_from_info(&mut self, info: TypeInfo) -> ElementId {
        let type_id = info.object_type.type_id;
        if let Some(id) = self.objects.get(&type_id) {
            return *id;
        }

        let mut object = TypeElement::structural(
            ElementKind::Object,
            short_type_name(info.object_type.type_name).to_string(),
            ValueType::Object(info.object_type),
            None,
        );
        if let Some(name) = &info.display_name {
            object.display_name = name.clone();
        }
        object.description = info.description.clone();
        let object_id = self.elements.insert(object);
        // Cached before recursing so self-referential types terminate
        self.objects.insert(type_id, object_id);

        let members = self.policy.ordered_members(&info);
        let mut children = Vec::with_capacity(members.len());
        for member in &members {
            if let Some(child) = self.member_element(member, object_id, &members) {
                children.push(child);
            }
        }
        if let Some(object) = self.elements.get_mut(object_id) {
            object.children = children;
        }

        tracing::debug!(
            target: targets::TYPE_MODEL,
            type_name = info.object_type.type_name,
            members = self.children(object_id).len(),
            "described type"
        );
        object_id
    }

    fn member_element(
        &mut self,
        member: &MemberDescriptor,
        owner: ElementId,
        siblings: &[&MemberDescriptor],
    ) -> Option<ElementId> {
        let kind = match &member.access {
            MemberAccess::Field { .. } => ElementKind::Property,
            MemberAccess::Action { .. } => ElementKind::Action,
            MemberAccess::ActionList { param_type, .. } => {
                if !has_compatible_collection(param_type, siblings) {
                    skip(member, "no sibling collection matches the action parameter");
                    return None;
                }
                ElementKind::ActionList
            }
        };

        let mut nested = None;
        if kind == ElementKind::Property {
            match &member.value_type {
                ValueType::Opaque(_) => {
                    skip(member, "type cannot be mapped");
                    return None;
                }
                ValueType::Object(object_type) => match self.object_element(object_type) {
                    Some(object) => nested = Some(NestedShape::Object(object)),
                    None => {
                        skip(member, "object type has no description");
                        return None;
                    }
                },
                ValueType::List(element_type) => {
                    if !self.is_mappable_element(element_type) {
                        skip(member, "collection element type cannot be mapped");
                        return None;
                    }
                    nested = Some(NestedShape::Collection);
                }
                _ => {}
            }
        }

        let mut element = TypeElement {
            kind,
            name: member.name.clone(),
            display_name: member
                .attrs
                .display_name
                .clone()
                .unwrap_or_else(|| display_name_for(&member.name)),
            description: member.attrs.description.clone(),
            accelerator: member.attrs.accelerator.clone(),
            value_type: member.value_type.clone(),
            owner: Some(owner),
            children: Vec::new(),
            access: Some(member.access.clone()),
            attrs: member.attrs.clone(),
        };
        if let MemberAccess::ActionList { param_type, .. } = &member.access {
            element.value_type = param_type.clone();
        }
        let id = self.elements.insert(element);

        let children = match nested {
            Some(NestedShape::Object(object)) => vec![object],
            Some(NestedShape::Collection) => vec![self.collection_element(member, id)],
            None => Vec::new(),
        };
        if let Some(element) = self.elements.get_mut(id) {
            element.children = children;
        }
        Some(id)
    }

    fn is_mappable_element(&mut self, element_type: &ValueType) -> bool {
        match element_type {
            ValueType::Opaque(_) => false,
            ValueType::Object(object_type) => self.object_element(object_type).is_some(),
            _ => true,
        }
    }

    /// Build `Collection ── Element ── Object | Value` under a property.
    fn collection_element(&mut self, member: &MemberDescriptor, property: ElementId) -> ElementId {
        let list_type = member.value_type.clone();
        let element_type = list_type.element_type().cloned().unwrap_or(ValueType::Opaque("?"));

        let collection = self.elements.insert(TypeElement::structural(
            ElementKind::Collection,
            member.name.clone(),
            list_type,
            Some(property),
        ));
        let element = self.elements.insert(TypeElement::structural(
            ElementKind::Element,
            element_type.name(),
            element_type.clone(),
            Some(collection),
        ));
        let leaf = match &element_type {
            ValueType::Object(object_type) => self.object_element(object_type),
            _ => None,
        }
        .unwrap_or_else(|| {
            self.elements.insert(TypeElement::structural(
                ElementKind::Value,
                element_type.name(),
                element_type.clone(),
                Some(element),
            ))
        });

        if let Some(e) = self.elements.get_mut(element) {
            e.children = vec![leaf];
        }
        if let Some(c) = self.elements.get_mut(collection) {
            c.children = vec![element];
        }
        collection
    }
}

impl std::ops::Index<ElementId> for TypeModel {
    type Output = TypeElement;

    /// Panics for ids that were not produced by this model.
    fn index(&self, id: ElementId) -> &TypeElement {
        &self.elements[id]
    }
}

enum NestedShape {
    Object(ElementId),
    Collection,
}

fn skip(member: &MemberDescriptor, reason: &str) {
    tracing::debug!(
        target: targets::TYPE_MODEL,
        member = %member.name,
        value_type = %member.value_type.name(),
        reason,
        "skipping member"
    );
}

/// An action-list parameter must be a list whose element type matches the
/// element type of some sibling collection (the named one, if targeted).
fn has_compatible_collection(param_type: &ValueType, siblings: &[&MemberDescriptor]) -> bool {
    let Some(param_element) = param_type.element_type() else {
        return false;
    };
    siblings.iter().any(|sibling| {
        matches!(sibling.access, MemberAccess::Field { .. })
            && sibling.value_type.element_type() == Some(param_element)
    })
}
