//! Type catalog and hierarchy graph
//!
//! The catalog is the type universe maps are resolved against. Each named type
//! has a `TypeDescriptor` describing its category, fields and direct supertypes;
//! the supertype relation is kept in a petgraph directed graph so that every
//! transitive ancestor of a concrete type can be instantiated on demand.
//!
//! Arrays and tuples are structural and never registered: rank-1 arrays behave
//! like fixed-size read-only collections, tuples like field-less value types.

use crate::error::CatalogError;
use crate::types::{ty, StructuredType, TypeName};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{algo, Direction};
use std::collections::{HashMap, HashSet, VecDeque};

/// Broad classification of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Reference type with identity
    Class,
    /// Value type, copied on assignment
    Struct,
    /// Abstract contract, never instantiated directly
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Array,
    List,
    Set,
    Dictionary,
}

/// How a collection-shaped type stores its elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionShape {
    pub kind: CollectionKind,
    /// Fixed-size or explicitly read-only; merging into it in place is not possible
    pub read_only: bool,
}

impl CollectionShape {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            read_only: false,
        }
    }

    pub fn read_only(kind: CollectionKind) -> Self {
        Self {
            kind,
            read_only: true,
        }
    }
}

/// Description of one named type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: TypeName,
    /// Number of generic parameters; fields and supertypes refer to them as `Param(i)`
    pub arity: usize,
    pub category: TypeCategory,
    /// Whether a class exposes a parameterless constructor
    pub default_constructible: bool,
    pub fields: IndexMap<String, StructuredType>,
    /// Direct supertypes, possibly open over this type's own parameters
    pub supertypes: Vec<StructuredType>,
    pub collection: Option<CollectionShape>,
}

impl TypeDescriptor {
    fn with_category(name: &str, category: TypeCategory) -> Self {
        Self {
            name: TypeName::new(name),
            arity: 0,
            category,
            default_constructible: category == TypeCategory::Struct,
            fields: IndexMap::new(),
            supertypes: Vec::new(),
            collection: None,
        }
    }

    /// A class with a parameterless constructor
    pub fn class(name: &str) -> Self {
        Self::with_category(name, TypeCategory::Class).default_constructible(true)
    }

    pub fn structure(name: &str) -> Self {
        Self::with_category(name, TypeCategory::Struct)
    }

    pub fn interface(name: &str) -> Self {
        Self::with_category(name, TypeCategory::Interface)
    }

    pub fn generic(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    pub fn default_constructible(mut self, constructible: bool) -> Self {
        self.default_constructible = constructible;
        self
    }

    pub fn field(mut self, name: &str, ty: StructuredType) -> Self {
        self.fields.insert(name.to_string(), ty);
        self
    }

    pub fn implements(mut self, supertype: StructuredType) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn collection(mut self, shape: CollectionShape) -> Self {
        self.collection = Some(shape);
        self
    }
}

lazy_static! {
    /// Builtin scalar and collection types, in registration order
    static ref BUILTIN_TYPES: Vec<TypeDescriptor> = builtin_descriptors();
}

fn builtin_descriptors() -> Vec<TypeDescriptor> {
    let t0 = StructuredType::param(0);
    let t1 = StructuredType::param(1);

    vec![
        TypeDescriptor::class(ty::OBJECT),
        TypeDescriptor::structure(ty::BOOL),
        TypeDescriptor::structure(ty::INT),
        TypeDescriptor::structure(ty::LONG),
        TypeDescriptor::structure(ty::FLOAT),
        TypeDescriptor::class(ty::STRING).default_constructible(false),
        TypeDescriptor::interface(ty::ENUMERABLE).generic(1),
        TypeDescriptor::interface(ty::READ_ONLY_COLLECTION)
            .generic(1)
            .implements(ty::enumerable(t0.clone()))
            .collection(CollectionShape::read_only(CollectionKind::List)),
        TypeDescriptor::interface(ty::COLLECTION)
            .generic(1)
            .implements(ty::enumerable(t0.clone()))
            .collection(CollectionShape::new(CollectionKind::List)),
        TypeDescriptor::class(ty::LIST)
            .generic(1)
            .implements(ty::collection(t0.clone()))
            .implements(ty::read_only_collection(t0.clone()))
            .collection(CollectionShape::new(CollectionKind::List)),
        TypeDescriptor::class(ty::SET)
            .generic(1)
            .implements(ty::collection(t0.clone()))
            .implements(ty::read_only_collection(t0.clone()))
            .collection(CollectionShape::new(CollectionKind::Set)),
        TypeDescriptor::structure(ty::KEY_VALUE_PAIR)
            .generic(2)
            .field("key", t0.clone())
            .field("value", t1.clone()),
        TypeDescriptor::class(ty::DICTIONARY)
            .generic(2)
            .implements(ty::collection(StructuredType::tuple(vec![
                t0.clone(),
                t1.clone(),
            ])))
            .collection(CollectionShape::new(CollectionKind::Dictionary)),
        TypeDescriptor::class(ty::READ_ONLY_LIST)
            .generic(1)
            .default_constructible(false)
            .implements(ty::read_only_collection(t0))
            .collection(CollectionShape::read_only(CollectionKind::List)),
    ]
}

/// Registered types and their supertype graph
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    descriptors: IndexMap<TypeName, TypeDescriptor>,
    /// Edges point from a type to each direct supertype, weighted with the open supertype
    hierarchy: DiGraph<TypeName, StructuredType>,
    nodes: HashMap<TypeName, NodeIndex>,
}

impl TypeCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the builtin types
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        for descriptor in BUILTIN_TYPES.iter() {
            // Builtins skip validation
            catalog.insert(descriptor.clone());
        }
        catalog
    }

    /// Register a new type.
    ///
    /// Supertypes must already be registered and carry the right number of
    /// arguments; the hierarchy must stay acyclic.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<(), CatalogError> {
        if self.descriptors.contains_key(&descriptor.name) {
            return Err(CatalogError::DuplicateType {
                name: descriptor.name,
            });
        }

        for supertype in &descriptor.supertypes {
            self.validate_reference(supertype, &descriptor.name, Some(descriptor.arity))?;
        }

        let name = descriptor.name.clone();
        self.insert(descriptor);

        if algo::is_cyclic_directed(&self.hierarchy) {
            self.remove(&name);
            return Err(CatalogError::CyclicHierarchy { name });
        }

        Ok(())
    }

    /// Check that every named type inside `ty` is registered with the right arity
    pub fn check_reference(
        &self,
        ty: &StructuredType,
        referenced_by: &TypeName,
    ) -> Result<(), CatalogError> {
        self.validate_reference(ty, referenced_by, None)
    }

    fn validate_reference(
        &self,
        reference: &StructuredType,
        owner: &TypeName,
        owner_arity: Option<usize>,
    ) -> Result<(), CatalogError> {
        match reference {
            StructuredType::Simple(_) | StructuredType::Generic { .. } => {
                let Some(base) = reference.base_name() else {
                    return Ok(());
                };
                // Self references are fine inside argument lists
                let arity = match owner_arity {
                    Some(arity) if base == owner => arity,
                    _ => self
                        .descriptors
                        .get(base)
                        .map(|d| d.arity)
                        .ok_or_else(|| CatalogError::UnknownType {
                            name: base.clone(),
                            referenced_by: owner.clone(),
                        })?,
                };
                if arity != reference.args().len() {
                    return Err(CatalogError::ArityMismatch {
                        name: base.clone(),
                        expected: arity,
                        found: reference.args().len(),
                    });
                }
                reference
                    .args()
                    .iter()
                    .try_for_each(|arg| self.validate_reference(arg, owner, owner_arity))
            }
            StructuredType::Array { element, .. } => {
                self.validate_reference(element, owner, owner_arity)
            }
            StructuredType::Tuple(items) => items
                .iter()
                .try_for_each(|item| self.validate_reference(item, owner, owner_arity)),
            StructuredType::Param(_) => Ok(()),
        }
    }

    fn insert(&mut self, descriptor: TypeDescriptor) {
        let node = self.node_for(&descriptor.name);
        for supertype in &descriptor.supertypes {
            if let Some(base) = supertype.base_name() {
                let target = self.node_for(base);
                self.hierarchy.add_edge(node, target, supertype.clone());
            }
        }
        self.descriptors.insert(descriptor.name.clone(), descriptor);
    }

    fn remove(&mut self, name: &TypeName) {
        self.descriptors.shift_remove(name);
        if let Some(node) = self.nodes.get(name).copied() {
            let mut edges: Vec<_> = self
                .hierarchy
                .edges_directed(node, Direction::Outgoing)
                .map(|edge| edge.id())
                .collect();
            // Edge removal swaps the last edge into the freed slot
            edges.sort_unstable_by(|a, b| b.cmp(a));
            for edge in edges {
                self.hierarchy.remove_edge(edge);
            }
        }
    }

    fn node_for(&mut self, name: &TypeName) -> NodeIndex {
        if let Some(node) = self.nodes.get(name) {
            return *node;
        }
        let node = self.hierarchy.add_node(name.clone());
        self.nodes.insert(name.clone(), node);
        node
    }

    pub fn descriptor(&self, name: &TypeName) -> Option<&TypeDescriptor> {
        self.descriptors.get(name)
    }

    /// Descriptor of a simple or generic type
    pub fn descriptor_of(&self, ty: &StructuredType) -> Option<&TypeDescriptor> {
        ty.base_name().and_then(|name| self.descriptors.get(name))
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.descriptors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Every transitive supertype of a concrete type, nearest first.
    ///
    /// `object` is implicit and never listed.
    pub fn ancestors(&self, ty: &StructuredType) -> Vec<StructuredType> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        for direct in self.direct_supertypes(ty) {
            if seen.insert(direct.clone()) {
                queue.push_back(direct);
            }
        }

        while let Some(current) = queue.pop_front() {
            for next in self.direct_supertypes(&current) {
                if seen.insert(next.clone()) {
                    queue.push_back(next);
                }
            }
            result.push(current);
        }

        result
    }

    fn direct_supertypes(&self, ty: &StructuredType) -> Vec<StructuredType> {
        match ty {
            StructuredType::Array { element, rank: 1 } => {
                vec![ty::read_only_collection((**element).clone())]
            }
            StructuredType::Simple(name) | StructuredType::Generic { base: name, .. } => {
                let Some(node) = self.nodes.get(name) else {
                    return Vec::new();
                };
                let mut edges: Vec<_> = self
                    .hierarchy
                    .edges_directed(*node, Direction::Outgoing)
                    .collect();
                // petgraph yields outgoing edges newest first
                edges.sort_by_key(|edge| edge.id());
                edges
                    .into_iter()
                    .map(|edge| edge.weight().substitute(ty.args()))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Whether a value of type `from` can be used where `to` is expected
    pub fn is_assignable(&self, from: &StructuredType, to: &StructuredType) -> bool {
        if from == to || *to == ty::object() {
            return true;
        }
        self.ancestors(from).iter().any(|ancestor| ancestor == to)
    }

    /// Element type of a collection-shaped type, via its `Enumerable<T>` ancestor
    pub fn element_type(&self, ty: &StructuredType) -> Option<StructuredType> {
        if let StructuredType::Array { element, .. } = ty {
            return Some((**element).clone());
        }
        if ty.base_name().map(TypeName::as_str) == Some(ty::ENUMERABLE) {
            return ty.args().first().cloned();
        }
        self.ancestors(ty)
            .into_iter()
            .find(|ancestor| ancestor.base_name().map(TypeName::as_str) == Some(ty::ENUMERABLE))
            .and_then(|enumerable| enumerable.args().first().cloned())
    }

    /// Storage shape of a collection type, `None` for non-collections
    pub fn collection_shape(&self, ty: &StructuredType) -> Option<CollectionShape> {
        match ty {
            StructuredType::Array { rank: 1, .. } => {
                Some(CollectionShape::read_only(CollectionKind::Array))
            }
            StructuredType::Array { .. } => None,
            _ => self.descriptor_of(ty).and_then(|d| d.collection),
        }
    }

    pub fn is_value_type(&self, ty: &StructuredType) -> bool {
        match ty {
            StructuredType::Tuple(_) => true,
            _ => self
                .descriptor_of(ty)
                .is_some_and(|d| d.category == TypeCategory::Struct),
        }
    }

    pub fn is_reference_type(&self, ty: &StructuredType) -> bool {
        match ty {
            StructuredType::Array { .. } => true,
            _ => self
                .descriptor_of(ty)
                .is_some_and(|d| d.category != TypeCategory::Struct),
        }
    }

    pub fn is_interface(&self, ty: &StructuredType) -> bool {
        self.descriptor_of(ty)
            .is_some_and(|d| d.category == TypeCategory::Interface)
    }

    /// Value type whose fields are, recursively, unmanaged value types
    pub fn is_unmanaged(&self, ty: &StructuredType) -> bool {
        self.is_unmanaged_guarded(ty, &mut HashSet::new())
    }

    fn is_unmanaged_guarded(
        &self,
        ty: &StructuredType,
        visiting: &mut HashSet<StructuredType>,
    ) -> bool {
        if !visiting.insert(ty.clone()) {
            return false;
        }
        let unmanaged = match ty {
            StructuredType::Tuple(items) => items
                .iter()
                .all(|item| self.is_unmanaged_guarded(item, visiting)),
            _ => self.is_value_type(ty)
                && self
                    .fields_of(ty)
                    .iter()
                    .all(|(_, field)| self.is_unmanaged_guarded(field, visiting)),
        };
        visiting.remove(ty);
        unmanaged
    }

    pub fn has_default_constructor(&self, ty: &StructuredType) -> bool {
        match ty {
            StructuredType::Tuple(_) => true,
            StructuredType::Array { .. } | StructuredType::Param(_) => false,
            _ => self.descriptor_of(ty).is_some_and(|d| match d.category {
                TypeCategory::Struct => true,
                TypeCategory::Class => d.default_constructible,
                TypeCategory::Interface => false,
            }),
        }
    }

    /// Fields of a concrete type with generic arguments substituted
    pub fn fields_of(&self, ty: &StructuredType) -> Vec<(String, StructuredType)> {
        self.descriptor_of(ty)
            .map(|d| {
                d.fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.substitute(ty.args())))
                    .collect()
            })
            .unwrap_or_default()
    }
}
