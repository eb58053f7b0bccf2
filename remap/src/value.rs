//! Runtime value representation
//!
//! Maps operate on dynamically typed values. Scalars and tuples are plain data;
//! objects and collections are shared, lockable references so that a merge can
//! update a destination in place and callers can observe reference identity.

use crate::error::{MapError, MapResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use remap_types::{ty, CollectionKind, CollectionShape, StructuredType, TypeCatalog};
use std::fmt;
use std::sync::Arc;

/// Runtime values handled by maps
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value (null reference)
    #[default]
    Null,
    Bool(bool),
    /// Any integral value
    Int(i64),
    Float(f64),
    String(Arc<str>),
    /// Fixed-size heterogeneous tuple
    Tuple(Vec<Value>),
    /// Shared object instance
    Object(ObjectRef),
    /// Shared collection instance
    Collection(CollectionRef),
}

impl PartialEq for Value {
    /// Scalars and tuples compare by value, objects and collections by reference
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Collection(a), Value::Collection(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    pub fn string(value: &str) -> Self {
        Value::String(Arc::from(value))
    }

    /// Kind of this value, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::Object(_) => "object",
            Value::Collection(_) => "collection",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionRef> {
        match self {
            Value::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn require_int(&self) -> MapResult<i64> {
        self.as_int().ok_or_else(|| MapError::unexpected("int", self))
    }

    pub fn require_str(&self) -> MapResult<&str> {
        self.as_str().ok_or_else(|| MapError::unexpected("string", self))
    }

    pub fn require_object(&self) -> MapResult<&ObjectRef> {
        self.as_object().ok_or_else(|| MapError::unexpected("object", self))
    }

    pub fn require_collection(&self) -> MapResult<&CollectionRef> {
        self.as_collection()
            .ok_or_else(|| MapError::unexpected("collection", self))
    }

    /// Both values point at the same object or collection instance
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Collection(a), Value::Collection(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// New `List<element>` holding `items`
    pub fn list(element: StructuredType, items: Vec<Value>) -> Self {
        Value::Collection(CollectionRef::from_items(
            ty::list(element),
            CollectionShape::new(CollectionKind::List),
            items,
        ))
    }

    /// New `element[]` holding `items`
    pub fn array(element: StructuredType, items: Vec<Value>) -> Self {
        Value::Collection(CollectionRef::from_items(
            ty::array(element),
            CollectionShape::read_only(CollectionKind::Array),
            items,
        ))
    }

    /// New `Set<element>` holding the distinct `items`
    pub fn set(element: StructuredType, items: Vec<Value>) -> Self {
        Value::Collection(CollectionRef::from_items(
            ty::set(element),
            CollectionShape::new(CollectionKind::Set),
            items,
        ))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl From<CollectionRef> for Value {
    fn from(value: CollectionRef) -> Self {
        Value::Collection(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Tuple(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", rendered.join(", "))
            }
            Value::Object(object) => write!(f, "{}{{..}}", object.ty()),
            Value::Collection(collection) => {
                write!(f, "{}[{}]", collection.ty(), collection.len())
            }
        }
    }
}

#[derive(Debug)]
struct Object {
    ty: StructuredType,
    fields: IndexMap<String, Value>,
}

/// Shared handle to a mutable object
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl fmt::Debug for ObjectRef {
    // Objects may reference each other; only the identity is printed
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.ty(), Arc::as_ptr(&self.0))
    }
}

impl ObjectRef {
    pub fn new(ty: StructuredType) -> Self {
        Self::with_fields(ty, IndexMap::new())
    }

    pub fn with_fields(ty: StructuredType, fields: IndexMap<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(Object { ty, fields })))
    }

    pub fn ty(&self) -> StructuredType {
        self.0.read().ty.clone()
    }

    /// Field value, `Null` when unset
    pub fn get(&self, name: &str) -> Value {
        self.0.read().fields.get(name).cloned().unwrap_or_default()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.0.write().fields.insert(name.to_string(), value.into());
    }

    /// Builder-style `set`
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn field_names(&self) -> Vec<String> {
        self.0.read().fields.keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug)]
struct Collection {
    ty: StructuredType,
    shape: CollectionShape,
    items: Vec<Value>,
}

impl Collection {
    fn insert(&mut self, value: Value) {
        match self.shape.kind {
            CollectionKind::Set => {
                if !self.items.contains(&value) {
                    self.items.push(value);
                }
            }
            CollectionKind::Dictionary => {
                let key = value.as_tuple().and_then(|entry| entry.first()).cloned();
                let existing = key.and_then(|key| {
                    self.items.iter().position(|item| {
                        item.as_tuple().and_then(|entry| entry.first()) == Some(&key)
                    })
                });
                match existing {
                    Some(index) => self.items[index] = value,
                    None => self.items.push(value),
                }
            }
            CollectionKind::Array | CollectionKind::List => self.items.push(value),
        }
    }
}

/// Shared handle to a mutable collection.
///
/// Sets keep distinct items; dictionaries store `(key, value)` tuples and
/// replace entries with an equal key.
#[derive(Clone)]
pub struct CollectionRef(Arc<RwLock<Collection>>);

impl fmt::Debug for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let collection = self.0.read();
        f.debug_struct("CollectionRef")
            .field("ty", &collection.ty.to_string())
            .field("items", &collection.items)
            .finish()
    }
}

impl CollectionRef {
    pub fn new(ty: StructuredType, shape: CollectionShape) -> Self {
        Self::from_items(ty, shape, Vec::new())
    }

    pub fn from_items(ty: StructuredType, shape: CollectionShape, items: Vec<Value>) -> Self {
        let mut collection = Collection {
            ty,
            shape,
            items: Vec::with_capacity(items.len()),
        };
        items.into_iter().for_each(|item| collection.insert(item));
        Self(Arc::new(RwLock::new(collection)))
    }

    pub fn ty(&self) -> StructuredType {
        self.0.read().ty.clone()
    }

    pub fn shape(&self) -> CollectionShape {
        self.0.read().shape
    }

    pub fn is_read_only(&self) -> bool {
        self.0.read().shape.read_only
    }

    /// Snapshot of the current items
    pub fn items(&self) -> Vec<Value> {
        self.0.read().items.clone()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().items.is_empty()
    }

    pub fn push(&self, value: Value) {
        self.0.write().insert(value);
    }

    /// Replace the contents, keeping this instance
    pub fn replace_items(&self, items: Vec<Value>) {
        let mut collection = self.0.write();
        collection.items.clear();
        items.into_iter().for_each(|item| collection.insert(item));
    }

    pub fn ptr_eq(&self, other: &CollectionRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Default-construct a value of `ty`.
///
/// Value-type fields are default-constructed recursively, reference fields
/// start as `Null`. Fails for types without a parameterless constructor and for
/// value types that contain themselves by value.
pub fn instantiate(catalog: &TypeCatalog, target: &StructuredType) -> MapResult {
    let mut path = Vec::new();
    construct(catalog, target, &mut path)?.ok_or_else(|| MapError::NotConstructible {
        ty: target.clone(),
    })
}

/// `Ok(None)` when `target` has no parameterless constructor. `path` holds the
/// object types currently being built.
fn construct(
    catalog: &TypeCatalog,
    target: &StructuredType,
    path: &mut Vec<StructuredType>,
) -> MapResult<Option<Value>> {
    if !catalog.has_default_constructor(target) {
        return Ok(None);
    }

    if let StructuredType::Tuple(items) = target {
        let items = items
            .iter()
            .map(|item| Ok(construct(catalog, item, path)?.unwrap_or_default()))
            .collect::<MapResult<Vec<_>>>()?;
        return Ok(Some(Value::Tuple(items)));
    }

    match target.base_name().map(|name| name.as_str()) {
        Some(ty::BOOL) => return Ok(Some(Value::Bool(false))),
        Some(ty::INT) | Some(ty::LONG) => return Ok(Some(Value::Int(0))),
        Some(ty::FLOAT) => return Ok(Some(Value::Float(0.0))),
        _ => {}
    }

    if let Some(shape) = catalog.collection_shape(target) {
        return Ok(Some(Value::Collection(CollectionRef::new(target.clone(), shape))));
    }

    if catalog.descriptor_of(target).is_none() {
        return Ok(None);
    }
    if path.contains(target) {
        return Err(MapError::CyclicValueType { ty: target.clone() });
    }

    path.push(target.clone());
    let object = ObjectRef::new(target.clone());
    for (name, field) in catalog.fields_of(target) {
        let initial = if catalog.is_value_type(&field) {
            construct(catalog, &field, path)?
        } else {
            None
        };
        object.set(&name, initial.unwrap_or_default());
    }
    path.pop();
    Ok(Some(Value::Object(object)))
}
