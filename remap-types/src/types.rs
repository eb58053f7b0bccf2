//! Structured type descriptors
//!
//! Types are plain trees: named types with optional generic arguments, arrays,
//! tuples and, inside open declarations only, generic parameter placeholders.
//! Everything here is cheap to clone and hashes structurally, so a `TypePair`
//! can be used directly as a cache key.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Shared type name (e.g. "int", "List", "Product")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured type representation used by the catalog, the unifier and the solver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StructuredType {
    /// Non-generic named type (e.g. "int", "Product")
    Simple(TypeName),
    /// Generic named type with arguments (e.g. List<int>, Dictionary<K, V>)
    Generic {
        base: TypeName,
        args: Vec<StructuredType>,
    },
    /// Array with its element type and rank (rank 1 is `T[]`, rank 2 is `T[,]`)
    Array {
        element: Box<StructuredType>,
        rank: usize,
    },
    /// Heterogeneous fixed-size tuple
    Tuple(Vec<StructuredType>),
    /// Generic parameter placeholder, indexes into the declaring signature's parameters
    Param(usize),
}

impl StructuredType {
    /// Create a simple type
    pub fn simple(name: &str) -> Self {
        StructuredType::Simple(TypeName::new(name))
    }

    /// Create a generic type with arguments
    pub fn generic(base: &str, args: Vec<StructuredType>) -> Self {
        StructuredType::Generic {
            base: TypeName::new(base),
            args,
        }
    }

    /// Create a single-dimensional array type
    pub fn array(element: StructuredType) -> Self {
        Self::array_of_rank(element, 1)
    }

    /// Create an array type of the given rank
    pub fn array_of_rank(element: StructuredType, rank: usize) -> Self {
        StructuredType::Array {
            element: Box::new(element),
            rank,
        }
    }

    /// Create a tuple type
    pub fn tuple(items: Vec<StructuredType>) -> Self {
        StructuredType::Tuple(items)
    }

    /// Create a generic parameter placeholder
    pub fn param(index: usize) -> Self {
        StructuredType::Param(index)
    }

    /// Name of the nominal type, if this is a simple or generic type
    pub fn base_name(&self) -> Option<&TypeName> {
        match self {
            StructuredType::Simple(name) => Some(name),
            StructuredType::Generic { base, .. } => Some(base),
            _ => None,
        }
    }

    /// Generic arguments (empty for everything but generic types)
    pub fn args(&self) -> &[StructuredType] {
        match self {
            StructuredType::Generic { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, StructuredType::Tuple(_))
    }

    /// Whether any generic parameter placeholder occurs in this type
    pub fn is_open(&self) -> bool {
        match self {
            StructuredType::Param(_) => true,
            StructuredType::Simple(_) => false,
            StructuredType::Generic { args, .. } => args.iter().any(Self::is_open),
            StructuredType::Array { element, .. } => element.is_open(),
            StructuredType::Tuple(items) => items.iter().any(Self::is_open),
        }
    }

    /// Collect every parameter index occurring in this type
    pub fn collect_params(&self, out: &mut BTreeSet<usize>) {
        match self {
            StructuredType::Param(index) => {
                out.insert(*index);
            }
            StructuredType::Simple(_) => {}
            StructuredType::Generic { args, .. } => {
                args.iter().for_each(|arg| arg.collect_params(out));
            }
            StructuredType::Array { element, .. } => element.collect_params(out),
            StructuredType::Tuple(items) => {
                items.iter().for_each(|item| item.collect_params(out));
            }
        }
    }

    /// Number of nodes that are not parameter placeholders.
    ///
    /// Used to rank open declarations: more concrete structure is more specific.
    pub fn concrete_weight(&self) -> usize {
        match self {
            StructuredType::Param(_) => 0,
            StructuredType::Simple(_) => 1,
            StructuredType::Generic { args, .. } => {
                1 + args.iter().map(Self::concrete_weight).sum::<usize>()
            }
            StructuredType::Array { element, .. } => 1 + element.concrete_weight(),
            StructuredType::Tuple(items) => {
                1 + items.iter().map(Self::concrete_weight).sum::<usize>()
            }
        }
    }

    /// Replace every parameter placeholder with the matching argument.
    ///
    /// Placeholders without a matching argument are left in place.
    pub fn substitute(&self, arguments: &[StructuredType]) -> StructuredType {
        match self {
            StructuredType::Param(index) => arguments
                .get(*index)
                .cloned()
                .unwrap_or(StructuredType::Param(*index)),
            StructuredType::Simple(_) => self.clone(),
            StructuredType::Generic { base, args } => StructuredType::Generic {
                base: base.clone(),
                args: args.iter().map(|arg| arg.substitute(arguments)).collect(),
            },
            StructuredType::Array { element, rank } => StructuredType::Array {
                element: Box::new(element.substitute(arguments)),
                rank: *rank,
            },
            StructuredType::Tuple(items) => {
                StructuredType::Tuple(items.iter().map(|item| item.substitute(arguments)).collect())
            }
        }
    }
}

impl fmt::Display for StructuredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuredType::Simple(name) => write!(f, "{name}"),
            StructuredType::Generic { base, args } => {
                write!(f, "{base}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            StructuredType::Array { element, rank } => {
                write!(f, "{element}[{}]", ",".repeat(rank.saturating_sub(1)))
            }
            StructuredType::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            StructuredType::Param(index) => write!(f, "T{index}"),
        }
    }
}

/// Ordered (source, destination) pair identifying a transformation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypePair {
    pub source: StructuredType,
    pub destination: StructuredType,
}

impl TypePair {
    pub fn new(source: StructuredType, destination: StructuredType) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn is_open(&self) -> bool {
        self.source.is_open() || self.destination.is_open()
    }

    pub fn substitute(&self, arguments: &[StructuredType]) -> TypePair {
        TypePair::new(
            self.source.substitute(arguments),
            self.destination.substitute(arguments),
        )
    }
}

impl fmt::Display for TypePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Concrete types bound to the parameters of an open declaration, in parameter order
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeArguments(Vec<StructuredType>);

impl TypeArguments {
    pub fn new(arguments: Vec<StructuredType>) -> Self {
        Self(arguments)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, index: usize) -> Option<&StructuredType> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[StructuredType] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructuredType> {
        self.0.iter()
    }
}

impl fmt::Display for TypeArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "<{}>", names.join(", "))
    }
}

/// Constructors for the builtin types registered by `TypeCatalog::with_builtins`
pub mod ty {
    use super::StructuredType;

    pub const OBJECT: &str = "object";
    pub const BOOL: &str = "bool";
    pub const INT: &str = "int";
    pub const LONG: &str = "long";
    pub const FLOAT: &str = "float";
    pub const STRING: &str = "string";
    pub const ENUMERABLE: &str = "Enumerable";
    pub const COLLECTION: &str = "Collection";
    pub const READ_ONLY_COLLECTION: &str = "ReadOnlyCollection";
    pub const LIST: &str = "List";
    pub const SET: &str = "Set";
    pub const DICTIONARY: &str = "Dictionary";
    pub const KEY_VALUE_PAIR: &str = "KeyValuePair";
    pub const READ_ONLY_LIST: &str = "ReadOnlyList";

    pub fn object() -> StructuredType {
        StructuredType::simple(OBJECT)
    }

    pub fn boolean() -> StructuredType {
        StructuredType::simple(BOOL)
    }

    pub fn int() -> StructuredType {
        StructuredType::simple(INT)
    }

    pub fn long() -> StructuredType {
        StructuredType::simple(LONG)
    }

    pub fn float() -> StructuredType {
        StructuredType::simple(FLOAT)
    }

    pub fn string() -> StructuredType {
        StructuredType::simple(STRING)
    }

    pub fn enumerable(element: StructuredType) -> StructuredType {
        StructuredType::generic(ENUMERABLE, vec![element])
    }

    pub fn collection(element: StructuredType) -> StructuredType {
        StructuredType::generic(COLLECTION, vec![element])
    }

    pub fn read_only_collection(element: StructuredType) -> StructuredType {
        StructuredType::generic(READ_ONLY_COLLECTION, vec![element])
    }

    pub fn list(element: StructuredType) -> StructuredType {
        StructuredType::generic(LIST, vec![element])
    }

    pub fn set(element: StructuredType) -> StructuredType {
        StructuredType::generic(SET, vec![element])
    }

    pub fn dictionary(key: StructuredType, value: StructuredType) -> StructuredType {
        StructuredType::generic(DICTIONARY, vec![key, value])
    }

    pub fn key_value_pair(key: StructuredType, value: StructuredType) -> StructuredType {
        StructuredType::generic(KEY_VALUE_PAIR, vec![key, value])
    }

    pub fn read_only_list(element: StructuredType) -> StructuredType {
        StructuredType::generic(READ_ONLY_LIST, vec![element])
    }

    pub fn array(element: StructuredType) -> StructuredType {
        StructuredType::array(element)
    }
}
