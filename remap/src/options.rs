//! Mapping options
//!
//! `MappingOptions` is an immutable bag of option values keyed by their
//! concrete type. At most one value per type is present; adding a value of a
//! type that is already there replaces it and moves it to the end. Every
//! modification returns a new bag, so a bag can be shared freely between
//! concurrent calls.

use crate::cancellation::CancellationToken;
use crate::context::ContextId;
use crate::mapper::{AsyncMapper, Mapper};
use crate::matcher::Matcher;
use indexmap::IndexMap;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Marker trait for values stored in [`MappingOptions`].
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait MappingOption: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> MappingOption for T {}

#[derive(Clone)]
struct OptionEntry {
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Ordered, immutable option bag
#[derive(Clone, Default)]
pub struct MappingOptions {
    entries: Arc<IndexMap<TypeId, OptionEntry>>,
}

impl fmt::Debug for MappingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

impl MappingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: MappingOption>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    pub fn contains<T: MappingOption>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// New bag with `option` added, replacing any value of the same type
    pub fn with<T: MappingOption>(&self, option: T) -> Self {
        let mut entries = (*self.entries).clone();
        let id = TypeId::of::<T>();
        entries.shift_remove(&id);
        entries.insert(
            id,
            OptionEntry {
                name: type_name::<T>(),
                value: Arc::new(option),
            },
        );
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Add `option` only when no value of its type is present
    pub fn with_default<T: MappingOption>(&self, option: T) -> Self {
        if self.contains::<T>() {
            self.clone()
        } else {
            self.with(option)
        }
    }

    pub fn without<T: MappingOption>(&self) -> Self {
        if !self.contains::<T>() {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.shift_remove(&TypeId::of::<T>());
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Overlay `other` on top of this bag; `other` wins per option type
    pub fn merge(&self, other: &MappingOptions) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut entries = (*self.entries).clone();
        for (id, entry) in other.entries.iter() {
            entries.shift_remove(id);
            entries.insert(*id, entry.clone());
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names of the stored options, in order
    pub fn kinds(&self) -> Vec<&'static str> {
        self.entries.values().map(|entry| entry.name).collect()
    }
}

/// Dispatcher used for nested calls made from inside a map
#[derive(Debug, Clone)]
pub struct MapperOverride(pub Arc<dyn Mapper>);

/// Asynchronous dispatcher used for nested calls
#[derive(Debug, Clone)]
pub struct AsyncMapperOverride(pub Arc<dyn AsyncMapper>);

/// Matcher used when reconciling collections
#[derive(Debug, Clone)]
pub struct MatcherOverride(pub Arc<dyn Matcher>);

/// Collection merge behaviour
#[derive(Debug, Clone)]
pub struct MergeCollectionOptions {
    /// Element matcher taking precedence over the context matcher
    pub matcher: Option<Arc<dyn Matcher>>,
    /// Remove destination elements no source element matches
    pub remove_unmatched: bool,
    /// Replace read-only destinations instead of failing
    pub recreate_readonly: bool,
}

impl Default for MergeCollectionOptions {
    fn default() -> Self {
        Self {
            matcher: None,
            remove_unmatched: true,
            recreate_readonly: false,
        }
    }
}

impl MergeCollectionOptions {
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn keep_unmatched(mut self) -> Self {
        self.remove_unmatched = false;
        self
    }

    pub fn recreate_readonly(mut self) -> Self {
        self.recreate_readonly = true;
        self
    }
}

/// Bound on concurrently running element maps in asynchronous reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelOptions {
    pub max_parallelism: usize,
}

/// Element mappers consulted before the ambient dispatcher
#[derive(Debug, Clone, Default)]
pub struct ElementMapperOverride {
    pub mappers: Vec<Arc<dyn Mapper>>,
    pub async_mappers: Vec<Arc<dyn AsyncMapper>>,
}

/// Marks a call made from inside another map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedMappingContext {
    pub parent: ContextId,
    pub depth: usize,
}

/// Set by collaborators that already hold their own serialization lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializedSection;

/// Disables element matching for the collection mapped with these options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchingDisabled;

/// Caller's cancellation token
#[derive(Debug, Clone)]
pub struct Cancellation(pub CancellationToken);
