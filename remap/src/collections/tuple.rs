//! Branch-wise tuple mapping
//!
//! Tuples are values, so a merge always produces a new tuple. A collection
//! inside a branch is not a sequence of the outer container, so matching is
//! disabled for it and its elements are replaced in full.

use super::{async_element_mapper, element_mapper};
use crate::context::MappingContext;
use crate::declaration::MapKind;
use crate::error::{ElementLocation, MapError, MapResult};
use crate::mapper::{AsyncMapper, Mapper};
use crate::options::{MappingOptions, MatchingDisabled};
use crate::value::Value;
use remap_types::{TypeCatalog, TypePair};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct TupleMap {
    pair: TypePair,
    branches: Vec<TypePair>,
    catalog: Arc<TypeCatalog>,
}

impl TupleMap {
    pub(crate) fn new(
        pair: TypePair,
        branches: Vec<TypePair>,
        catalog: Arc<TypeCatalog>,
    ) -> Self {
        Self {
            pair,
            branches,
            catalog,
        }
    }

    pub(crate) fn branches(&self) -> &[TypePair] {
        &self.branches
    }

    fn branch_options(&self, branch: &TypePair, options: &MappingOptions) -> MappingOptions {
        if self.catalog.element_type(&branch.destination).is_some() {
            options.with(MatchingDisabled)
        } else {
            options.clone()
        }
    }

    fn branch_error(&self, error: MapError, index: usize) -> MapError {
        if error.is_not_found_for(&self.branches[index]) {
            MapError::not_found(self.pair.clone())
        } else {
            error.wrap_element(&self.pair, ElementLocation::Branch(index))
        }
    }

    fn items<'a>(&self, value: &'a Value) -> MapResult<&'a [Value]> {
        value
            .as_tuple()
            .filter(|items| items.len() == self.branches.len())
            .ok_or_else(|| MapError::unexpected(&self.pair.source, value))
    }

    /// Destination branches, or `None` when the destination is missing
    fn targets<'a>(&self, destination: &'a Value) -> MapResult<Option<&'a [Value]>> {
        if destination.is_null() {
            return Ok(None);
        }
        destination
            .as_tuple()
            .filter(|items| items.len() == self.branches.len())
            .map(Some)
            .ok_or_else(|| MapError::unexpected(&self.pair.destination, destination))
    }

    fn map_branch(
        &self,
        mapper: &dyn Mapper,
        index: usize,
        source: &Value,
        destination: Option<&Value>,
        options: &MappingOptions,
    ) -> MapResult {
        let branch = &self.branches[index];
        let options = self.branch_options(branch, options);
        let result = match destination {
            Some(destination)
                if !destination.is_null() && mapper.can_map(branch, MapKind::Merge, &options) =>
            {
                mapper.merge(source, destination, branch, &options)
            }
            _ => mapper.map(source, branch, &options),
        };
        result.map_err(|e| self.branch_error(e, index))
    }

    pub(crate) fn map_new(&self, source: &Value, ctx: &MappingContext) -> MapResult {
        self.map_merge(source, &Value::Null, ctx)
    }

    pub(crate) fn map_merge(
        &self,
        source: &Value,
        destination: &Value,
        ctx: &MappingContext,
    ) -> MapResult {
        if source.is_null() {
            return Ok(Value::Null);
        }
        let sources = self.items(source)?;
        let targets = self.targets(destination)?;
        let mapper = element_mapper(ctx.options());
        let options = ctx.nested_options();

        let mut items = Vec::with_capacity(sources.len());
        for (index, item) in sources.iter().enumerate() {
            ctx.check_cancelled()?;
            let target = targets.map(|targets| &targets[index]);
            items.push(self.map_branch(mapper.as_ref(), index, item, target, &options)?);
        }
        Ok(Value::Tuple(items))
    }

    pub(crate) async fn map_new_async(
        self: Arc<Self>,
        source: Value,
        ctx: MappingContext,
    ) -> MapResult {
        self.map_merge_async(source, Value::Null, ctx).await
    }

    pub(crate) async fn map_merge_async(
        self: Arc<Self>,
        source: Value,
        destination: Value,
        ctx: MappingContext,
    ) -> MapResult {
        let Some(mapper) = async_element_mapper(ctx.options()) else {
            return self.map_merge(&source, &destination, &ctx);
        };
        if source.is_null() {
            return Ok(Value::Null);
        }
        let sources = self.items(&source)?.to_vec();
        let targets = self.targets(&destination)?.map(<[Value]>::to_vec);
        let options = ctx.nested_options();

        let mut items = Vec::with_capacity(sources.len());
        for (index, item) in sources.into_iter().enumerate() {
            ctx.check_cancelled()?;
            let branch = self.branches[index].clone();
            let options = self.branch_options(&branch, &options);
            let target = targets
                .as_ref()
                .map(|targets| targets[index].clone())
                .filter(|target| !target.is_null());
            let result = match target {
                Some(target) if mapper.can_map_async(&branch, MapKind::Merge, &options) => {
                    mapper.merge_async(item, target, branch, options).await
                }
                _ => mapper.map_async(item, branch, options).await,
            };
            items.push(result.map_err(|e| self.branch_error(e, index))?);
        }
        Ok(Value::Tuple(items))
    }
}
