//! Engine configuration

use crate::options::{MappingOptions, ParallelOptions};
use std::num::NonZero;
use std::thread::available_parallelism;

/// Parallelism used when the hardware cannot be queried
const DEFAULT_PARALLELISM: usize = 4;
const MAX_PARALLELISM: usize = 1024;
/// Solver results kept per engine
const DEFAULT_SOLVER_CACHE_CAPACITY: usize = 1024;
/// Resolved `(pair, kind, mode)` outcomes kept per engine
const DEFAULT_RESOLUTION_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// Upper bound on concurrently running element maps in async reconciliation
    pub max_parallelism: usize,
    pub solver_cache_capacity: usize,
    pub resolution_cache_capacity: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            max_parallelism: available_parallelism()
                .map(NonZero::get)
                .unwrap_or(DEFAULT_PARALLELISM),
            solver_cache_capacity: DEFAULT_SOLVER_CACHE_CAPACITY,
            resolution_cache_capacity: DEFAULT_RESOLUTION_CACHE_CAPACITY,
        }
    }
}

impl MapperConfig {
    /// Strictly sequential element execution
    pub fn sequential() -> Self {
        Self {
            max_parallelism: 1,
            ..Self::default()
        }
    }

    #[must_use = "Customize the async parallelism bound"]
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.clamp(1, MAX_PARALLELISM);
        self
    }

    #[must_use = "Customize the solver cache size"]
    pub fn with_solver_cache_capacity(mut self, capacity: usize) -> Self {
        self.solver_cache_capacity = capacity.max(1);
        self
    }

    #[must_use = "Customize the resolution cache size"]
    pub fn with_resolution_cache_capacity(mut self, capacity: usize) -> Self {
        self.resolution_cache_capacity = capacity.max(1);
        self
    }

    /// Copy with every value clamped to its supported range
    pub fn normalized(&self) -> Self {
        Self {
            max_parallelism: self.max_parallelism.clamp(1, MAX_PARALLELISM),
            solver_cache_capacity: self.solver_cache_capacity.max(1),
            resolution_cache_capacity: self.resolution_cache_capacity.max(1),
        }
    }

    /// Options every call starts from; call options win per kind
    pub fn default_options(&self) -> MappingOptions {
        MappingOptions::new().with(ParallelOptions {
            max_parallelism: self.normalized().max_parallelism,
        })
    }
}
