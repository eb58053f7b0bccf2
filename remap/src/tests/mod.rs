//! Unit tests for the mapping engine

mod fixtures;

// Registry and resolution
mod test_registry;
mod test_resolution;


// Collections
mod test_async_collections;

// Options, errors and configuration
mod test_config;
