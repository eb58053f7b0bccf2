//! Unit tests for the remap type system


// Type model and hierarchy
mod test_catalog;
mod test_types;
