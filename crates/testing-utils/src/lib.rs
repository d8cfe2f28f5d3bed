//! # Ridehail Testing Utils
//!
//! Shared testing utilities for the dispatch workspace. Provides in-memory
//! mock implementations of the repository and port traits plus builders for
//! test entities, so unit and integration tests never need a real database
//! or push transport.

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
