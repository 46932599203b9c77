//! Deterministic, pure logic for the access-control core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! documents and return structured errors suitable for tests.

pub mod config_store;
pub mod group_registry;
pub mod section;
pub mod types;
