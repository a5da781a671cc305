//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for durable storage
//! - An in-memory store for tests and embedding

pub mod duckdb;
pub mod memory;
