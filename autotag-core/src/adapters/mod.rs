//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB (embedded) for the `Repository` port, the reference adapter
//! - An in-process `Repository` for tests and for embedding the engine
//!   without provisioning a database
//! - `tracing` for the `SecurityLog` port

pub mod duckdb;
pub mod logging;
pub mod memory;
