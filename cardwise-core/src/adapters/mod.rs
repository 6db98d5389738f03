//! Adapter implementations
//!
//! Adapters implement the Repository port with concrete storage:
//! - DuckDB for the CLI's local database
//! - Process memory for tests and embedding
//! - Demo data for onboarding

pub mod demo;
pub mod duckdb;
pub mod memory;
