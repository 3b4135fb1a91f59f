//! lexgraph-core: Shared records, settings, and error handling for lexgraph.
//!
//! This crate provides the foundational types used across all lexgraph components:
//! - Contract records (Agreement, Party, ContractClause) read from the graph
//! - The untyped `Row` shape every graph query returns
//! - Layered settings loading (file + environment)
//! - The configuration error type

pub mod config;
pub mod error;
pub mod types;

pub use config::Settings;
pub use error::ConfigError;
pub use types::{Agreement, ContractClause, ContractStatistics, Party, Row, SimilarExcerpt};
