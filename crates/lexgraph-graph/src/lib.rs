//! lexgraph Graph: the graph store behind contract question answering.
//!
//! Every read the engine performs goes through the [`GraphStore`] trait so
//! that the Neo4j driver, timeouts, and row decoding live in one place and
//! tests can substitute a scripted store.

pub mod client;
pub mod queries;
pub mod rows;

pub use client::{params, GraphConfig, GraphStore, Neo4jStore, Params, QueryResult, QuerySummary, StoreError};
