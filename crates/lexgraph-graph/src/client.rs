//! Neo4j connection management and the graph store seam.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lexgraph_core::config::Neo4jSettings;
use lexgraph_core::Row;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph};
use serde_json::Value;

/// Errors from graph operations. The driver's message is preserved verbatim.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(String),

    #[error("Neo4j query exceeded {millis}ms budget")]
    Timeout { millis: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<neo4rs::Error> for StoreError {
    fn from(e: neo4rs::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

/// Named query parameters.
pub type Params = BTreeMap<String, Value>;

/// Build a parameter map from literal pairs.
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Execution metadata returned alongside the rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySummary {
    pub row_count: usize,
    pub elapsed_ms: u64,
}

/// Ordered rows plus summary from one round trip.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub summary: QuerySummary,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let summary = QuerySummary {
            row_count: rows.len(),
            elapsed_ms: 0,
        };
        Self { rows, summary }
    }
}

/// A store that runs parameterized read queries and returns typed rows.
///
/// Implementations own schema, indexes, and persistence; callers only read.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn execute(&self, cypher: &str, params: &Params) -> Result<QueryResult, StoreError>;
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
    pub query_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&Neo4jSettings::default())
    }
}

impl From<&Neo4jSettings> for GraphConfig {
    fn from(s: &Neo4jSettings) -> Self {
        Self {
            uri: s.uri.clone(),
            user: s.user.clone(),
            password: s.password.clone(),
            max_connections: s.max_connections,
            fetch_size: s.fetch_size,
            query_timeout: Duration::from_millis(s.query_timeout_ms),
        }
    }
}

/// Thread-safe Neo4j store with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
    query_timeout: Duration,
}

impl Neo4jStore {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, StoreError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            query_timeout: config.query_timeout,
        })
    }

    async fn collect_rows(&self, cypher: &str, params: &Params) -> Result<Vec<Row>, StoreError> {
        let mut q = neo4rs::query(cypher);
        for (key, value) in params {
            q = q.param(key, to_bolt(value));
        }

        let mut stream = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            let decoded: Row = row
                .to()
                .map_err(|e| StoreError::Serialization(format!("Failed to decode row: {e}")))?;
            rows.push(decoded);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn execute(&self, cypher: &str, params: &Params) -> Result<QueryResult, StoreError> {
        let start = Instant::now();
        let rows = tokio::time::timeout(self.query_timeout, self.collect_rows(cypher, params))
            .await
            .map_err(|_| StoreError::Timeout {
                millis: self.query_timeout.as_millis() as u64,
            })??;

        let summary = QuerySummary {
            row_count: rows.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::debug!(rows = summary.row_count, elapsed_ms = summary.elapsed_ms, "Query executed");
        Ok(QueryResult { rows, summary })
    }
}

/// Convert a JSON parameter into its Bolt counterpart.
fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => BoltType::from(items.iter().map(to_bolt).collect::<Vec<_>>()),
        Value::Object(map) => BoltType::from(
            map.iter()
                .map(|(k, v)| (k.clone(), to_bolt(v)))
                .collect::<HashMap<String, BoltType>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_builder() {
        let p = params([("contract_id", Value::from(3)), ("name", Value::from("Acme"))]);
        assert_eq!(p.len(), 2);
        assert_eq!(p["contract_id"], Value::from(3));
    }

    #[test]
    fn test_graph_config_from_settings() {
        let settings = Neo4jSettings {
            query_timeout_ms: 1500,
            ..Default::default()
        };
        let config = GraphConfig::from(&settings);
        assert_eq!(config.query_timeout, Duration::from_millis(1500));
        assert_eq!(config.uri, "bolt://localhost:7687");
    }

    #[test]
    fn test_to_bolt_scalars() {
        assert!(matches!(to_bolt(&Value::Null), BoltType::Null(_)));
        assert!(matches!(to_bolt(&Value::from(5)), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&Value::from(0.5)), BoltType::Float(_)));
        assert!(matches!(to_bolt(&Value::from("x")), BoltType::String(_)));
        assert!(matches!(
            to_bolt(&serde_json::json!(["a", "b"])),
            BoltType::List(_)
        ));
    }
}
