//! Similar-text search over excerpt embeddings.

use std::sync::Arc;

use async_trait::async_trait;
use lexgraph_core::{Row, SimilarExcerpt};
use lexgraph_graph::rows::{get_f64, get_i64, get_str};
use lexgraph_graph::{params, GraphStore};
use serde_json::Value;

use crate::error::Result;

pub const EXCERPT_INDEX: &str = "excerpt_embedding";
pub const DEFAULT_TOP_K: usize = 3;

/// One nearest neighbour with its graph context.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredContent {
    pub content: Row,
    pub score: f64,
}

impl ScoredContent {
    pub fn to_similar_excerpt(&self) -> Option<SimilarExcerpt> {
        Some(SimilarExcerpt {
            agreement_name: get_str(&self.content, "agreement_name"),
            contract_id: get_i64(&self.content, "contract_id"),
            clause_type: get_str(&self.content, "clause_type"),
            excerpt: get_str(&self.content, "excerpt")?,
            score: self.score,
        })
    }
}

/// Returns the stored items nearest to a text query.
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<ScoredContent>>;
}

/// Maps text to an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Vector index lookup followed by a traversal to the owning agreement.
pub struct GraphVectorRetriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
}

impl GraphVectorRetriever {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl VectorRetriever for GraphVectorRetriever {
    async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<ScoredContent>> {
        let embedding = self.embedder.embed(query_text).await?;

        let cypher = "
            CALL db.index.vector.queryNodes($index_name, $top_k, $embedding)
            YIELD node, score
            MATCH (a:Agreement)-[:HAS_CLAUSE]->(cc:ContractClause)-[:HAS_EXCERPT]->(node)
            RETURN a.name AS agreement_name,
                   a.contract_id AS contract_id,
                   cc.type AS clause_type,
                   node.text AS excerpt,
                   score
            ORDER BY score DESC";

        let p = params([
            ("index_name", Value::from(EXCERPT_INDEX)),
            ("top_k", Value::from(top_k)),
            ("embedding", Value::from(embedding)),
        ]);
        let result = self.store.execute(cypher, &p).await?;

        tracing::debug!(top_k, hits = result.rows.len(), "Vector search completed");
        Ok(result
            .rows
            .into_iter()
            .map(|content| {
                let score = get_f64(&content, "score").unwrap_or(0.0);
                ScoredContent { content, score }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexgraph_graph::{Params, QueryResult, StoreError};
    use parking_lot::Mutex;
    use serde_json::json;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5, 0.25])
        }
    }

    struct RecordingStore {
        seen: Mutex<Vec<Params>>,
    }

    #[async_trait]
    impl GraphStore for RecordingStore {
        async fn execute(&self, _cypher: &str, params: &Params) -> std::result::Result<QueryResult, StoreError> {
            self.seen.lock().push(params.clone());
            let row = json!({
                "agreement_name": "Master Franchise Agreement",
                "contract_id": 3,
                "clause_type": "Exclusivity",
                "excerpt": "exclusive right to develop",
                "score": 0.91
            });
            Ok(QueryResult::from_rows(vec![row.as_object().cloned().unwrap()]))
        }
    }

    #[tokio::test]
    async fn test_search_binds_embedding_and_decodes_hits() {
        let store = Arc::new(RecordingStore {
            seen: Mutex::new(Vec::new()),
        });
        let retriever = GraphVectorRetriever::new(store.clone(), Arc::new(FixedEmbedder));

        let hits = retriever.search("exclusive territory", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 0.91).abs() < 1e-9);

        let excerpt = hits[0].to_similar_excerpt().unwrap();
        assert_eq!(excerpt.contract_id, Some(3));
        assert_eq!(excerpt.clause_type.as_deref(), Some("Exclusivity"));

        let seen = store.seen.lock();
        assert_eq!(seen[0]["index_name"], json!("excerpt_embedding"));
        assert_eq!(seen[0]["top_k"], json!(3));
        assert_eq!(seen[0]["embedding"], json!([0.5, 0.25]));
    }
}
