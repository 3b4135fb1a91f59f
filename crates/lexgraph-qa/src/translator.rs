//! Natural-language to Cypher translation seam.

use async_trait::async_trait;
use lexgraph_core::Row;

use crate::cypher;
use crate::error::{QaError, Result};

/// Entity and relation manifest handed to the translator.
pub const SCHEMA_DESCRIPTION: &str = "Node properties:
Agreement {agreement_type: STRING, contract_id: INTEGER, effective_date: STRING, renewal_term: STRING, name: STRING}
ContractClause {type: STRING, text: STRING}
ClauseType {name: STRING}
Country {name: STRING}
Excerpt {text: STRING}
Organization {name: STRING}

Relationship properties:
IS_PARTY_TO {role: STRING}
GOVERNED_BY_LAW {state: STRING}
HAS_CLAUSE {type: STRING}
INCORPORATED_IN {state: STRING}

The relationships:
(:Agreement)-[:HAS_CLAUSE]->(:ContractClause)
(:ContractClause)-[:HAS_EXCERPT]->(:Excerpt)
(:ContractClause)-[:HAS_TYPE]->(:ClauseType)
(:Agreement)-[:GOVERNED_BY_LAW]->(:Country)
(:Organization)-[:IS_PARTY_TO]->(:Agreement)
(:Organization)-[:INCORPORATED_IN]->(:Country)

Performance notes:
- Always use LIMIT clauses (LIMIT 1000 for complex queries)
- Prefer aggregation functions (count, collect) over returning large node sets
- Use EXISTS {} for complex filtering instead of large joins
- Use WITH clauses to pipeline complex queries
- Use DISTINCT in collect to avoid duplicates
- Add ORDER BY before LIMIT for consistent results";

/// What a translator produced for a question.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslatorOutput {
    /// A candidate query for the engine to vet and run.
    Cypher(String),
    /// Rows the translator already fetched.
    Rows(Vec<Row>),
    /// A finished textual answer, returned verbatim.
    DirectText(String),
    Empty,
}

/// Turns a question into something the engine can answer from.
///
/// No correctness guarantee: the engine treats every output as a candidate.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, question: &str, schema: &str) -> Result<TranslatorOutput>;
}

const WRITE_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "LOAD", "FOREACH",
];

/// Reject a translator query that could modify the graph.
pub fn ensure_read_only(query: &str) -> Result<()> {
    let tokens = cypher::tokenize(query);
    if let Some(token) = tokens.iter().find(|t| WRITE_CLAUSES.contains(&t.word.as_str())) {
        return Err(QaError::TranslatorFailure(format!(
            "generated query contains write clause {}",
            token.word
        )));
    }
    if tokens.is_empty() {
        return Err(QaError::TranslatorFailure("generated query is empty".to_string()));
    }
    Ok(())
}

/// Pull a query out of model output that may be fenced or prefixed.
pub fn extract_query(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let body = match trimmed.find("```") {
        Some(open) => {
            let after = &trimmed[open + 3..];
            let after = after.strip_prefix("cypher").unwrap_or(after);
            match after.find("```") {
                Some(close) => &after[..close],
                None => after,
            }
        }
        None => trimmed.strip_prefix("Cypher:").unwrap_or(trimmed),
    };

    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}
