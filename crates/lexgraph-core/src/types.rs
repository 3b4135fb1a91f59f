//! Contract records read from the knowledge graph.
//!
//! The graph owns these entities; lexgraph only ever reads them. Every
//! field that ingestion may leave unset is an `Option`.

use serde::{Deserialize, Serialize};

/// One result row: column name to value, in projection order.
pub type Row = serde_json::Map<String, serde_json::Value>;

// ── Agreement ─────────────────────────────────────────────────────

/// A contract, the root entity for clauses and parties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Agreement {
    pub contract_id: i64,
    pub name: Option<String>,
    pub agreement_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_term: Option<String>,
    #[serde(default)]
    pub parties: Vec<Party>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clauses: Vec<ContractClause>,
}

impl Agreement {
    /// Display name, falling back to the contract id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Contract {}", self.contract_id))
    }
}

/// An organization bound to an agreement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Party {
    pub name: String,
    pub role: Option<String>,
    pub incorporation_country: Option<String>,
    pub incorporation_state: Option<String>,
}

/// A typed clause of an agreement with its supporting excerpts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractClause {
    #[serde(rename = "type")]
    pub clause_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excerpts: Vec<String>,
}

// ── Search & Analytics ───────────────────────────────────────────

/// An excerpt returned by similar-text search, with its agreement context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarExcerpt {
    pub agreement_name: Option<String>,
    pub contract_id: Option<i64>,
    pub clause_type: Option<String>,
    pub excerpt: String,
    pub score: f64,
}

/// Corpus-wide counts gathered without loading individual contracts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContractStatistics {
    pub total_contracts: i64,
    pub contract_types: Vec<String>,
    pub total_organizations: i64,
    pub total_clauses: i64,
    pub unique_clause_types: i64,
    pub total_countries: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_serializes_type_key() {
        let clause = ContractClause {
            clause_type: "Exclusivity".to_string(),
            excerpts: vec![],
        };
        let json = serde_json::to_value(&clause).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Exclusivity"}));
    }

    #[test]
    fn test_agreement_display_name_fallback() {
        let agreement = Agreement {
            contract_id: 7,
            ..Default::default()
        };
        assert_eq!(agreement.display_name(), "Contract 7");
    }
}
