//! Read operations behind the contract command surface.

use lexgraph_core::{Agreement, ContractClause, ContractStatistics, Row};
use serde_json::Value;

use crate::client::{params, GraphStore, Params, StoreError};
use crate::rows::{get_i64, get_parties, get_str, get_str_list};

/// Lightweight agreement listing entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct AgreementSummary {
    pub contract_id: i64,
    pub name: String,
    pub parties: Vec<String>,
}

/// An organization ranked by the number of agreements it is party to.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct OrganizationActivity {
    pub organization: String,
    pub contract_count: i64,
    pub contract_types: Vec<String>,
}

/// Two clause types that appear together in the same agreements.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct ClausePair {
    pub clause_type_1: String,
    pub clause_type_2: String,
    pub co_occurrence_count: i64,
}

/// Shared tail: project an agreement in short form with its parties.
const SHORT_FORM_TAIL: &str = "
    OPTIONAL MATCH (p:Organization)-[r:IS_PARTY_TO]->(a)
    OPTIONAL MATCH (p)-[i:INCORPORATED_IN]->(country:Country)
    RETURN a.contract_id AS contract_id,
           a.name AS name,
           a.agreement_type AS agreement_type,
           collect(DISTINCT {name: p.name, role: r.role, country: country.name, state: i.state}) AS parties
    ORDER BY contract_id";

// ── Single Contract Lookups ──────────────────────────────────────

/// Get a contract in long form: dates, parties, and clause types.
pub async fn get_contract(
    store: &dyn GraphStore,
    contract_id: i64,
) -> Result<Option<Agreement>, StoreError> {
    let cypher = "
        MATCH (a:Agreement {contract_id: $contract_id})
        OPTIONAL MATCH (a)-[:HAS_CLAUSE]->(clause:ContractClause)
        WITH a, collect(DISTINCT clause.type) AS clause_types
        OPTIONAL MATCH (p:Organization)-[r:IS_PARTY_TO]->(a)
        OPTIONAL MATCH (p)-[i:INCORPORATED_IN]->(country:Country)
        RETURN a.contract_id AS contract_id,
               a.name AS name,
               a.agreement_type AS agreement_type,
               a.agreement_date AS agreement_date,
               a.effective_date AS effective_date,
               a.expiration_date AS expiration_date,
               a.renewal_term AS renewal_term,
               clause_types,
               collect(DISTINCT {name: p.name, role: r.role, country: country.name, state: i.state}) AS parties";

    let result = store
        .execute(cypher, &params([("contract_id", Value::from(contract_id))]))
        .await?;

    Ok(result.rows.first().map(|row| {
        let mut agreement = long_form(row, contract_id);
        agreement.clauses = get_str_list(row, "clause_types")
            .into_iter()
            .map(|clause_type| ContractClause {
                clause_type,
                excerpts: Vec::new(),
            })
            .collect();
        agreement
    }))
}

/// Get a contract's excerpts grouped by clause type.
pub async fn get_contract_excerpts(
    store: &dyn GraphStore,
    contract_id: i64,
) -> Result<Option<Agreement>, StoreError> {
    let cypher = "
        MATCH (a:Agreement {contract_id: $contract_id})-[:HAS_CLAUSE]->(cc:ContractClause)-[:HAS_EXCERPT]->(e:Excerpt)
        RETURN a.contract_id AS contract_id,
               a.name AS name,
               a.agreement_type AS agreement_type,
               a.agreement_date AS agreement_date,
               a.effective_date AS effective_date,
               a.expiration_date AS expiration_date,
               a.renewal_term AS renewal_term,
               cc.type AS clause_type,
               collect(e.text) AS excerpts
        ORDER BY clause_type";

    let result = store
        .execute(cypher, &params([("contract_id", Value::from(contract_id))]))
        .await?;

    let Some(first) = result.rows.first() else {
        return Ok(None);
    };

    let mut agreement = long_form(first, contract_id);
    agreement.clauses = result
        .rows
        .iter()
        .filter_map(|row| {
            Some(ContractClause {
                clause_type: get_str(row, "clause_type")?,
                excerpts: get_str_list(row, "excerpts"),
            })
        })
        .collect();
    Ok(Some(agreement))
}

// ── List Queries ─────────────────────────────────────────────────

/// Get contracts of the organization best matching `organization_name`
/// in the organization full-text index.
pub async fn get_contracts_by_party(
    store: &dyn GraphStore,
    organization_name: &str,
) -> Result<Vec<Agreement>, StoreError> {
    let cypher = format!(
        "CALL db.index.fulltext.queryNodes('organizationNameTextIndex', $organization_name)
         YIELD node AS o, score
         WITH o, score
         ORDER BY score DESC
         LIMIT 1
         WITH o
         MATCH (o)-[:IS_PARTY_TO]->(a:Agreement)
         WITH DISTINCT a
         {SHORT_FORM_TAIL}"
    );

    let p = params([("organization_name", Value::from(organization_name))]);
    list_short_form(store, &cypher, &p).await
}

/// Get contracts that contain a clause of the given type.
pub async fn get_contracts_with_clause_type(
    store: &dyn GraphStore,
    clause_type: &str,
) -> Result<Vec<Agreement>, StoreError> {
    let cypher = format!(
        "MATCH (a:Agreement)-[:HAS_CLAUSE]->(:ContractClause {{type: $clause_type}})
         WITH DISTINCT a
         {SHORT_FORM_TAIL}"
    );

    let p = params([("clause_type", Value::from(clause_type))]);
    list_short_form(store, &cypher, &p).await
}

/// Get contracts that contain no clause of the given type.
pub async fn get_contracts_without_clause_type(
    store: &dyn GraphStore,
    clause_type: &str,
) -> Result<Vec<Agreement>, StoreError> {
    let cypher = format!(
        "MATCH (a:Agreement)
         WHERE NOT EXISTS {{ MATCH (a)-[:HAS_CLAUSE]->(:ContractClause {{type: $clause_type}}) }}
         WITH a
         {SHORT_FORM_TAIL}"
    );

    let p = params([("clause_type", Value::from(clause_type))]);
    list_short_form(store, &cypher, &p).await
}

/// List agreements by id with the names of their parties.
pub async fn list_agreements(
    store: &dyn GraphStore,
    limit: u32,
) -> Result<Vec<AgreementSummary>, StoreError> {
    let cypher = "
        MATCH (a:Agreement)
        OPTIONAL MATCH (o:Organization)-[:IS_PARTY_TO]->(a)
        RETURN a.contract_id AS contract_id,
               a.name AS name,
               collect(DISTINCT o.name) AS parties
        ORDER BY contract_id
        LIMIT $limit";

    let result = store
        .execute(cypher, &params([("limit", Value::from(limit))]))
        .await?;

    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(AgreementSummary {
                contract_id: get_i64(row, "contract_id")?,
                name: get_str(row, "name")?,
                parties: get_str_list(row, "parties"),
            })
        })
        .collect())
}

// ── Analytics ────────────────────────────────────────────────────

/// Corpus-wide counts without loading any contract.
pub async fn contract_statistics(store: &dyn GraphStore) -> Result<ContractStatistics, StoreError> {
    let cypher = "
        OPTIONAL MATCH (a:Agreement)
        WITH count(a) AS total_contracts,
             collect(DISTINCT a.agreement_type) AS contract_types
        OPTIONAL MATCH (o:Organization)
        WITH total_contracts, contract_types, count(o) AS total_organizations
        OPTIONAL MATCH (cl:ContractClause)
        OPTIONAL MATCH (cl)-[:HAS_TYPE]->(ct:ClauseType)
        WITH total_contracts, contract_types, total_organizations,
             count(DISTINCT cl) AS total_clauses,
             count(DISTINCT ct.name) AS unique_clause_types
        OPTIONAL MATCH (c:Country)
        RETURN total_contracts, contract_types, total_organizations,
               total_clauses, unique_clause_types, count(c) AS total_countries";

    let result = store.execute(cypher, &Params::new()).await?;
    Ok(result
        .rows
        .first()
        .map(|row| ContractStatistics {
            total_contracts: get_i64(row, "total_contracts").unwrap_or(0),
            contract_types: get_str_list(row, "contract_types"),
            total_organizations: get_i64(row, "total_organizations").unwrap_or(0),
            total_clauses: get_i64(row, "total_clauses").unwrap_or(0),
            unique_clause_types: get_i64(row, "unique_clause_types").unwrap_or(0),
            total_countries: get_i64(row, "total_countries").unwrap_or(0),
        })
        .unwrap_or_default())
}

/// Organizations with the most agreements.
pub async fn top_organizations(
    store: &dyn GraphStore,
    limit: u32,
) -> Result<Vec<OrganizationActivity>, StoreError> {
    let cypher = "
        MATCH (o:Organization)-[:IS_PARTY_TO]->(a:Agreement)
        WITH o.name AS organization,
             count(DISTINCT a) AS contract_count,
             collect(DISTINCT a.agreement_type) AS contract_types
        ORDER BY contract_count DESC, organization
        LIMIT $limit
        RETURN organization, contract_count, contract_types";

    let result = store
        .execute(cypher, &params([("limit", Value::from(limit))]))
        .await?;

    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(OrganizationActivity {
                organization: get_str(row, "organization")?,
                contract_count: get_i64(row, "contract_count").unwrap_or(0),
                contract_types: get_str_list(row, "contract_types"),
            })
        })
        .collect())
}

/// Clause types that appear together in at least `min_frequency` agreements.
pub async fn clause_co_occurrence(
    store: &dyn GraphStore,
    min_frequency: u32,
) -> Result<Vec<ClausePair>, StoreError> {
    let cypher = "
        MATCH (a:Agreement)-[:HAS_CLAUSE]->(:ContractClause)-[:HAS_TYPE]->(ct:ClauseType)
        WITH a, collect(DISTINCT ct.name) AS clause_types
        WHERE size(clause_types) >= 2
        UNWIND clause_types AS ct1
        UNWIND clause_types AS ct2
        WITH ct1, ct2
        WHERE ct1 < ct2
        WITH ct1, ct2, count(*) AS co_occurrence_count
        WHERE co_occurrence_count >= $min_frequency
        RETURN ct1 AS clause_type_1, ct2 AS clause_type_2, co_occurrence_count
        ORDER BY co_occurrence_count DESC";

    let result = store
        .execute(cypher, &params([("min_frequency", Value::from(min_frequency))]))
        .await?;

    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(ClausePair {
                clause_type_1: get_str(row, "clause_type_1")?,
                clause_type_2: get_str(row, "clause_type_2")?,
                co_occurrence_count: get_i64(row, "co_occurrence_count").unwrap_or(0),
            })
        })
        .collect())
}

/// Connectivity check: total node count.
pub async fn count_nodes(store: &dyn GraphStore) -> Result<i64, StoreError> {
    let result = store
        .execute("MATCH (n) RETURN count(n) AS total_nodes", &Params::new())
        .await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| get_i64(row, "total_nodes"))
        .unwrap_or(0))
}

/// Number of indexes in the ONLINE state.
pub async fn count_online_indexes(store: &dyn GraphStore) -> Result<i64, StoreError> {
    let result = store
        .execute(
            "SHOW INDEXES YIELD state WHERE state = 'ONLINE' RETURN count(*) AS active_indexes",
            &Params::new(),
        )
        .await?;
    Ok(result
        .rows
        .first()
        .and_then(|row| get_i64(row, "active_indexes"))
        .unwrap_or(0))
}

// ── Row Decoding ─────────────────────────────────────────────────

async fn list_short_form(
    store: &dyn GraphStore,
    cypher: &str,
    params: &Params,
) -> Result<Vec<Agreement>, StoreError> {
    let result = store.execute(cypher, params).await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            Some(Agreement {
                contract_id: get_i64(row, "contract_id")?,
                name: get_str(row, "name"),
                agreement_type: get_str(row, "agreement_type"),
                parties: get_parties(row, "parties"),
                ..Default::default()
            })
        })
        .collect())
}

fn long_form(row: &Row, contract_id: i64) -> Agreement {
    Agreement {
        contract_id: get_i64(row, "contract_id").unwrap_or(contract_id),
        name: get_str(row, "name"),
        agreement_type: get_str(row, "agreement_type"),
        agreement_date: get_str(row, "agreement_date"),
        effective_date: get_str(row, "effective_date"),
        expiration_date: get_str(row, "expiration_date"),
        renewal_term: get_str(row, "renewal_term"),
        parties: get_parties(row, "parties"),
        clauses: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QueryResult;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Returns canned rows and records every query it receives.
    struct CannedStore {
        rows: Vec<Row>,
        seen: Mutex<Vec<(String, Params)>>,
    }

    impl CannedStore {
        fn new(rows: Vec<Value>) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GraphStore for CannedStore {
        async fn execute(&self, cypher: &str, params: &Params) -> Result<QueryResult, StoreError> {
            self.seen.lock().push((cypher.to_string(), params.clone()));
            Ok(QueryResult::from_rows(self.rows.clone()))
        }
    }

    #[tokio::test]
    async fn test_get_contract_long_form() {
        let store = CannedStore::new(vec![json!({
            "contract_id": 3,
            "name": "Master Franchise Agreement",
            "agreement_type": "Franchise",
            "effective_date": "2019-01-01",
            "clause_types": ["Exclusivity", "Non-Compete"],
            "parties": [{"name": "Smaaash Entertainment", "role": "Franchisor", "country": "India", "state": null}]
        })]);

        let agreement = get_contract(&store, 3).await.unwrap().unwrap();
        assert_eq!(agreement.name.as_deref(), Some("Master Franchise Agreement"));
        assert_eq!(agreement.effective_date.as_deref(), Some("2019-01-01"));
        assert_eq!(agreement.clauses.len(), 2);
        assert_eq!(agreement.parties[0].role.as_deref(), Some("Franchisor"));

        let seen = store.seen.lock();
        assert_eq!(seen[0].1["contract_id"], json!(3));
    }

    #[tokio::test]
    async fn test_get_contract_missing() {
        let store = CannedStore::new(vec![]);
        assert!(get_contract(&store, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_excerpts_grouped_by_clause() {
        let store = CannedStore::new(vec![
            json!({"contract_id": 1, "name": "Stock Purchase Agreement", "clause_type": "Governing Law", "excerpts": ["laws of Delaware"]}),
            json!({"contract_id": 1, "name": "Stock Purchase Agreement", "clause_type": "Payment Terms", "excerpts": ["net 30", "wire transfer"]}),
        ]);

        let agreement = get_contract_excerpts(&store, 1).await.unwrap().unwrap();
        assert_eq!(agreement.clauses.len(), 2);
        assert_eq!(agreement.clauses[1].excerpts.len(), 2);
    }

    #[tokio::test]
    async fn test_party_search_binds_name_parameter() {
        let store = CannedStore::new(vec![json!({
            "contract_id": 10,
            "name": "Acme Supply Deal",
            "agreement_type": "Supply",
            "parties": [{"name": "Acme Corp", "role": "Buyer", "country": null, "state": null}]
        })]);

        let agreements = get_contracts_by_party(&store, "Acme").await.unwrap();
        assert_eq!(agreements.len(), 1);
        assert_eq!(agreements[0].parties[0].name, "Acme Corp");

        let seen = store.seen.lock();
        assert!(seen[0].0.contains("organizationNameTextIndex"));
        assert!(!seen[0].0.contains("Acme"));
        assert_eq!(seen[0].1["organization_name"], json!("Acme"));
    }

    #[tokio::test]
    async fn test_without_clause_uses_exists_subquery() {
        let store = CannedStore::new(vec![]);
        let _ = get_contracts_without_clause_type(&store, "Non-Compete").await.unwrap();
        let seen = store.seen.lock();
        assert!(seen[0].0.contains("NOT EXISTS {"));
        assert_eq!(seen[0].1["clause_type"], json!("Non-Compete"));
    }

    #[tokio::test]
    async fn test_statistics_default_when_empty() {
        let store = CannedStore::new(vec![]);
        let stats = contract_statistics(&store).await.unwrap();
        assert_eq!(stats, ContractStatistics::default());
    }

    #[tokio::test]
    async fn test_list_agreements_skips_unnamed() {
        let store = CannedStore::new(vec![
            json!({"contract_id": 1, "name": "Stock Purchase Agreement", "parties": ["Birch First Global Investments Inc."]}),
            json!({"contract_id": 2, "name": null, "parties": []}),
        ]);
        let listing = list_agreements(&store, 10).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].contract_id, 1);
    }

    #[tokio::test]
    async fn test_online_index_count() {
        let store = CannedStore::new(vec![json!({"active_indexes": 4})]);
        assert_eq!(count_online_indexes(&store).await.unwrap(), 4);
        assert!(store.seen.lock()[0].0.starts_with("SHOW INDEXES"));
    }
}
