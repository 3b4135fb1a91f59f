//! Query templates behind each routed intent.
//!
//! A handler is split in two pure halves around the store round trip:
//! [`plan`] turns features into a parameterized query, [`finish`] turns the
//! rows into an outcome. Question text only ever reaches the store as bound
//! parameters.

use std::collections::BTreeSet;

use lexgraph_core::Row;
use lexgraph_graph::rows::get_str;
use lexgraph_graph::{params, Params};
use serde_json::Value;

use crate::router::{phrase, Intent, QuestionFeatures, STATE_NAMES};

/// Result of running a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// The question did not fit this handler; try the next strategy.
    NotMatched,
    /// The handler understood the question but the store has nothing.
    NoData(String),
    Rows { intent: Intent, rows: Vec<Row> },
}

/// A query ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerQuery {
    pub intent: Intent,
    pub cypher: &'static str,
    pub params: Params,
}

/// A clause family recognized in questions.
struct ClauseTerm {
    words: &'static [&'static str],
    /// Lower-case fragment matched against clause types.
    fragment: &'static str,
    label: &'static str,
}

const CLAUSE_TERMS: &[ClauseTerm] = &[
    ClauseTerm {
        words: &["license", "licenses", "licensing"],
        fragment: "license",
        label: "License",
    },
    ClauseTerm {
        words: &["assignment", "assignments"],
        fragment: "assignment",
        label: "Assignment",
    },
    ClauseTerm {
        words: &["liability"],
        fragment: "liability",
        label: "Liability",
    },
    ClauseTerm {
        words: &["termination"],
        fragment: "termination",
        label: "Termination",
    },
    ClauseTerm {
        words: &["competitive", "competition"],
        fragment: "compet",
        label: "Compet",
    },
];

/// Name words too common to identify an organization on their own.
const GENERIC_NAME_WORDS: &[&str] = &[
    "co",
    "company",
    "corp",
    "corporation",
    "group",
    "holdings",
    "inc",
    "incorporated",
    "limited",
    "llc",
    "lp",
    "ltd",
    "plc",
];

// ── Templates ────────────────────────────────────────────────────

const INCORPORATION_WITH_CLAUSES: &str = "
    MATCH (o:Organization)-[inc:INCORPORATED_IN]->(c:Country)
    MATCH (o)-[:IS_PARTY_TO]->(a:Agreement)
    MATCH (a)-[:HAS_CLAUSE]->(cl:ContractClause)
    WHERE (size($states) = 0 OR inc.state IN $states)
      AND (size($clause_terms) = 0 OR ANY(term IN $clause_terms WHERE toLower(cl.type) CONTAINS term))
    WITH o, c, inc, a, collect(DISTINCT cl.type) AS clause_types
    WHERE size(clause_types) >= 1
    RETURN o.name AS organization,
           c.name AS incorporation_country,
           inc.state AS incorporation_state,
           a.name AS agreement,
           clause_types
    ORDER BY organization
    LIMIT 50";

const MULTIPLE_CLAUSES: &str = "
    MATCH (a:Agreement)-[:HAS_CLAUSE]->(cl:ContractClause)
    WHERE ANY(term IN $clause_terms WHERE toLower(cl.type) CONTAINS term)
    WITH a, collect(DISTINCT cl.type) AS found_clause_types
    WHERE size(found_clause_types) >= 2
    MATCH (o:Organization)-[:IS_PARTY_TO]->(a)
    OPTIONAL MATCH (o)-[inc:INCORPORATED_IN]->(c:Country)
    RETURN a.name AS agreement,
           found_clause_types,
           collect(DISTINCT {name: o.name, country: c.name, state: inc.state}) AS parties
    ORDER BY size(found_clause_types) DESC
    LIMIT 20";

const INCORPORATION: &str = "
    MATCH (o:Organization)-[inc:INCORPORATED_IN]->(country:Country)
    WHERE size($organizations) = 0 OR o.name IN $organizations
    OPTIONAL MATCH (o)-[:IS_PARTY_TO]->(a:Agreement)
    RETURN o.name AS organization,
           country.name AS incorporation_country,
           inc.state AS incorporation_state,
           collect(DISTINCT a.name) AS agreements,
           count(DISTINCT a) AS agreement_count
    ORDER BY organization
    LIMIT 100";

const CLAUSES: &str = "
    MATCH (a:Agreement)-[:HAS_CLAUSE]->(cl:ContractClause)
    WHERE size($clause_terms) = 0 OR ANY(term IN $clause_terms WHERE toLower(cl.type) CONTAINS term)
    RETURN cl.type AS clause_type,
           count(DISTINCT cl) AS clause_count,
           count(DISTINCT a) AS agreement_count,
           collect(DISTINCT a.name) AS agreements
    ORDER BY clause_count DESC
    LIMIT 50";

const ORGANIZATIONS: &str = "
    MATCH (o:Organization)-[ipt:IS_PARTY_TO]->(a:Agreement)
    OPTIONAL MATCH (o)-[inc:INCORPORATED_IN]->(country:Country)
    WITH o,
         collect(DISTINCT ipt.role) AS roles,
         collect(DISTINCT a.name) AS agreements,
         country.name AS inc_country,
         inc.state AS inc_state,
         count(DISTINCT a) AS agreement_count
    RETURN o.name AS organization, roles, agreement_count, agreements, inc_country, inc_state
    ORDER BY agreement_count DESC, organization
    LIMIT 50";

const AGREEMENTS: &str = "
    MATCH (a:Agreement)
    OPTIONAL MATCH (o:Organization)-[ipt:IS_PARTY_TO]->(a)
    OPTIONAL MATCH (a)-[gbl:GOVERNED_BY_LAW]->(country:Country)
    OPTIONAL MATCH (a)-[:HAS_CLAUSE]->(cl:ContractClause)
    RETURN a.name AS agreement_name,
           a.contract_id AS contract_id,
           a.agreement_type AS agreement_type,
           a.effective_date AS effective_date,
           collect(DISTINCT {name: o.name, role: ipt.role}) AS parties,
           country.name AS governing_country,
           gbl.state AS governing_state,
           count(DISTINCT cl.type) AS clause_complexity,
           collect(DISTINCT cl.type) AS clause_types
    ORDER BY clause_complexity DESC, agreement_name
    LIMIT 50";

const JURISDICTIONS: &str = "
    MATCH (a:Agreement)-[gbl:GOVERNED_BY_LAW]->(country:Country)
    OPTIONAL MATCH (o:Organization)-[:IS_PARTY_TO]->(a)
    OPTIONAL MATCH (o)-[inc:INCORPORATED_IN]->(inc_country:Country)
    WITH country.name AS governing_country,
         gbl.state AS governing_state,
         collect(DISTINCT a.name) AS agreements,
         collect(DISTINCT {party: o.name, inc_country: inc_country.name, inc_state: inc.state}) AS parties
    RETURN governing_country,
           governing_state,
           size(agreements) AS agreement_count,
           agreements,
           parties
    ORDER BY agreement_count DESC
    LIMIT 20";

const EXCERPTS: &str = "
    MATCH (a:Agreement)-[:HAS_CLAUSE]->(cl:ContractClause)-[:HAS_EXCERPT]->(e:Excerpt)
    OPTIONAL MATCH (o:Organization)-[:IS_PARTY_TO]->(a)
    RETURN a.name AS agreement_name,
           a.contract_id AS contract_id,
           cl.type AS clause_type,
           e.text AS excerpt_text,
           collect(DISTINCT o.name) AS parties
    ORDER BY agreement_name, clause_type
    LIMIT 50";

/// Every organization name, for resolving the ones a question mentions.
pub const ORGANIZATION_NAMES: &str = "
    MATCH (o:Organization)
    RETURN DISTINCT o.name AS organization_name
    ORDER BY organization_name
    LIMIT 5000";

// ── Plan / Finish ────────────────────────────────────────────────

/// Build the query for `intent`. `None` means the handler does not apply.
///
/// `organizations` restricts the incorporation handler to the named parties;
/// empty means every party.
pub fn plan(intent: Intent, features: &QuestionFeatures, organizations: &[String]) -> Option<HandlerQuery> {
    let terms = clause_terms(features);
    let fragments = || Value::from(terms.iter().map(|t| t.fragment).collect::<Vec<_>>());

    let (cypher, params) = match intent {
        Intent::IncorporationWithClauses => (
            INCORPORATION_WITH_CLAUSES,
            params([("states", Value::from(states(features))), ("clause_terms", fragments())]),
        ),
        Intent::MultipleClauses => {
            if terms.len() < 2 {
                return None;
            }
            (MULTIPLE_CLAUSES, params([("clause_terms", fragments())]))
        }
        Intent::Incorporation => (
            INCORPORATION,
            params([("organizations", Value::from(organizations.to_vec()))]),
        ),
        Intent::Clause => (CLAUSES, params([("clause_terms", fragments())])),
        Intent::Organization => (ORGANIZATIONS, Params::new()),
        Intent::Agreement => (AGREEMENTS, Params::new()),
        Intent::Jurisdiction => (JURISDICTIONS, Params::new()),
        Intent::Excerpt => (EXCERPTS, Params::new()),
        _ => return None,
    };

    Some(HandlerQuery {
        intent,
        cypher,
        params,
    })
}

/// Turn the rows of `query` into its outcome.
pub fn finish(query: &HandlerQuery, features: &QuestionFeatures, rows: Vec<Row>) -> HandlerOutcome {
    let intent = query.intent;
    let rows = match intent {
        Intent::IncorporationWithClauses if wants_license_and_assignment(features) => rows
            .into_iter()
            .filter(|row| has_clause_like(row, "license") && has_clause_like(row, "assignment"))
            .collect(),
        Intent::Incorporation => {
            let wanted = bound_organizations(&query.params);
            if wanted.is_empty() {
                rows
            } else {
                rows.into_iter()
                    .filter(|row| get_str(row, "organization").is_some_and(|o| wanted.contains(&phrase(&o))))
                    .collect()
            }
        }
        _ => rows,
    };

    if rows.is_empty() {
        return HandlerOutcome::NoData(no_data_message(intent, features));
    }
    HandlerOutcome::Rows { intent, rows }
}

/// Deterministic message for an understood question with no data behind it.
pub fn no_data_message(intent: Intent, features: &QuestionFeatures) -> String {
    let lead = match intent {
        Intent::IncorporationWithClauses => {
            "No organizations found matching the specified incorporation and clause criteria."
                .to_string()
        }
        Intent::MultipleClauses => {
            let labels: Vec<&str> = clause_terms(features).iter().map(|t| t.label).collect();
            format!(
                "No agreements found containing multiple clause types from: {}.",
                labels.join(", ")
            )
        }
        Intent::Incorporation => "No incorporation information found.".to_string(),
        Intent::Clause => "No clause information found matching your query.".to_string(),
        Intent::Organization => "No organization information found.".to_string(),
        Intent::Agreement => "No agreement information found.".to_string(),
        Intent::Jurisdiction => "No jurisdiction information found.".to_string(),
        Intent::Excerpt => "No excerpt information found.".to_string(),
        _ => "No results found.".to_string(),
    };

    format!(
        "{lead}\n\nNo data found for your question: \"{}\"\n\n\
         The requested information is not in the current dataset. \
         Try rephrasing your question or using broader search terms.",
        features.question()
    )
}

/// Organizations the question names.
///
/// Capitalized names in the question are matched against `known` rows of
/// [`ORGANIZATION_NAMES`] by full name or by a distinctive name word, so
/// "Globex" finds "Globex Inc". Names with no match in the store are
/// returned as written; a filter on them finds nothing.
pub fn mentioned_organizations(features: &QuestionFeatures, known: &[Row]) -> Vec<String> {
    let candidates = features.proper_names();
    if candidates.is_empty() {
        return Vec::new();
    }

    let candidate_words: BTreeSet<String> = candidates
        .iter()
        .flat_map(|c| phrase(c).split(' ').map(str::to_string).collect::<Vec<_>>())
        .filter(|w| !GENERIC_NAME_WORDS.contains(&w.as_str()))
        .collect();

    let matched: Vec<String> = known
        .iter()
        .filter_map(|row| get_str(row, "organization_name"))
        .filter(|name| {
            let name_phrase = phrase(name);
            !name_phrase.is_empty()
                && (features.has(&name_phrase)
                    || name_phrase.split(' ').any(|w| candidate_words.contains(w)))
        })
        .collect();

    if matched.is_empty() {
        candidates
    } else {
        matched
    }
}

fn bound_organizations(params: &Params) -> Vec<String> {
    match params.get("organizations") {
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).map(phrase).collect(),
        _ => Vec::new(),
    }
}

fn clause_terms(features: &QuestionFeatures) -> Vec<&'static ClauseTerm> {
    CLAUSE_TERMS
        .iter()
        .filter(|t| features.has_any(t.words))
        .collect()
}

/// Title-cased state names mentioned in the question.
fn states(features: &QuestionFeatures) -> Vec<String> {
    STATE_NAMES
        .iter()
        .filter(|s| features.has(s))
        .map(|s| title_case(s))
        .collect()
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn wants_license_and_assignment(features: &QuestionFeatures) -> bool {
    features.has("both") && features.has_any(CLAUSE_TERMS[0].words) && features.has_any(CLAUSE_TERMS[1].words)
}

fn has_clause_like(row: &Row, fragment: &str) -> bool {
    match row.get("clause_types") {
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.to_lowercase().contains(fragment)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features(q: &str) -> QuestionFeatures {
        QuestionFeatures::new(q)
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_incorporation_with_clauses_binds_parameters() {
        let f = features("Which organizations incorporated in New York or Delaware have license clauses?");
        let q = plan(Intent::IncorporationWithClauses, &f, &[]).unwrap();
        assert_eq!(q.params["states"], json!(["Delaware", "New York"]));
        assert_eq!(q.params["clause_terms"], json!(["license"]));
        assert!(!q.cypher.contains("Delaware"));
    }

    #[test]
    fn test_multiple_clauses_needs_two_terms() {
        assert!(plan(Intent::MultipleClauses, &features("clauses on license and payment"), &[]).is_none());

        let f = features("contracts with both termination and non-competition clauses");
        let q = plan(Intent::MultipleClauses, &f, &[]).unwrap();
        assert_eq!(q.params["clause_terms"], json!(["termination", "compet"]));
    }

    #[test]
    fn test_both_license_and_assignment_post_filter() {
        let f = features("Delaware incorporated parties with both license and assignment clauses");
        let rows = vec![
            row(json!({"organization": "A", "clause_types": ["License Grant", "Anti-Assignment"]})),
            row(json!({"organization": "B", "clause_types": ["License Grant"]})),
        ];
        let q = plan(Intent::IncorporationWithClauses, &f, &[]).unwrap();
        match finish(&q, &f, rows) {
            HandlerOutcome::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["organization"], json!("A"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_empty_rows_give_deterministic_no_data() {
        let f = features("Where is the organization Globex incorporated?");
        let q = plan(Intent::Incorporation, &f, &[]).unwrap();
        let first = finish(&q, &f, vec![]);
        let second = finish(&q, &f, vec![]);
        assert_eq!(first, second);
        match first {
            HandlerOutcome::NoData(message) => {
                assert!(message.starts_with("No incorporation information found."));
                assert!(message.contains("Where is the organization Globex incorporated?"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_every_routed_intent_has_a_template() {
        let f = features("license and assignment");
        for intent in [
            Intent::IncorporationWithClauses,
            Intent::MultipleClauses,
            Intent::Incorporation,
            Intent::Clause,
            Intent::Organization,
            Intent::Agreement,
            Intent::Jurisdiction,
            Intent::Excerpt,
        ] {
            let q = plan(intent, &f, &[]).unwrap();
            assert_eq!(q.intent, intent);
            assert!(q.cypher.contains("LIMIT"));
        }
        assert!(plan(Intent::DatabaseOverview, &f, &[]).is_none());
    }

    fn names(values: &[&str]) -> Vec<Row> {
        values
            .iter()
            .map(|n| row(json!({ "organization_name": n })))
            .collect()
    }

    #[test]
    fn test_mentioned_organizations_resolve_against_store_names() {
        let known = names(&["Acme Corp", "Globex Inc", "Globe Holdings"]);

        let f = features("In which state is the organization Globex incorporated?");
        assert_eq!(mentioned_organizations(&f, &known), vec!["Globex Inc"]);

        let f = features("Where is Acme Corp incorporated?");
        assert_eq!(mentioned_organizations(&f, &known), vec!["Acme Corp"]);

        let f = features("Where is the party Initech incorporated?");
        assert_eq!(mentioned_organizations(&f, &known), vec!["Initech"]);

        let f = features("Which parties are incorporated in Delaware?");
        assert!(mentioned_organizations(&f, &known).is_empty());
    }

    #[test]
    fn test_incorporation_binds_named_organizations() {
        let f = features("In which state is the organization Globex incorporated?");
        let q = plan(Intent::Incorporation, &f, &["Globex Inc".to_string()]).unwrap();
        assert_eq!(q.params["organizations"], json!(["Globex Inc"]));
        assert!(!q.cypher.contains("Globex"));

        let unfiltered = plan(Intent::Incorporation, &f, &[]).unwrap();
        assert_eq!(unfiltered.params["organizations"], json!([]));
    }

    #[test]
    fn test_incorporation_of_other_organizations_is_no_data() {
        let f = features("In which state is the organization Globex incorporated?");
        let q = plan(Intent::Incorporation, &f, &["Globex".to_string()]).unwrap();
        let rows = vec![row(json!({
            "organization": "Acme Corp",
            "incorporation_country": "United States",
            "incorporation_state": "Delaware"
        }))];

        match finish(&q, &f, rows) {
            HandlerOutcome::NoData(message) => {
                assert!(message.starts_with("No incorporation information found."));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_incorporation_keeps_named_organization_rows() {
        let f = features("Where are Acme Corp and Globex incorporated?");
        let q = plan(Intent::Incorporation, &f, &["Acme Corp".to_string()]).unwrap();
        let rows = vec![
            row(json!({"organization": "Acme Corp", "incorporation_state": "Delaware"})),
            row(json!({"organization": "Birch LLC", "incorporation_state": "Nevada"})),
        ];

        match finish(&q, &f, rows) {
            HandlerOutcome::Rows { rows, .. } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0]["organization"], json!("Acme Corp"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
