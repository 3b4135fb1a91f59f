//! Structural cost estimate for a Cypher query.
//!
//! Score = Σ(weight × occurrences) over a handful of expensive constructs.
//! Lexical and best-effort: a keyword inside an unusual construct may be
//! miscounted, which only shifts the strategy by one rung at worst.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cypher::{self, Token};

/// Execution strategy, ordered from cheapest to most involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Basic,
    Aggregated,
    Streaming,
    Distributed,
}

impl Strategy {
    /// Threshold ladder: ≤5 basic, ≤15 aggregated, ≤30 streaming, else distributed.
    pub fn for_score(score: u32) -> Self {
        match score {
            0..=5 => Self::Basic,
            6..=15 => Self::Aggregated,
            16..=30 => Self::Streaming,
            _ => Self::Distributed,
        }
    }

    /// Whether results should be paged rather than fetched in one round trip.
    pub fn is_paged(self) -> bool {
        matches!(self, Self::Streaming | Self::Distributed)
    }
}

/// Result of [`estimate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexityReport {
    pub score: u32,
    pub factors: BTreeMap<String, u32>,
    pub strategy: Strategy,
}

const MATCH_WEIGHT: u32 = 2;
const OPTIONAL_MATCH_WEIGHT: u32 = 3;
const WITH_WEIGHT: u32 = 1;
const COLLECT_WEIGHT: u32 = 2;
const UNWIND_WEIGHT: u32 = 4;
const EXISTS_WEIGHT: u32 = 5;
const LIST_PREDICATE_WEIGHT: u32 = 3;

const LIST_PREDICATES: [&str; 4] = ["ALL", "ANY", "NONE", "SINGLE"];

/// Score a query and recommend a strategy. Pure function of the text.
pub fn estimate(query: &str) -> ComplexityReport {
    let tokens = cypher::tokenize(query);

    let mut matches = 0;
    let mut optional_matches = 0;
    let mut withs = 0;
    let mut exists_subqueries = 0;
    let mut list_predicates = 0;

    for (idx, token) in tokens.iter().enumerate() {
        let prev = idx.checked_sub(1).map(|p| &tokens[p]);
        match token.word.as_str() {
            "MATCH" if prev.is_some_and(|p| p.is("OPTIONAL")) => optional_matches += 1,
            "MATCH" => matches += 1,
            "WITH" if !prev.is_some_and(is_string_predicate) => withs += 1,
            "EXISTS" if token.next == Some('{') => exists_subqueries += 1,
            w if LIST_PREDICATES.contains(&w) && token.next == Some('(') => list_predicates += 1,
            _ => {}
        }
    }

    let collects = count_calls(&tokens, "COLLECT");
    let unwinds = cypher::count(&tokens, "UNWIND") as u32;

    let weighted = [
        ("match_operations", matches, MATCH_WEIGHT),
        ("optional_matches", optional_matches, OPTIONAL_MATCH_WEIGHT),
        ("with_clauses", withs, WITH_WEIGHT),
        ("collections", collects, COLLECT_WEIGHT),
        ("unwinds", unwinds, UNWIND_WEIGHT),
        ("exists_subqueries", exists_subqueries, EXISTS_WEIGHT),
        ("list_predicates", list_predicates, LIST_PREDICATE_WEIGHT),
    ];

    let mut factors = BTreeMap::new();
    let mut score = 0;
    for (name, occurrences, weight) in weighted {
        if occurrences > 0 {
            factors.insert(name.to_string(), occurrences);
        }
        score += occurrences * weight;
    }

    ComplexityReport {
        score,
        factors,
        strategy: Strategy::for_score(score),
    }
}

fn is_string_predicate(token: &Token) -> bool {
    token.is("STARTS") || token.is("ENDS")
}

fn count_calls(tokens: &[Token], function: &str) -> u32 {
    tokens
        .iter()
        .filter(|t| t.is(function) && t.next == Some('('))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_boundaries() {
        assert_eq!(Strategy::for_score(0), Strategy::Basic);
        assert_eq!(Strategy::for_score(5), Strategy::Basic);
        assert_eq!(Strategy::for_score(6), Strategy::Aggregated);
        assert_eq!(Strategy::for_score(15), Strategy::Aggregated);
        assert_eq!(Strategy::for_score(16), Strategy::Streaming);
        assert_eq!(Strategy::for_score(30), Strategy::Streaming);
        assert_eq!(Strategy::for_score(31), Strategy::Distributed);
    }

    #[test]
    fn test_strategy_monotone() {
        let mut last = Strategy::Basic;
        for score in 0..100 {
            let s = Strategy::for_score(score);
            assert!(s >= last, "strategy decreased at score {score}");
            last = s;
        }
    }

    #[test]
    fn test_simple_lookup_is_basic() {
        let report = estimate("MATCH (a:Agreement {contract_id: $id}) RETURN a.name");
        assert_eq!(report.score, 2);
        assert_eq!(report.strategy, Strategy::Basic);
        assert_eq!(report.factors["match_operations"], 1);
    }

    #[test]
    fn test_optional_match_not_double_counted() {
        let report = estimate("MATCH (a) OPTIONAL MATCH (a)-[:HAS_CLAUSE]->(c) RETURN a, c");
        assert_eq!(report.factors["match_operations"], 1);
        assert_eq!(report.factors["optional_matches"], 1);
        assert_eq!(report.score, 5);
        assert_eq!(report.strategy, Strategy::Basic);
    }

    #[test]
    fn test_score_six_tips_to_aggregated() {
        // 2 + 2 + 2 (collect) = 6
        let report = estimate("MATCH (a) MATCH (b) RETURN collect(a)");
        assert_eq!(report.score, 6);
        assert_eq!(report.strategy, Strategy::Aggregated);
    }

    #[test]
    fn test_string_predicate_with_is_not_a_clause() {
        let report = estimate("MATCH (o) WHERE o.name STARTS WITH 'A' RETURN o");
        assert!(!report.factors.contains_key("with_clauses"));
        assert_eq!(report.score, 2);
    }

    #[test]
    fn test_expensive_constructs() {
        let q = "MATCH (a:Agreement)
                 WHERE EXISTS { MATCH (a)-[:HAS_CLAUSE]->(c) }
                   AND ALL(x IN a.tags WHERE x <> '')
                 UNWIND a.tags AS t
                 WITH a, collect(t) AS ts
                 RETURN a, ts";
        let report = estimate(q);
        // 2×2 (match) + 5 (exists) + 3 (all) + 4 (unwind) + 1 (with) + 2 (collect) = 19
        assert_eq!(report.score, 19);
        assert_eq!(report.factors["exists_subqueries"], 1);
        assert_eq!(report.factors["list_predicates"], 1);
        assert_eq!(report.strategy, Strategy::Streaming);
    }

    #[test]
    fn test_keywords_in_literals_ignored() {
        let report = estimate("MATCH (e:Excerpt) WHERE e.text CONTAINS 'UNWIND MATCH collect(' RETURN e");
        assert_eq!(report.score, 2);
    }

    #[test]
    fn test_large_query_is_distributed() {
        let q = "MATCH (a) ".repeat(16) + "RETURN a";
        let report = estimate(&q);
        assert_eq!(report.score, 32);
        assert_eq!(report.strategy, Strategy::Distributed);
    }
}
