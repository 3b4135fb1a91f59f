//! Keyword routing from a question to an intent.
//!
//! Matching is on whole lower-cased words, with multi-word entries matched
//! as phrases. Routing is a pure function of the question text.

use std::collections::BTreeSet;

use serde::Serialize;

// ── Keyword Sets ─────────────────────────────────────────────────

pub const INCORPORATION_KEYWORDS: &[&str] = &["incorporation", "incorporated", "incorporate"];
pub const STATE_NAMES: &[&str] = &["delaware", "new york", "california", "nevada"];
pub const CLAUSE_HINTS: &[&str] = &[
    "clause",
    "clauses",
    "license",
    "licenses",
    "licensing",
    "assignment",
    "assignments",
];
pub const CLAUSE_KEYWORDS: &[&str] = &["clause", "clauses"];
pub const CONJUNCTIONS: &[&str] = &["and", "both"];
pub const ORGANIZATION_KEYWORDS: &[&str] = &[
    "organization",
    "organizations",
    "party",
    "parties",
    "company",
    "companies",
];

/// Words after which a capitalized run names a place, not a party.
const PLACE_PREPOSITIONS: &[&str] = &["in", "under", "within"];
const TITLE_WORDS: &[&str] = &["agreement", "agreements", "contract", "contracts"];

const FALLBACK_CLASSES: &[(Intent, &[&str])] = &[
    (Intent::Incorporation, &["incorporation", "incorporated", "state"]),
    (Intent::Clause, &["clause", "clauses", "type", "types"]),
    (
        Intent::Organization,
        &["organization", "organizations", "party", "parties", "company", "companies"],
    ),
    (Intent::Agreement, &["agreement", "agreements", "contract", "contracts"]),
    (Intent::Jurisdiction, &["jurisdiction", "governing", "law"]),
    (Intent::Excerpt, &["excerpt", "excerpts", "text", "content"]),
];

// ── Intents ──────────────────────────────────────────────────────

/// What a result set answers. Selects both the handler and the synthesis style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    IncorporationWithClauses,
    MultipleClauses,
    Incorporation,
    Clause,
    Organization,
    Agreement,
    Jurisdiction,
    Excerpt,
    DatabaseOverview,
    Translator,
    ContractDetail,
    ContractExcerpts,
    ContractList,
    Similarity,
    Analytics,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Self::IncorporationWithClauses => "incorporation_clauses",
            Self::MultipleClauses => "multiple_clauses",
            Self::Incorporation => "incorporation",
            Self::Clause => "clause_analysis",
            Self::Organization => "organization_analysis",
            Self::Agreement => "agreement_analysis",
            Self::Jurisdiction => "jurisdiction_analysis",
            Self::Excerpt => "excerpt_analysis",
            Self::DatabaseOverview => "database_overview",
            Self::Translator => "translator",
            Self::ContractDetail => "contract_detail",
            Self::ContractExcerpts => "excerpts",
            Self::ContractList => "contract_list",
            Self::Similarity => "similarity",
            Self::Analytics => "analytics",
        }
    }

    /// Intents whose answer must enumerate every row, without sampling.
    pub fn is_exhaustive(self) -> bool {
        matches!(self, Self::ContractDetail | Self::ContractExcerpts)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Question Features ────────────────────────────────────────────

/// The lower-cased words of a question, for keyword tests.
#[derive(Debug, Clone)]
pub struct QuestionFeatures {
    original: String,
    words: BTreeSet<String>,
    /// Words joined by single spaces and padded, for phrase lookup.
    normalized: String,
}

impl QuestionFeatures {
    pub fn new(question: &str) -> Self {
        let lowered = question.to_lowercase();
        let sequence: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        Self {
            original: question.trim().to_string(),
            words: sequence.iter().map(|w| w.to_string()).collect(),
            normalized: format!(" {} ", sequence.join(" ")),
        }
    }

    pub fn question(&self) -> &str {
        &self.original
    }

    /// Whether `term` occurs as a word, or as a phrase when it has spaces.
    pub fn has(&self, term: &str) -> bool {
        if term.contains(' ') {
            self.normalized.contains(&format!(" {term} "))
        } else {
            self.words.contains(term)
        }
    }

    pub fn has_any(&self, terms: &[&str]) -> bool {
        terms.iter().any(|t| self.has(t))
    }

    /// Words of the question in order, without punctuation.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.normalized.split_whitespace()
    }

    /// Whether any word of the question starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.words.iter().any(|w| w.starts_with(prefix))
    }

    /// Runs of capitalized words after the first word, e.g. "Globex" or
    /// "Acme Corp". Runs naming a place ("in Delaware", "under the Laws")
    /// or an agreement title are left out.
    pub fn proper_names(&self) -> Vec<String> {
        let tokens: Vec<&str> = self
            .original
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let capitalized = |w: &str| w.chars().next().is_some_and(char::is_uppercase);

        let mut names = Vec::new();
        let mut i = 1;
        while i < tokens.len() {
            if !capitalized(tokens[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i < tokens.len() && capitalized(tokens[i]) {
                i += 1;
            }

            let lead = tokens[..start]
                .iter()
                .rev()
                .map(|w| w.to_lowercase())
                .find(|w| w != "the");
            let name = tokens[start..i].join(" ");
            let lowered = phrase(&name);
            let place = lead.is_some_and(|w| PLACE_PREPOSITIONS.contains(&w.as_str()));
            let title = lowered.split(' ').any(|w| TITLE_WORDS.contains(&w));

            if name.len() > 1 && !place && !title && !STATE_NAMES.contains(&lowered.as_str()) {
                names.push(name);
            }
        }
        names
    }
}

/// Lower-cased words of `text` joined by single spaces.
pub fn phrase(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Routing ──────────────────────────────────────────────────────

/// Priority branches for questions the specialized handlers understand.
///
/// Branches are tested independently in order; `None` means no branch held.
pub fn route_primary(features: &QuestionFeatures) -> Option<Intent> {
    let incorporation = features.has_any(INCORPORATION_KEYWORDS);

    if incorporation && features.has_any(STATE_NAMES) && features.has_any(CLAUSE_HINTS) {
        return Some(Intent::IncorporationWithClauses);
    }
    if features.has_any(CLAUSE_KEYWORDS) && features.has_any(CONJUNCTIONS) {
        return Some(Intent::MultipleClauses);
    }
    if features.has_any(ORGANIZATION_KEYWORDS) && incorporation {
        return Some(Intent::Incorporation);
    }
    None
}

/// Broad keyword classes, first match wins, overview when nothing matches.
pub fn route_fallback(features: &QuestionFeatures) -> Intent {
    FALLBACK_CLASSES
        .iter()
        .find(|(_, keywords)| features.has_any(keywords))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::DatabaseOverview)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(q: &str) -> Option<Intent> {
        route_primary(&QuestionFeatures::new(q))
    }

    fn fallback(q: &str) -> Intent {
        route_fallback(&QuestionFeatures::new(q))
    }

    #[test]
    fn test_incorporation_with_clauses() {
        assert_eq!(
            primary("Which organizations incorporated in New York have license clauses?"),
            Some(Intent::IncorporationWithClauses)
        );
    }

    #[test]
    fn test_state_without_clause_hint_falls_to_next_branch() {
        assert_eq!(
            primary("Which parties are incorporated in Delaware?"),
            Some(Intent::Incorporation)
        );
    }

    #[test]
    fn test_multiple_clauses_needs_conjunction_word() {
        assert_eq!(
            primary("Agreements with both license and termination clauses"),
            Some(Intent::MultipleClauses)
        );
        assert_eq!(primary("Which brand clauses exist?"), None);
    }

    #[test]
    fn test_plural_and_inflected_keywords_reach_primary_branches() {
        assert_eq!(
            primary("Which organizations are incorporated in Delaware?"),
            Some(Intent::Incorporation)
        );
        assert_eq!(
            primary("Which organizations incorporated in Delaware have termination clauses?"),
            Some(Intent::IncorporationWithClauses)
        );
        assert_eq!(
            primary("Which companies incorporated in Nevada hold licenses?"),
            Some(Intent::IncorporationWithClauses)
        );
        assert_eq!(
            primary("Where did the companies incorporate?"),
            Some(Intent::Incorporation)
        );
        assert_eq!(fallback("Which organizations sign most?"), Intent::Organization);
    }

    #[test]
    fn test_proper_names() {
        let f = QuestionFeatures::new("In which state is the organization Globex incorporated?");
        assert_eq!(f.proper_names(), vec!["Globex"]);

        let f = QuestionFeatures::new("Where are Acme Corp and Birch LLC incorporated?");
        assert_eq!(f.proper_names(), vec!["Acme Corp", "Birch LLC"]);

        let f = QuestionFeatures::new("Which parties are incorporated in the State of Delaware?");
        assert!(f.proper_names().is_empty());

        let f = QuestionFeatures::new("Which parties to the Master Franchise Agreement are incorporated?");
        assert!(f.proper_names().is_empty());

        let f = QuestionFeatures::new("Is Delaware where I incorporated?");
        assert!(f.proper_names().is_empty());
    }

    #[test]
    fn test_phrase_matching() {
        let f = QuestionFeatures::new("Incorporated in New-York?");
        assert!(f.has("new york"));
        assert!(!QuestionFeatures::new("a new yorker").has("new york"));
    }

    #[test]
    fn test_fallback_order() {
        assert_eq!(fallback("Which state is most common?"), Intent::Incorporation);
        assert_eq!(fallback("List clause types per contract"), Intent::Clause);
        assert_eq!(fallback("Which company signs most?"), Intent::Organization);
        assert_eq!(fallback("What contracts involve Acme Corp?"), Intent::Agreement);
        assert_eq!(fallback("Which governing law applies?"), Intent::Jurisdiction);
        assert_eq!(fallback("Show me excerpt samples"), Intent::Excerpt);
        assert_eq!(fallback("Hello there"), Intent::DatabaseOverview);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let q = "Which organizations are incorporated in Nevada and have assignment clauses?";
        let first = (primary(q), fallback(q));
        for _ in 0..10 {
            assert_eq!((primary(q), fallback(q)), first);
        }
    }

    #[test]
    fn test_exhaustive_intents() {
        assert!(Intent::ContractDetail.is_exhaustive());
        assert!(Intent::ContractExcerpts.is_exhaustive());
        assert!(!Intent::ContractList.is_exhaustive());
        assert!(!Intent::Translator.is_exhaustive());
    }
}
