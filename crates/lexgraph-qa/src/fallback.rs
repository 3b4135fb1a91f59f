//! The last tier: broad keyword classes, then the last resort.
//!
//! Last-resort precedence is data first: an agreement named in the question
//! (store names, then reference-table aliases), then the database overview
//! listing agreements from the store, then the reference table's names, and
//! only then an apology.

use lexgraph_graph::queries::{self, AgreementSummary};

use crate::handlers::HandlerOutcome;
use crate::router::{self, phrase, Intent, QuestionFeatures};
use crate::QuestionEngine;

/// Agreements listed in the overview.
const OVERVIEW_LISTING_LIMIT: u32 = 25;

/// Name words too common to identify one agreement.
const GENERIC_NAME_WORDS: &[&str] = &[
    "agreement", "agreements", "contract", "contracts", "master", "amended", "restated",
];

pub(crate) async fn resolve(engine: &QuestionEngine, features: &QuestionFeatures) -> String {
    let intent = router::route_fallback(features);
    if intent != Intent::DatabaseOverview {
        match engine.run_handler(intent, features).await {
            Ok(HandlerOutcome::Rows { intent, rows }) => {
                tracing::info!(intent = %intent, rows = rows.len(), "Answered by keyword fallback");
                return engine.reducer.reduce(features.question(), intent, &rows).await;
            }
            Ok(HandlerOutcome::NoData(message)) => return message,
            Ok(HandlerOutcome::NotMatched) => {}
            Err(e) => tracing::warn!(intent = %intent, error = %e, "Keyword fallback failed"),
        }
    }
    last_resort(engine, features).await
}

async fn last_resort(engine: &QuestionEngine, features: &QuestionFeatures) -> String {
    let listing = match engine
        .guarded(Intent::DatabaseOverview, queries::list_agreements(engine.store.as_ref(), 1000))
        .await
    {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!(error = %e, "Could not list agreements");
            Vec::new()
        }
    };

    if let Some(contract_id) = mentioned_agreement(engine, features, &listing) {
        match engine.get_contract(contract_id).await {
            Ok(Some(agreement)) => {
                tracing::info!(contract_id, "Answered from mentioned agreement");
                let rows = crate::contract_detail_rows(&agreement);
                return engine
                    .reducer
                    .reduce(features.question(), Intent::ContractDetail, &rows)
                    .await;
            }
            Ok(None) => tracing::info!(contract_id, "Mentioned agreement not in store"),
            Err(e) => {
                tracing::warn!(contract_id, error = %e, "Could not fetch mentioned agreement");
                if let Some(known) = engine
                    .settings
                    .known_agreements
                    .iter()
                    .find(|k| k.contract_id == contract_id)
                {
                    return format!(
                        "{} (contract {}) is a known agreement, but its details could not be \
                         retrieved to answer: \"{}\"",
                        known.name,
                        contract_id,
                        features.question()
                    );
                }
            }
        }
    }

    match database_overview(engine, &listing).await {
        Some(text) => return text,
        None => tracing::info!("Database overview unavailable"),
    }

    let known = &engine.settings.known_agreements;
    if !known.is_empty() {
        let names: Vec<&str> = known.iter().map(|k| k.name.as_str()).collect();
        return format!(
            "I couldn't retrieve data to answer: \"{}\"\n\n\
             Try asking about one of these agreements: {}.",
            features.question(),
            names.join(", ")
        );
    }

    apology(features.question())
}

/// Contract id of an agreement the question names, if any.
fn mentioned_agreement(
    engine: &QuestionEngine,
    features: &QuestionFeatures,
    listing: &[AgreementSummary],
) -> Option<i64> {
    let by_full_name = listing
        .iter()
        .find(|a| features.has(&phrase(&a.name)))
        .map(|a| a.contract_id);

    let by_name_word = || {
        listing
            .iter()
            .find(|a| {
                phrase(&a.name).split(' ').any(|w| {
                    w.chars().count() > 4 && !GENERIC_NAME_WORDS.contains(&w) && features.has(w)
                })
            })
            .map(|a| a.contract_id)
    };

    let by_reference = || {
        engine
            .settings
            .known_agreements
            .iter()
            .find(|k| {
                features.has(&phrase(&k.name)) || k.aliases.iter().any(|alias| features.has(&phrase(alias)))
            })
            .map(|k| k.contract_id)
    };

    by_full_name.or_else(by_name_word).or_else(by_reference)
}

/// Overview of the corpus listing agreement names. `None` when the store
/// could not be read or holds no agreements.
pub(crate) async fn database_overview(
    engine: &QuestionEngine,
    listing: &[AgreementSummary],
) -> Option<String> {
    let store = engine.store.as_ref();
    let (stats, fresh) = tokio::join!(
        engine.guarded(Intent::DatabaseOverview, queries::contract_statistics(store)),
        async {
            if listing.is_empty() {
                engine
                    .guarded(
                        Intent::DatabaseOverview,
                        queries::list_agreements(store, OVERVIEW_LISTING_LIMIT),
                    )
                    .await
                    .ok()
            } else {
                None
            }
        }
    );
    let listing = fresh.as_deref().unwrap_or(listing);

    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!(error = %e, "Could not gather statistics");
            if listing.is_empty() {
                return None;
            }
            Default::default()
        }
    };
    if listing.is_empty() {
        return None;
    }

    let mut text = String::from(
        "I couldn't match your question to a specific query, so here is an overview of the contract database.\n\n",
    );
    if stats.total_contracts > 0 {
        text.push_str(&format!(
            "**Contracts:** {} across {} agreement type(s)\n\
             **Organizations:** {}\n\
             **Clauses:** {} ({} distinct types)\n\
             **Countries:** {}\n\n",
            stats.total_contracts,
            stats.contract_types.len(),
            stats.total_organizations,
            stats.total_clauses,
            stats.unique_clause_types,
            stats.total_countries,
        ));
    }

    text.push_str("**Available agreements:**\n");
    for agreement in listing.iter().take(OVERVIEW_LISTING_LIMIT as usize) {
        text.push_str(&format!("- {} (contract {})", agreement.name, agreement.contract_id));
        if !agreement.parties.is_empty() {
            text.push_str(&format!(": {}", agreement.parties.join(", ")));
        }
        text.push('\n');
    }
    if listing.len() > OVERVIEW_LISTING_LIMIT as usize {
        text.push_str(&format!(
            "- ... and {} more\n",
            listing.len() - OVERVIEW_LISTING_LIMIT as usize
        ));
    }
    text.push_str(
        "\nAsk about one of these agreements, its parties, clause types, governing law, or excerpts.",
    );
    Some(text)
}

/// Final answer when every tier failed. Echoes the question, claims nothing.
pub fn apology(question: &str) -> String {
    format!(
        "Sorry, I couldn't answer your question: \"{question}\"\n\n\
         The relevant data could not be found or retrieved from the contract database. \
         Please try rephrasing your question."
    )
}
