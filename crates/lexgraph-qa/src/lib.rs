//! lexgraph-qa: Question resolution over the contract knowledge graph.
//!
//! A question goes through up to three tiers: keyword-routed handlers,
//! the translator, and a keyword fallback with a data-driven last resort.
//! Every tier that produces rows ends at the [`Reducer`]. Failures inside a
//! tier only move the question on to the next one, so [`QuestionEngine::answer_question`]
//! always returns text.

pub mod complexity;
pub mod cypher;
pub mod error;
pub mod fallback;
pub mod handlers;
pub mod llm;
pub mod optimizer;
pub mod reducer;
pub mod retriever;
pub mod router;
pub mod state;
pub mod streaming;
pub mod translator;

#[cfg(test)]
mod test_support;

pub use error::{Collaborator, QaError};
pub use reducer::{Reducer, ReducerConfig, Synthesizer};
pub use retriever::{Embedder, VectorRetriever};
pub use router::Intent;
pub use translator::{Translator, TranslatorOutput};

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lexgraph_core::config::EngineSettings;
use lexgraph_core::{Agreement, ContractStatistics, Row, Settings, SimilarExcerpt};
use lexgraph_graph::queries::{self, ClausePair, OrganizationActivity};
use lexgraph_graph::{GraphStore, Params, StoreError};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{with_budget, Result};
use crate::handlers::HandlerOutcome;
use crate::router::QuestionFeatures;
use crate::state::{EngineState, PerformanceStats};
use crate::streaming::RowStream;

/// Connectivity and engine health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub total_nodes: Option<i64>,
    pub active_indexes: Option<i64>,
    pub cache_entries: usize,
    pub tracked_intents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The question resolution engine.
///
/// Owns its cache and performance log; they live and die with the engine.
pub struct QuestionEngine {
    pub(crate) store: Arc<dyn GraphStore>,
    translator: Option<Arc<dyn Translator>>,
    retriever: Option<Arc<dyn VectorRetriever>>,
    pub(crate) reducer: Reducer,
    state: EngineState,
    pub(crate) settings: EngineSettings,
    store_timeout: Duration,
    collaborator_timeout: Duration,
}

impl QuestionEngine {
    /// Create an engine over `store` with no LLM collaborators.
    pub fn new(store: Arc<dyn GraphStore>, settings: &Settings) -> Self {
        let engine = &settings.engine;
        Self {
            store,
            translator: None,
            retriever: None,
            reducer: Reducer::new(None, ReducerConfig::from_settings(engine, &settings.llm)),
            state: EngineState::new(
                Duration::from_secs(engine.cache_ttl_secs),
                engine.max_cache_entries,
                engine.perf_samples_per_intent,
            ),
            settings: engine.clone(),
            store_timeout: Duration::from_millis(engine.store_timeout_ms),
            collaborator_timeout: Duration::from_millis(engine.synthesis_timeout_ms),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.reducer = Reducer::new(Some(synthesizer), self.reducer.config().clone());
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn VectorRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    // ── Free-form Questions ──────────────────────────────────────

    /// Answer a natural-language question. Never fails: exhausting every
    /// tier yields an apology that echoes the question.
    pub async fn answer_question(&self, question: &str) -> String {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("answer_question", %request_id);
        self.resolve(question).instrument(span).await
    }

    async fn resolve(&self, question: &str) -> String {
        let features = QuestionFeatures::new(question);
        if features.words().next().is_none() {
            return fallback::apology(question);
        }

        if let Some(intent) = router::route_primary(&features) {
            match self.run_handler(intent, &features).await {
                Ok(HandlerOutcome::Rows { intent, rows }) => {
                    tracing::info!(intent = %intent, rows = rows.len(), "Answered by pattern handler");
                    return self.reducer.reduce(features.question(), intent, &rows).await;
                }
                Ok(HandlerOutcome::NoData(message)) => {
                    tracing::info!(intent = %intent, "Pattern handler found no data");
                    return message;
                }
                Ok(HandlerOutcome::NotMatched) => {
                    tracing::debug!(intent = %intent, "Pattern handler did not apply");
                }
                Err(e) => tracing::warn!(intent = %intent, error = %e, "Pattern handler failed"),
            }
        }

        match self.try_translator(&features).await {
            Ok(Some(answer)) => return answer,
            Ok(None) => tracing::info!("Translator produced nothing usable"),
            Err(e) => tracing::warn!(error = %e, "Translator tier failed"),
        }

        fallback::resolve(self, &features).await
    }

    pub(crate) async fn run_handler(
        &self,
        intent: Intent,
        features: &QuestionFeatures,
    ) -> Result<HandlerOutcome> {
        let organizations = if intent == Intent::Incorporation && !features.proper_names().is_empty() {
            let known = self
                .run_query(intent, handlers::ORGANIZATION_NAMES, &Params::new())
                .await?;
            handlers::mentioned_organizations(features, &known)
        } else {
            Vec::new()
        };

        let Some(query) = handlers::plan(intent, features, &organizations) else {
            return Ok(HandlerOutcome::NotMatched);
        };
        if !organizations.is_empty() {
            tracing::debug!(intent = %intent, organizations = ?organizations, "Restricting to named organizations");
        }
        let rows = self.run_query(intent, query.cypher, &query.params).await?;
        Ok(handlers::finish(&query, features, rows.as_ref().clone()))
    }

    async fn try_translator(&self, features: &QuestionFeatures) -> Result<Option<String>> {
        let Some(translator) = &self.translator else {
            return Ok(None);
        };

        let output = with_budget(
            Collaborator::Translator,
            self.collaborator_timeout,
            translator.translate(features.question(), crate::translator::SCHEMA_DESCRIPTION),
        )
        .await?;

        let rows = match output {
            TranslatorOutput::Cypher(query) => self.execute_translated(&query).await?,
            TranslatorOutput::Rows(rows) => rows,
            TranslatorOutput::DirectText(text) if !text.trim().is_empty() => return Ok(Some(text)),
            TranslatorOutput::DirectText(_) | TranslatorOutput::Empty => return Ok(None),
        };

        if rows.is_empty() {
            return Ok(None);
        }
        tracing::info!(rows = rows.len(), "Answered by translator");
        Ok(Some(
            self.reducer
                .reduce(features.question(), Intent::Translator, &rows)
                .await,
        ))
    }

    /// Vet, optimize, and run a translator query with the strategy its
    /// complexity calls for.
    async fn execute_translated(&self, query: &str) -> Result<Vec<Row>> {
        translator::ensure_read_only(query)?;

        let row_limit = self.settings.row_limit;
        let optimized = optimizer::optimize(query, None, row_limit);
        let report = complexity::estimate(&optimized);
        tracing::info!(score = report.score, strategy = ?report.strategy, "Running translator query");

        if !report.strategy.is_paged() {
            let rows = self
                .run_query(Intent::Translator, &optimized, &Params::new())
                .await?;
            return Ok(rows.as_ref().clone());
        }

        let start = Instant::now();
        let stream = RowStream::new(
            self.store.as_ref(),
            &optimized,
            Params::new(),
            self.settings.batch_size,
        )
        .with_page_timeout(self.store_timeout);
        let rows = stream.collect(row_limit).await;
        self.state
            .record(Intent::Translator, start.elapsed().as_millis() as u64);
        Ok(rows)
    }

    /// Run a read query through the cache, under the store budget.
    async fn run_query(&self, intent: Intent, cypher: &str, params: &Params) -> Result<Arc<Vec<Row>>> {
        let key = EngineState::cache_key(cypher, params);
        if let Some(rows) = self.state.cached(&key) {
            tracing::debug!(intent = %intent, rows = rows.len(), "Cache hit");
            return Ok(rows);
        }

        let result = self
            .guarded(intent, self.store.execute(cypher, params))
            .await?;
        let rows = Arc::new(result.rows);
        self.state.store(key, Arc::clone(&rows));
        Ok(rows)
    }

    /// Await a store call under the store budget and log its duration.
    pub(crate) async fn guarded<T, F>(&self, intent: Intent, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = with_budget(Collaborator::GraphStore, self.store_timeout, async {
            call.await.map_err(QaError::from)
        })
        .await;
        self.state.record(intent, start.elapsed().as_millis() as u64);
        result
    }

    // ── Commands ─────────────────────────────────────────────────

    pub async fn get_contract(&self, contract_id: i64) -> Result<Option<Agreement>> {
        self.guarded(
            Intent::ContractDetail,
            queries::get_contract(self.store.as_ref(), contract_id),
        )
        .await
    }

    pub async fn get_contracts_by_party(&self, organization_name: &str) -> Result<Vec<Agreement>> {
        self.guarded(
            Intent::ContractList,
            queries::get_contracts_by_party(self.store.as_ref(), organization_name),
        )
        .await
    }

    pub async fn get_contracts_with_clause_type(&self, clause_type: &str) -> Result<Vec<Agreement>> {
        self.guarded(
            Intent::ContractList,
            queries::get_contracts_with_clause_type(self.store.as_ref(), clause_type),
        )
        .await
    }

    pub async fn get_contracts_without_clause_type(&self, clause_type: &str) -> Result<Vec<Agreement>> {
        self.guarded(
            Intent::ContractList,
            queries::get_contracts_without_clause_type(self.store.as_ref(), clause_type),
        )
        .await
    }

    pub async fn get_contract_excerpts(&self, contract_id: i64) -> Result<Option<Agreement>> {
        self.guarded(
            Intent::ContractExcerpts,
            queries::get_contract_excerpts(self.store.as_ref(), contract_id),
        )
        .await
    }

    /// Excerpts most similar to `text`, best first.
    pub async fn get_contracts_similar_text(&self, text: &str, top_k: usize) -> Result<Vec<SimilarExcerpt>> {
        let retriever = self
            .retriever
            .as_ref()
            .ok_or(QaError::NotConfigured(Collaborator::Retriever))?;

        let start = Instant::now();
        let hits = with_budget(
            Collaborator::Retriever,
            self.collaborator_timeout,
            retriever.search(text, top_k),
        )
        .await;
        self.state
            .record(Intent::Similarity, start.elapsed().as_millis() as u64);

        Ok(hits?
            .iter()
            .filter_map(retriever::ScoredContent::to_similar_excerpt)
            .collect())
    }

    pub async fn contract_statistics(&self) -> Result<ContractStatistics> {
        self.guarded(
            Intent::Analytics,
            queries::contract_statistics(self.store.as_ref()),
        )
        .await
    }

    pub async fn top_organizations(&self, limit: u32) -> Result<Vec<OrganizationActivity>> {
        self.guarded(
            Intent::Analytics,
            queries::top_organizations(self.store.as_ref(), limit),
        )
        .await
    }

    pub async fn clause_co_occurrence(&self, min_frequency: u32) -> Result<Vec<ClausePair>> {
        self.guarded(
            Intent::Analytics,
            queries::clause_co_occurrence(self.store.as_ref(), min_frequency),
        )
        .await
    }

    /// Probe the store and report engine state. Never fails.
    pub async fn health_check(&self) -> HealthReport {
        let store = self.store.as_ref();
        let (nodes, indexes) = tokio::join!(
            with_budget(Collaborator::GraphStore, self.store_timeout, async {
                queries::count_nodes(store).await.map_err(QaError::from)
            }),
            with_budget(Collaborator::GraphStore, self.store_timeout, async {
                queries::count_online_indexes(store).await.map_err(QaError::from)
            }),
        );

        let (status, error) = match &nodes {
            Ok(_) => ("healthy", None),
            Err(e) => ("unhealthy", Some(e.to_string())),
        };
        HealthReport {
            status: status.to_string(),
            total_nodes: nodes.ok(),
            active_indexes: indexes.ok(),
            cache_entries: self.state.cache_len(),
            tracked_intents: self.state.tracked_intents(),
            error,
        }
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        self.state.performance_stats()
    }

    pub fn clear_performance_stats(&self) {
        self.state.clear_performance_stats();
    }

    pub fn clear_cache(&self) {
        self.state.clear_cache();
    }

    /// Run command output through the reducer as prose.
    pub async fn describe(&self, question: &str, intent: Intent, rows: &[Row]) -> String {
        self.reducer.reduce(question, intent, rows).await
    }
}

// ── Command Rows ─────────────────────────────────────────────────

/// One row per clause type, the enumeration a contract description must cover.
/// An agreement without clauses yields a single row of its own fields.
pub fn contract_detail_rows(agreement: &Agreement) -> Vec<Row> {
    if agreement.clauses.is_empty() {
        return agreement_rows(std::slice::from_ref(agreement));
    }
    agreement
        .clauses
        .iter()
        .filter_map(|clause| {
            json!({
                "agreement": agreement.display_name(),
                "contract_id": agreement.contract_id,
                "clause_type": clause.clause_type,
            })
            .as_object()
            .cloned()
        })
        .collect()
}

/// One row per clause with all of its excerpts.
pub fn excerpt_rows(agreement: &Agreement) -> Vec<Row> {
    agreement
        .clauses
        .iter()
        .filter_map(|clause| {
            json!({
                "agreement": agreement.display_name(),
                "contract_id": agreement.contract_id,
                "clause_type": clause.clause_type,
                "excerpts": clause.excerpts,
            })
            .as_object()
            .cloned()
        })
        .collect()
}

/// Any serializable records as rows.
pub fn to_rows<T: Serialize>(records: &[T]) -> Vec<Row> {
    records
        .iter()
        .filter_map(|r| match serde_json::to_value(r) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .collect()
}

pub fn agreement_rows(agreements: &[Agreement]) -> Vec<Row> {
    to_rows(agreements)
}
