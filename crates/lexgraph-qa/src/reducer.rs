//! Reduction of result rows into a grounded answer.
//!
//! Rows are truncated, rendered as text, summarized, and handed to the
//! [`Synthesizer`]. Whenever synthesis is unavailable, fails, or drops items
//! from an exhaustive listing, the answer is the deterministic template,
//! which only ever repeats what the rows say.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lexgraph_core::config::{EngineSettings, LlmSettings};
use lexgraph_core::Row;
use serde::Serialize;
use serde_json::Value;

use crate::error::{with_budget, Collaborator, QaError, Result};
use crate::router::Intent;

/// Produces prose from a system and user prompt.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

const LIST_PREVIEW: usize = 5;
const TEXT_PREVIEW_CHARS: usize = 200;
const EXHAUSTIVE_MAX_TOKENS: u32 = 4000;

const BASE_SYSTEM_PROMPT: &str = "You are a precise contract analyst who provides direct, factual answers \
to specific questions. You ONLY answer what is explicitly asked using evidence from the provided data. \
You never provide general information or analysis beyond what was requested.";

const GROUNDING_INSTRUCTION: &str = "Answer precisely and only from the data above:
1. Answer the exact question asked, nothing more.
2. Cite the specific agreements, organizations, names, numbers, dates, and quoted text that support the answer.
3. State only what the data directly shows. Never invent values.
4. If the data is insufficient, say clearly what cannot be answered from it.
Start with a direct answer, then the supporting evidence.";

// ── Configuration ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReducerConfig {
    pub max_items: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ReducerConfig {
    pub fn from_settings(engine: &EngineSettings, llm: &LlmSettings) -> Self {
        Self {
            max_items: engine.max_items_for_llm,
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            timeout: Duration::from_millis(engine.synthesis_timeout_ms),
        }
    }
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default(), &LlmSettings::default())
    }
}

// ── Summary Statistics ───────────────────────────────────────────

/// Context about a result set. Never used to decide what is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub total_results: usize,
    pub organizations: BTreeSet<String>,
    pub contract_types: BTreeSet<String>,
    pub jurisdictions: BTreeSet<String>,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

impl SummaryStats {
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut stats = Self {
            total_results: rows.len(),
            ..Default::default()
        };

        for row in rows {
            for (key, value) in row {
                let key = key.to_lowercase();
                if key.contains("organization") || key.contains("part") {
                    collect_names(value, &mut stats.organizations);
                }
                if key.contains("type") {
                    collect_names(value, &mut stats.contract_types);
                }
                if ["jurisdiction", "state", "country", "law"]
                    .iter()
                    .any(|k| key.contains(k))
                {
                    collect_names(value, &mut stats.jurisdictions);
                }
                if key.contains("date") {
                    if let Some(date) = value.as_str().and_then(parse_date) {
                        stats.observe_date(date);
                    }
                }
            }
        }
        stats
    }

    fn observe_date(&mut self, date: NaiveDate) {
        self.earliest_date = Some(self.earliest_date.map_or(date, |e| e.min(date)));
        self.latest_date = Some(self.latest_date.map_or(date, |l| l.max(date)));
    }
}

/// Dates as ingestion writes them; anything else is ignored.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y"];

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let day = text.get(..10).filter(|d| d.len() == 10 && d.as_bytes()[4] == b'-');
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| day.and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

fn collect_names(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) if !s.is_empty() => {
            out.insert(s.clone());
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) if !s.is_empty() => {
                        out.insert(s.clone());
                    }
                    Value::Object(obj) => {
                        if let Some(name) = ["name", "party"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(Value::as_str))
                        {
                            out.insert(name.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

// ── Rendering ────────────────────────────────────────────────────

/// Marker appended when rows were cut.
pub fn more_marker(hidden: usize) -> String {
    format!("[... and {hidden} more results not shown]")
}

/// Render rows as numbered blocks of `Key: value` lines.
pub fn render_rows(rows: &[Row], intent: Intent) -> String {
    let full = intent.is_exhaustive();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut lines = vec![format!("Result {}:", i + 1)];
            for (key, value) in row {
                if let Some(text) = render_value(value, full) {
                    lines.push(format!("  • {}: {text}", format_key(key)));
                }
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_value(value: &Value, full: bool) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(if full { s.clone() } else { preview(s) }),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().filter_map(render_scalar).collect();
            if rendered.is_empty() {
                None
            } else if full || rendered.len() <= LIST_PREVIEW {
                Some(rendered.join(", "))
            } else {
                Some(format!("{}... ({} total)", rendered[..3].join(", "), rendered.len()))
            }
        }
        Value::Object(_) => render_scalar(value),
        other => Some(other.to_string()),
    }
}

/// One list element or nested object on a single line.
fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let fields: Vec<String> = obj
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}: {s}"),
                    other => format!("{k}: {other}"),
                })
                .collect();
            (!fields.is_empty()).then(|| fields.join("; "))
        }
        other => Some(other.to_string()),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= TEXT_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
    format!("{cut}...")
}

fn format_key(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ── Prompts ──────────────────────────────────────────────────────

pub fn system_prompt(intent: Intent) -> String {
    let specific = match intent {
        Intent::ContractDetail => {
            " CRITICAL REQUIREMENT: You must list ALL clauses completely. Never use '...' or '(X total)'. \
             List every single clause individually."
        }
        Intent::ContractExcerpts => {
            " CRITICAL: Display ALL clause excerpts from the data. Do not omit, summarize, or truncate any."
        }
        Intent::Similarity => {
            " Focus on relevance and explain exactly why results match the query with specific evidence."
        }
        Intent::ContractList => " Focus on specific organizational details that answer the question.",
        Intent::Translator => {
            " Focus on precise statistical answers and patterns that directly address the question."
        }
        _ => " Provide only the specific information requested with supporting evidence.",
    };
    format!("{BASE_SYSTEM_PROMPT}{specific}")
}

pub fn user_prompt(question: &str, intent: Intent, rendered: &str, shown: usize, stats: &SummaryStats) -> String {
    let mut prompt = format!(
        "User Question: \"{question}\"\nQuery Type: {intent}\n\n\
         Summary Statistics:\n\
         - Total Results: {}\n\
         - Organizations: {}\n\
         - Contract Types: {}\n\
         - Jurisdictions: {}\n",
        stats.total_results,
        stats.organizations.len(),
        stats.contract_types.len(),
        stats.jurisdictions.len(),
    );
    if let (Some(earliest), Some(latest)) = (&stats.earliest_date, &stats.latest_date) {
        prompt.push_str(&format!("- Date Range: {earliest} to {latest}\n"));
    }

    prompt.push_str(&format!("\nRaw Data to Format:\n{rendered}\n\n"));

    if intent.is_exhaustive() {
        prompt.push_str(&format!(
            "MANDATORY: The data contains exactly {shown} results. Your answer MUST enumerate all {shown} \
             of them as a top-level list with exactly one line starting with \"- \" per result, in the \
             order given. Do not omit any. Do not use \"...\". Do not sample. Do not use \"- \" for any \
             other line. Count your list items before finishing.\n\n"
        ));
    }

    prompt.push_str(GROUNDING_INSTRUCTION);
    prompt
}

/// Number of top-level list items in `text`.
///
/// A top-level item is a line starting at column zero with `- `, `* `,
/// `• `, or a number followed by `. ` or `) `.
pub fn count_list_items(text: &str) -> usize {
    text.lines().filter(|line| is_list_item(line)).count()
}

fn is_list_item(line: &str) -> bool {
    if ["- ", "* ", "• "].iter().any(|m| line.starts_with(m)) {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && (line[digits..].starts_with(". ") || line[digits..].starts_with(") "))
}

/// Deterministic answer listing the rendered rows under a summary header.
pub fn fallback_answer(question: &str, rendered: &str, stats: &SummaryStats) -> String {
    format!(
        "**Answer to:** {question}\n\n\
         **Found:** {} result(s) from {} organization(s)\n\n\
         {rendered}\n\n\
         *Note: Basic formatting used - LLM analysis unavailable*",
        stats.total_results,
        stats.organizations.len(),
    )
}

/// Answer for an empty result set.
pub fn empty_answer(question: &str) -> String {
    format!(
        "No data found for your question: \"{question}\"\n\n\
         The search terms may not match available contract content, or the requested \
         information is not in the current dataset. Try rephrasing your question or using \
         broader search terms."
    )
}

// ── Reducer ──────────────────────────────────────────────────────

/// Turns rows into the final answer text.
#[derive(Clone)]
pub struct Reducer {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    config: ReducerConfig,
}

impl Reducer {
    pub fn new(synthesizer: Option<Arc<dyn Synthesizer>>, config: ReducerConfig) -> Self {
        Self { synthesizer, config }
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Reduce `rows` for `question`. Never fails.
    pub async fn reduce(&self, question: &str, intent: Intent, rows: &[Row]) -> String {
        if rows.is_empty() {
            return empty_answer(question);
        }

        let shown = &rows[..rows.len().min(self.config.max_items)];
        let mut rendered = render_rows(shown, intent);
        if rows.len() > shown.len() {
            rendered.push_str("\n\n");
            rendered.push_str(&more_marker(rows.len() - shown.len()));
        }
        let stats = SummaryStats::from_rows(rows);

        match self.synthesize(question, intent, &rendered, shown.len(), &stats).await {
            Ok(answer) if answer.trim().is_empty() => {
                tracing::warn!(intent = %intent, "Synthesizer returned empty text, using template");
                fallback_answer(question, &rendered, &stats)
            }
            Ok(answer) if intent.is_exhaustive() && count_list_items(&answer) != shown.len() => {
                tracing::warn!(
                    intent = %intent,
                    expected = shown.len(),
                    found = count_list_items(&answer),
                    "Synthesized listing is incomplete, using template"
                );
                fallback_answer(question, &rendered, &stats)
            }
            Ok(answer) => answer,
            Err(e) => {
                tracing::info!(intent = %intent, error = %e, "Synthesis unavailable, using template");
                fallback_answer(question, &rendered, &stats)
            }
        }
    }

    async fn synthesize(
        &self,
        question: &str,
        intent: Intent,
        rendered: &str,
        shown: usize,
        stats: &SummaryStats,
    ) -> Result<String> {
        let synthesizer = self
            .synthesizer
            .as_ref()
            .ok_or_else(|| QaError::SynthesisUnavailable("no synthesizer configured".to_string()))?;

        let max_tokens = if intent.is_exhaustive() {
            EXHAUSTIVE_MAX_TOKENS.max(self.config.max_tokens)
        } else {
            self.config.max_tokens
        };
        let system = system_prompt(intent);
        let user = user_prompt(question, intent, rendered, shown, stats);

        with_budget(
            Collaborator::Synthesizer,
            self.config.timeout,
            synthesizer.complete(&system, &user, max_tokens, self.config.temperature),
        )
        .await
    }
}
