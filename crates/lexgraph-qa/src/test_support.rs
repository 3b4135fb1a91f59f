//! Scripted collaborators for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lexgraph_core::Row;
use lexgraph_graph::{GraphStore, Params, QueryResult, StoreError};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{QaError, Result};
use crate::reducer::Synthesizer;
use crate::translator::{Translator, TranslatorOutput};

pub fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

/// Answers each query with the rows of the first rule whose needle the
/// query contains, or no rows. Records every query and its parameters.
#[derive(Default)]
pub struct ScriptedStore {
    rules: Vec<(String, Vec<Row>)>,
    fail: bool,
    seen: Mutex<Vec<(String, Params)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, rows: Vec<Row>) -> Self {
        self.rules.push((needle.to_string(), rows));
        self
    }

    /// Every query fails with a connection error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.seen.lock().iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn params(&self) -> Vec<Params> {
        self.seen.lock().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn execute(&self, cypher: &str, params: &Params) -> std::result::Result<QueryResult, StoreError> {
        self.seen.lock().push((cypher.to_string(), params.clone()));
        if self.fail {
            return Err(StoreError::Connection("connection refused".to_string()));
        }
        let rows = self
            .rules
            .iter()
            .find(|(needle, _)| cypher.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        Ok(QueryResult::from_rows(rows))
    }
}

pub struct StubTranslator {
    reply: std::result::Result<TranslatorOutput, String>,
    calls: AtomicUsize,
}

impl StubTranslator {
    pub fn replying(output: TranslatorOutput) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(output),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err("model unavailable".to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for StubTranslator {
    async fn translate(&self, _question: &str, _schema: &str) -> Result<TranslatorOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(QaError::TranslatorFailure)
    }
}

pub struct StubSynthesizer {
    reply: String,
}

impl StubSynthesizer {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: text.to_string(),
        })
    }
}

#[async_trait]
impl Synthesizer for StubSynthesizer {
    async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        Ok(self.reply.clone())
    }
}
