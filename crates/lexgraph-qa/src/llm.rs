//! OpenAI-compatible HTTP client.
//!
//! One client backs three collaborators: the synthesizer (chat completion),
//! the translator (chat completion asked for Cypher), and the embedder.
//! With `api_version` set, requests use the Azure deployments layout and the
//! `api-key` header; otherwise `{endpoint}/chat/completions` with a bearer token.

use std::time::Duration;

use async_trait::async_trait;
use lexgraph_core::config::LlmSettings;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{QaError, Result};
use crate::reducer::Synthesizer;
use crate::retriever::Embedder;
use crate::translator::{extract_query, Translator, TranslatorOutput};

const TRANSLATOR_SYSTEM_PROMPT: &str = "You translate questions about a legal contract graph into a single \
read-only Neo4j Cypher query. Use only the labels, relationships, and properties in the schema. \
Never write to the graph. Reply with the query only, no explanation.";

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client, or `SynthesisUnavailable` when no endpoint is configured.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if !settings.is_configured() {
            return Err(QaError::SynthesisUnavailable(
                "llm.endpoint and llm.api_key are not configured".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| QaError::SynthesisUnavailable(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            settings: settings.clone(),
        })
    }

    fn url(&self, operation: &str, deployment: &str) -> String {
        let base = self.settings.endpoint.trim_end_matches('/');
        match &self.settings.api_version {
            Some(version) => {
                format!("{base}/openai/deployments/{deployment}/{operation}?api-version={version}")
            }
            None => format!("{base}/{operation}"),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> std::result::Result<reqwest::Response, String> {
        let request = self.http.post(url).json(body);
        let request = match self.settings.api_version {
            Some(_) => request.header("api-key", &self.settings.api_key),
            None => request.bearer_auth(&self.settings.api_key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| format!("failed to reach {url}: {e}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("http error {status}: {text}"));
        }
        Ok(response)
    }

    /// One chat completion. Errors are plain messages for the caller to classify.
    async fn chat(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> std::result::Result<String, String> {
        let body = json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "max_tokens": max_tokens,
            "temperature": temperature
        });

        let url = self.url("chat/completions", &self.settings.model);
        let response = self.post(&url, &body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid completion response: {e}"))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "completion contained no message".to_string())
    }
}

#[async_trait]
impl Synthesizer for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        self.chat(system_prompt, user_prompt, max_tokens, temperature)
            .await
            .map_err(QaError::SynthesisUnavailable)
    }
}

#[async_trait]
impl Translator for OpenAiClient {
    async fn translate(&self, question: &str, schema: &str) -> Result<TranslatorOutput> {
        let user = format!("Schema:\n{schema}\n\nQuestion: {question}\n\nCypher query:");
        let text = self
            .chat(TRANSLATOR_SYSTEM_PROMPT, &user, self.settings.max_tokens, 0.0)
            .await
            .map_err(QaError::TranslatorFailure)?;

        Ok(match extract_query(&text) {
            Some(query) => TranslatorOutput::Cypher(query),
            None => TranslatorOutput::Empty,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.settings.embedding_model,
            "input": text
        });
        let url = self.url("embeddings", &self.settings.embedding_model);

        let response = self.post(&url, &body).await.map_err(QaError::SynthesisUnavailable)?;
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| QaError::SynthesisUnavailable(format!("invalid embedding response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| QaError::SynthesisUnavailable("embedding response was empty".to_string()))
    }
}
