//! Paged execution of a read query.
//!
//! [`RowStream`] fetches one page at a time with increasing `$skip` and
//! yields rows lazily. A short page ends the stream. So does a failed page:
//! the error is logged and whatever was already yielded stands.

use std::collections::VecDeque;
use std::time::Duration;

use lexgraph_core::Row;
use lexgraph_graph::{GraphStore, Params};
use serde_json::Value;

use crate::cypher;
use crate::optimizer::trim_statement;

/// Lazy, finite, non-restartable sequence of rows.
///
/// At most one page is in flight. Dropping the stream cancels it.
pub struct RowStream<'a> {
    store: &'a dyn GraphStore,
    query: String,
    params: Params,
    batch_size: usize,
    page_timeout: Option<Duration>,
    skip: usize,
    buffer: VecDeque<Row>,
    pages_fetched: usize,
    exhausted: bool,
}

impl<'a> RowStream<'a> {
    pub fn new(store: &'a dyn GraphStore, query: &str, params: Params, batch_size: usize) -> Self {
        Self {
            store,
            query: paginate(query),
            params,
            batch_size: batch_size.max(1),
            page_timeout: None,
            skip: 0,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Bound each page round trip. An expired page ends the stream.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = Some(timeout);
        self
    }

    /// The paginated query actually sent to the store.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Next row, fetching a new page when the buffer runs dry.
    pub async fn next(&mut self) -> Option<Row> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await;
        }
        self.buffer.pop_front()
    }

    /// Drain up to `cap` rows.
    pub async fn collect(mut self, cap: usize) -> Vec<Row> {
        let mut rows = Vec::new();
        while rows.len() < cap {
            match self.next().await {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        rows
    }

    async fn fetch_page(&mut self) {
        let mut params = self.params.clone();
        params.insert("skip".to_string(), Value::from(self.skip));
        params.insert("limit".to_string(), Value::from(self.batch_size));

        self.pages_fetched += 1;
        let round_trip = self.store.execute(&self.query, &params);
        let outcome = match self.page_timeout {
            Some(budget) => match tokio::time::timeout(budget, round_trip).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("page exceeded {}ms budget", budget.as_millis())),
            },
            None => round_trip.await.map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(result) => {
                let fetched = result.rows.len();
                if fetched < self.batch_size {
                    self.exhausted = true;
                }
                self.skip += fetched;
                self.buffer.extend(result.rows);
                tracing::trace!(page = self.pages_fetched, rows = fetched, "Fetched page");
            }
            Err(error) => {
                tracing::warn!(skip = self.skip, error = %error, "Streaming query ended early");
                self.exhausted = true;
            }
        }
    }
}

/// Bind `$skip`/`$limit` into `query`.
///
/// A query already using both is left alone; one without any `SKIP`/`LIMIT`
/// gets them appended; anything else is wrapped in a subquery so its own
/// bounds still apply before paging.
pub fn paginate(query: &str) -> String {
    if uses_param(query, "skip") && uses_param(query, "limit") {
        return query.to_string();
    }

    let tokens = cypher::tokenize(query);
    let body = trim_statement(query);
    if !cypher::contains(&tokens, "SKIP") && !cypher::contains(&tokens, "LIMIT") {
        format!("{body}\nSKIP $skip LIMIT $limit")
    } else {
        format!("CALL {{\n{body}\n}}\nRETURN * SKIP $skip LIMIT $limit")
    }
}

fn uses_param(query: &str, name: &str) -> bool {
    let needle = format!("${name}");
    query.match_indices(&needle).any(|(idx, _)| {
        query[idx + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}
