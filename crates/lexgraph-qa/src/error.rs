//! Error types for the lexgraph-qa crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Store error: {0}")]
    Store(#[from] lexgraph_graph::StoreError),

    #[error("Translator failure: {0}")]
    TranslatorFailure(String),

    #[error("Synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    #[error("{collaborator} exceeded its {millis}ms budget")]
    Timeout { collaborator: Collaborator, millis: u64 },

    #[error("No {0} is configured")]
    NotConfigured(Collaborator),
}

/// The remote party a round trip was waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    GraphStore,
    Synthesizer,
    Translator,
    Retriever,
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GraphStore => "graph store",
            Self::Synthesizer => "synthesizer",
            Self::Translator => "translator",
            Self::Retriever => "vector retriever",
        };
        f.write_str(name)
    }
}

impl QaError {
    /// Whether the failure should route to the deterministic answer path
    /// rather than another query tier.
    pub fn is_synthesis_failure(&self) -> bool {
        matches!(
            self,
            QaError::SynthesisUnavailable(_)
                | QaError::Timeout {
                    collaborator: Collaborator::Synthesizer,
                    ..
                }
        )
    }
}

pub type Result<T> = std::result::Result<T, QaError>;

/// Run `fut` under a time budget, mapping expiry to [`QaError::Timeout`].
///
/// Dropping the returned future cancels the in-flight round trip.
pub async fn with_budget<T, F>(
    collaborator: Collaborator,
    budget: std::time::Duration,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(QaError::Timeout {
            collaborator,
            millis: budget.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_retriever_is_not_a_synthesis_failure() {
        let err = QaError::NotConfigured(Collaborator::Retriever);
        assert_eq!(err.to_string(), "No vector retriever is configured");
        assert!(!err.is_synthesis_failure());
    }
}
