// Retrieval-augmented answering pipeline
//
// Components, in per-question order:
// - Expansion: enrich the question with statute terminology
// - Retrieval: embed the query and run a broad ANN search
// - Re-ranking: narrow the candidates with a cross-encoder
// - Context: grounded prompt + answer generation
// - Citation: attribution block appended to the answer
// - Pipeline: per-session orchestration over shared services

pub mod citation;
pub mod context;
pub mod expansion;
pub mod pipeline;
pub mod reranking;
pub mod retrieval;

use std::future::Future;
use std::time::Duration;

use crate::errors::{RagError, Result, Stage};

// Re-export key types
pub use citation::{CitationFormatter, CitationGroup, SourceCategory};
pub use context::{AnswerGenerator, GeneratedAnswer, PromptBuilder};
pub use expansion::QueryExpander;
pub use pipeline::{Backends, RagPipeline, RagServices};
pub use reranking::Reranker;
pub use retrieval::{InMemoryIndex, QdrantIndex, VectorIndex, VectorStoreClient};

/// Run `fut`, failing with [`RagError::Timeout`] once `limit` elapses
pub async fn with_deadline<T, F>(stage: Stage, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout {
            stage,
            duration_ms: limit.as_millis() as u64,
        }),
    }
}
