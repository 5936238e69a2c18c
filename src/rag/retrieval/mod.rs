// Retrieval: vector index backends and the query-side client
pub mod engine;
pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::types::{Passage, RetrievalRequest};

pub use engine::VectorStoreClient;
pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// Distance function an index was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

/// Vector shape declared by an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexVectorParams {
    pub dimension: usize,
    pub metric: SimilarityMetric,
}

/// Approximate-nearest-neighbor index holding the embedded corpus
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `request.limit` passages, best first, `score` set to similarity
    async fn search(&self, request: &RetrievalRequest) -> Result<Vec<Passage>>;

    /// Number of indexed passages
    async fn count(&self) -> Result<u64>;

    /// Fails when the backing service cannot be reached
    async fn ping(&self) -> Result<()>;

    /// Vector shape, when the backend reports one
    async fn vector_params(&self) -> Result<Option<IndexVectorParams>>;

    fn database_id(&self) -> String;

    fn collection_id(&self) -> String;
}
