// Vector store client: query embedding + ANN search
use std::sync::Arc;
use std::time::Duration;

use super::{SimilarityMetric, VectorIndex};
use crate::errors::{RagError, Result, Stage};
use crate::models::Embedder;
use crate::rag::with_deadline;
use crate::types::{CollectionStats, HealthReport, MetadataFilter, Passage, RetrievalRequest};

/// Deadlines for the two network-bound steps of a search
#[derive(Debug, Clone, Copy)]
pub struct SearchTimeouts {
    pub embedding: Duration,
    pub search: Duration,
}

impl Default for SearchTimeouts {
    fn default() -> Self {
        Self {
            embedding: Duration::from_secs(30),
            search: Duration::from_secs(30),
        }
    }
}

/// Embeds queries and searches the corpus index
#[derive(Clone)]
pub struct VectorStoreClient {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    timeouts: SearchTimeouts,
}

impl VectorStoreClient {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            timeouts: SearchTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: SearchTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Top `k` passages for `query`, descending by cosine similarity
    ///
    /// Requests `10 * k` ANN candidates internally.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        let vector = with_deadline(Stage::Embedding, self.timeouts.embedding, self.embedder.embed(query)).await?;

        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let request = RetrievalRequest::new(vector, k, filter.cloned());
        let mut passages =
            with_deadline(Stage::VectorSearch, self.timeouts.search, self.index.search(&request)).await?;

        // Stable: equal scores keep index order
        passages.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(k);

        tracing::info!(
            k,
            num_candidates = request.num_candidates,
            filtered = request.filter.is_some(),
            returned = passages.len(),
            "Vector search finished"
        );
        Ok(passages)
    }

    /// Same as [`similarity_search`](Self::similarity_search), paired with each score
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(Passage, f32)>> {
        Ok(self
            .similarity_search(query, k, filter)
            .await?
            .into_iter()
            .map(|p| {
                let score = p.score;
                (p, score)
            })
            .collect())
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats> {
        let total_documents =
            with_deadline(Stage::VectorSearch, self.timeouts.search, self.index.count()).await?;
        Ok(CollectionStats {
            total_documents,
            database_id: self.index.database_id(),
            collection_id: self.index.collection_id(),
        })
    }

    /// Read-only health probe; never fails
    pub async fn health_check(&self) -> HealthReport {
        let probe = async {
            self.index.ping().await?;
            self.index.count().await
        };
        match with_deadline(Stage::VectorSearch, self.timeouts.search, probe).await {
            Ok(count) => HealthReport::healthy(count),
            Err(e) => {
                tracing::warn!(error = %e, "Vector store health check failed");
                HealthReport::unhealthy(e.to_string())
            }
        }
    }

    /// Refuse to serve against an unreachable, empty or incompatible index
    pub async fn verify_ready(&self) -> Result<()> {
        let health = self.health_check().await;
        if !health.is_healthy() {
            return Err(RagError::Initialization(format!(
                "Vector store is not reachable: {}",
                health.error.unwrap_or_default()
            )));
        }
        if health.document_count.unwrap_or(0) == 0 {
            return Err(RagError::Initialization(format!(
                "Collection '{}' is empty; ingest documents first",
                self.index.collection_id()
            )));
        }

        let params = self
            .index
            .vector_params()
            .await
            .map_err(|e| RagError::Initialization(e.to_string()))?;
        if let Some(params) = params {
            let actual = self.embedder.dimension();
            if params.dimension != actual {
                return Err(RagError::DimensionMismatch {
                    expected: params.dimension,
                    actual,
                });
            }
            if params.metric != SimilarityMetric::Cosine {
                return Err(RagError::Initialization(format!(
                    "Collection '{}' uses {:?} distance, expected cosine",
                    self.index.collection_id(),
                    params.metric
                )));
            }
        }

        tracing::info!(
            collection = %self.index.collection_id(),
            documents = health.document_count.unwrap_or(0),
            "Vector store ready"
        );
        Ok(())
    }
}
