// In-process brute-force index (small corpora, tests)
use async_trait::async_trait;

use super::{IndexVectorParams, SimilarityMetric, VectorIndex};
use crate::errors::{RagError, Result};
use crate::types::{Passage, RetrievalRequest};

/// Exact cosine search over vectors held in memory
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    name: String,
    dimension: usize,
    entries: Vec<(Vec<f32>, Passage)>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            entries: Vec::new(),
        }
    }

    /// Add one passage with its embedding
    pub fn insert(&mut self, vector: Vec<f32>, passage: Passage) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.entries.push((vector, passage));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, request: &RetrievalRequest) -> Result<Vec<Passage>> {
        if request.query_vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: request.query_vector.len(),
            });
        }

        let mut hits: Vec<Passage> = self
            .entries
            .iter()
            .filter(|(_, passage)| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&passage.metadata))
            })
            .map(|(vector, passage)| {
                let mut hit = passage.clone();
                hit.score = cosine_similarity(&request.query_vector, vector);
                hit
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn vector_params(&self) -> Result<Option<IndexVectorParams>> {
        Ok(Some(IndexVectorParams {
            dimension: self.dimension,
            metric: SimilarityMetric::Cosine,
        }))
    }

    fn database_id(&self) -> String {
        "memory".to_string()
    }

    fn collection_id(&self) -> String {
        self.name.clone()
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
