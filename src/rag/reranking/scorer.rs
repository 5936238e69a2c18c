// Reranker: precision ordering of retrieval candidates by a relevance model
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{RagError, Result, Stage};
use crate::models::RelevanceModel;
use crate::rag::with_deadline;
use crate::types::{Passage, RankedPassage};

/// Default rerank depth
pub const DEFAULT_TOP_K: usize = 15;

/// Reorders candidates by cross-encoder relevance, independent of vector score
#[derive(Clone)]
pub struct Reranker {
    model: Arc<dyn RelevanceModel>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(model: Arc<dyn RelevanceModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Highest-scoring `min(top_k, passages.len())` passages, best first
    ///
    /// Every returned passage comes from `passages`; ties keep retrieval order.
    pub async fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
        top_k: usize,
    ) -> Result<Vec<RankedPassage>> {
        if passages.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let scores = with_deadline(Stage::Reranking, self.timeout, self.model.score(query, &texts)).await?;

        if scores.len() != passages.len() {
            return Err(RagError::Reranking(format!(
                "Relevance model returned {} scores for {} passages",
                scores.len(),
                passages.len()
            )));
        }

        let candidates = passages.len();
        let ranked = select_top(passages, scores, top_k);
        tracing::debug!(candidates, kept = ranked.len(), "Reranking finished");
        Ok(ranked)
    }
}

/// Attach scores, sort descending (NaN last), keep `top_k`
pub fn select_top(passages: Vec<Passage>, scores: Vec<f32>, top_k: usize) -> Vec<RankedPassage> {
    let mut ranked: Vec<RankedPassage> = passages
        .into_iter()
        .zip(scores)
        .map(|(passage, relevance)| RankedPassage {
            passage,
            relevance: if relevance.is_nan() {
                f32::NEG_INFINITY
            } else {
                relevance
            },
        })
        .collect();

    // Sort by relevance descending
    ranked.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_k);
    ranked
}
