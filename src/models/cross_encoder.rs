//! Cross-encoder relevance model
//!
//! BERT sequence classifier scoring (query, passage) pairs jointly:
//! encoder, then pooler (dense + tanh) on the CLS token, then a
//! single-logit classifier head. Higher logit means more relevant.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use std::path::Path;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use crate::errors::{RagError, Result};
use crate::models::hub::ModelFiles;
use crate::models::RelevanceModel;

struct ClassifierHead {
    pooler: Linear,
    classifier: Linear,
}

impl ClassifierHead {
    fn load(vb: VarBuilder, hidden_size: usize) -> candle_core::Result<Self> {
        Ok(Self {
            pooler: linear(hidden_size, hidden_size, vb.pp("bert.pooler.dense"))?,
            classifier: linear(hidden_size, 1, vb.pp("classifier"))?,
        })
    }

    /// `hidden`: (batch, seq, hidden) -> (batch,) logits
    fn forward(&self, hidden: &Tensor) -> candle_core::Result<Tensor> {
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        self.classifier.forward(&pooled)?.squeeze(1)
    }
}

/// Candle cross-encoder
#[derive(Clone)]
pub struct CrossEncoder {
    encoder: Arc<BertModel>,
    head: Arc<ClassifierHead>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    batch_size: usize,
}

impl CrossEncoder {
    /// Load the classifier; pairs longer than `max_length` tokens are truncated
    pub fn load(
        model_id: &str,
        cache_dir: Option<&Path>,
        batch_size: usize,
        max_length: usize,
    ) -> Result<Self> {
        Self::try_load(model_id, cache_dir, batch_size, max_length)
            .map_err(|e| RagError::Initialization(format!("{:#}", e)))
    }

    fn try_load(
        model_id: &str,
        cache_dir: Option<&Path>,
        batch_size: usize,
        max_length: usize,
    ) -> anyhow::Result<Self> {
        let device = Device::Cpu;
        let files = ModelFiles::resolve(model_id, cache_dir)?;

        let config_contents =
            std::fs::read_to_string(&files.config).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&config_contents).context("Failed to parse model config")?;
        let hidden_size = serde_json::from_str::<serde_json::Value>(&config_contents)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("Model config has no hidden_size"))? as usize;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let encoder = BertModel::load(vb.clone(), &config).context("Failed to create BERT encoder")?;
        let head = ClassifierHead::load(vb, hidden_size).context("Failed to load classifier head")?;

        tracing::info!(model = model_id, batch_size, "Cross-encoder loaded");

        Ok(Self {
            encoder: Arc::new(encoder),
            head: Arc::new(head),
            tokenizer: Arc::new(tokenizer),
            device,
            batch_size: batch_size.max(1),
        })
    }

    /// Score pairs in fixed-size batches (blocking)
    pub fn score_pairs(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(passages.len());
        for chunk in passages.chunks(self.batch_size) {
            scores.extend(self.score_batch(query, chunk)?);
        }
        Ok(scores)
    }

    fn score_batch(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>> {
        let pairs: Vec<(String, String)> = passages
            .iter()
            .map(|p| (query.to_string(), p.clone()))
            .collect();
        let encodings = self
            .tokenizer
            .encode_batch(pairs, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch = encodings.len();
        let mut ids = vec![0u32; batch * max_len];
        let mut types = vec![0u32; batch * max_len];
        let mut mask = vec![0u32; batch * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let start = row * max_len;
            let len = encoding.get_ids().len();
            ids[start..start + len].copy_from_slice(encoding.get_ids());
            types[start..start + len].copy_from_slice(encoding.get_type_ids());
            mask[start..start + len].copy_from_slice(encoding.get_attention_mask());
        }

        let input_ids = Tensor::from_vec(ids, (batch, max_len), &self.device)?;
        let token_type_ids = Tensor::from_vec(types, (batch, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (batch, max_len), &self.device)?;

        let hidden = self
            .encoder
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        Ok(self.head.forward(&hidden)?.to_vec1::<f32>()?)
    }
}

#[async_trait]
impl RelevanceModel for CrossEncoder {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.clone();
        let query = query.to_string();
        let passages = passages.to_vec();

        tokio::task::spawn_blocking(move || model.score_pairs(&query, &passages))
            .await
            .map_err(|e| RagError::Reranking(format!("Scoring task panicked: {}", e)))?
            .map_err(|e| RagError::Reranking(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_produces_one_logit_per_row() {
        let device = Device::Cpu;
        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let head = ClassifierHead::load(vb, 4).unwrap();

        let hidden = Tensor::zeros((3, 5, 4), DType::F32, &device).unwrap();
        let logits = head.forward(&hidden).unwrap();
        assert_eq!(logits.dims(), &[3]);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_relevant_passage_scores_higher() {
        let model = CrossEncoder::load("cross-encoder/ms-marco-MiniLM-L-12-v2", None, 16, 512).unwrap();
        let scores = model
            .score(
                "How many people live in Berlin?",
                &[
                    "Berlin has a population of 3,520,031 registered inhabitants.".to_string(),
                    "New York City is famous for the Metropolitan Museum of Art.".to_string(),
                ],
            )
            .await
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
    }
}
