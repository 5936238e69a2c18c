// Embedding Engine - sentence embeddings via a candle BERT encoder
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use std::path::Path;
use std::sync::Arc;
use tokenizers::{Tokenizer, TruncationParams};

use crate::errors::{RagError, Result};
use crate::models::hub::ModelFiles;
use crate::models::Embedder;

/// Token limit of the MiniLM encoders
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Embedding engine using a BERT-family sentence encoder via Candle
///
/// Cloning is cheap; the model and tokenizer are shared.
#[derive(Clone)]
pub struct EmbeddingEngine {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    device: Device,
    dimension: usize,
    model_id: String,
}

impl EmbeddingEngine {
    /// Load the encoder (downloads model on first use unless a local copy exists)
    pub fn load(model_id: &str, cache_dir: Option<&Path>) -> Result<Self> {
        Self::try_load(model_id, cache_dir)
            .map_err(|e| RagError::Initialization(format!("{:#}", e)))
    }

    fn try_load(model_id: &str, cache_dir: Option<&Path>) -> anyhow::Result<Self> {
        let device = Device::Cpu;
        let files = ModelFiles::resolve(model_id, cache_dir)?;

        let config_contents =
            std::fs::read_to_string(&files.config).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&config_contents).context("Failed to parse model config")?;
        let dimension = hidden_size(&config_contents)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to create BERT model")?;

        tracing::info!(model = model_id, dimension, "Embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            device,
            dimension,
            model_id: model_id.to_string(),
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Generate embeddings for multiple texts (blocking)
    pub fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = encodings.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let start = row * max_len;
            flat_ids[start..start + ids.len()].copy_from_slice(ids);
            flat_mask[start..start + mask.len()].copy_from_slice(mask);
        }

        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool(&hidden, &attention_mask)?;

        Ok(pooled.to_vec2::<f32>()?)
    }
}

#[async_trait]
impl Embedder for EmbeddingEngine {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let engine = self.clone();
        let text = text.to_string();

        let mut vectors = tokio::task::spawn_blocking(move || engine.embed_batch(&[text.as_str()]))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task panicked: {}", e)))?
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        vectors
            .pop()
            .ok_or_else(|| RagError::Embedding("Encoder returned no vector".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mean pooling with attention mask
fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask_expanded = attention_mask
        .unsqueeze(2)?
        .expand(embeddings.shape())?
        .to_dtype(embeddings.dtype())?;

    let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
    let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

    sum_embeddings.broadcast_div(&sum_mask)
}

/// `hidden_size` from a raw BERT config
fn hidden_size(config_json: &str) -> anyhow::Result<usize> {
    let value: serde_json::Value = serde_json::from_str(config_json)?;
    value
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("Model config has no hidden_size"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

    #[test]
    fn test_hidden_size_from_config() {
        assert_eq!(hidden_size(r#"{"hidden_size": 384, "model_type": "bert"}"#).unwrap(), 384);
        assert!(hidden_size(r#"{"model_type": "bert"}"#).is_err());
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        let device = Device::Cpu;
        // batch 1, seq 3, hidden 2; last token is padding
        let hidden = Tensor::new(&[[[1f32, 2.], [3., 4.], [100., 100.]]], &device).unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &device).unwrap();

        let pooled = mean_pool(&hidden, &mask).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled, vec![vec![2.0, 3.0]]);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embedding_dimension() {
        let engine = EmbeddingEngine::load(MODEL, None).expect("Failed to create engine");
        assert_eq!(engine.dimension(), 384);

        let vector = engine.embed("İşverenin genel yükümlülükleri").await.unwrap();
        assert_eq!(vector.len(), 384);
    }

    #[test]
    #[ignore] // Integration test - requires model download
    fn test_embed_batch() {
        let engine = EmbeddingEngine::load(MODEL, None).expect("Failed to create engine");
        let embeddings = engine.embed_batch(&["Madde 4", "Madde 26", "risk"]).unwrap();
        assert_eq!(embeddings.len(), 3);
        assert!(embeddings.iter().all(|e| e.len() == 384));
    }
}
