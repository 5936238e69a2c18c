//! Model-backed services
//!
//! The pipeline only sees the three traits below; concrete backends are:
//! - [`EmbeddingEngine`]: candle BERT sentence encoder
//! - [`CrossEncoder`]: candle BERT sequence classifier
//! - [`ChatClient`]: OpenAI-compatible HTTP chat completions

pub mod client;
pub mod cross_encoder;
pub mod embedding;
pub mod hub;
pub mod types;

use async_trait::async_trait;

use crate::errors::Result;

pub use client::ChatClient;
pub use cross_encoder::CrossEncoder;
pub use embedding::EmbeddingEngine;
pub use hub::ModelFiles;
pub use types::{ChatCompletion, ChatRequest, TokenUsage};

/// Maps text into the vector space of the indexed corpus
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector `embed` returns
    fn dimension(&self) -> usize;
}

/// Scores (query, passage) pairs; one score per passage, same order
#[async_trait]
pub trait RelevanceModel: Send + Sync {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Chat-completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Model identifier, for logs
    fn model(&self) -> &str;
}
