//! Query expansion
//!
//! One chat call appends legal terminology and synonyms to the question
//! so the vector search has more to match on. Never fatal: any failure
//! yields the original question.

use std::sync::Arc;

use crate::errors::{RagError, Result};
use crate::models::{ChatModel, ChatRequest};

/// Expansion sampling defaults
pub const DEFAULT_EXPANSION_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_EXPANSION_MAX_TOKENS: u32 = 100;

/// Rewrites a question into a richer search query
#[derive(Clone)]
pub struct QueryExpander {
    chat: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: u32,
    enabled: bool,
}

impl QueryExpander {
    pub fn new(chat: Arc<dyn ChatModel>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            chat,
            temperature,
            max_tokens,
            enabled: true,
        }
    }

    /// Turn expansion off; `expand` then returns its input unchanged
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn build_prompt(question: &str) -> String {
        format!(
            "Sen uzman bir hukuk asistanısın. Görevin, kullanıcının sorusunu arama motorunda \
             daha iyi sonuç verecek şekilde hukuki terimler ve eş anlamlılarla genişletmektir.\n\n\
             Kurallar:\n\
             1. Soruyu cevaplama, sadece anahtar kelimeler ekle.\n\
             2. Türkçe karakterlere dikkat et.\n\
             3. Eğer soru 'yaptırım', 'ceza' içeriyorsa: \"idari para cezası\", \"hapis cezası\", \
             \"yaptırımlar\", \"madde 26\" terimlerini ekle.\n\n\
             Soru: \"{}\"\n\
             Genişletilmiş:",
            question
        )
    }

    /// Expansion that reports failure instead of falling back
    pub async fn try_expand(&self, question: &str) -> Result<String> {
        let request = ChatRequest::single(Self::build_prompt(question), self.temperature, self.max_tokens);
        let completion = self
            .chat
            .complete(&request)
            .await
            .map_err(|e| RagError::Expansion(e.to_string()))?;

        let expanded = completion.content.trim();
        if expanded.is_empty() {
            return Err(RagError::Expansion("Model returned an empty expansion".to_string()));
        }
        Ok(expanded.to_string())
    }

    /// Expanded query, or `question` itself on any failure
    pub async fn expand(&self, question: &str) -> String {
        if !self.enabled {
            return question.to_string();
        }

        match self.try_expand(question).await {
            Ok(expanded) => {
                tracing::debug!(expanded = %expanded, "Query expanded");
                expanded
            }
            Err(e) => {
                tracing::warn!(error = %e, "Expansion failed, using original query");
                question.to_string()
            }
        }
    }
}
