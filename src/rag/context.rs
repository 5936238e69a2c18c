// Grounded prompt construction and answer generation
use std::sync::Arc;

use crate::errors::{RagError, Result};
use crate::memory::ConversationMemory;
use crate::models::{ChatModel, ChatRequest, TokenUsage};
use crate::types::{ChatMessage, Message, Passage};

/// Fixed persona; the model is told it only knows the one statute
pub const SYSTEM_PERSONA: &str = "You are a legal expert specialized ONLY in Turkish Law 6331.";

/// Reply for questions outside the corpus domain
pub const REFUSAL: &str = "Bu soru 6331 sayılı İş Sağlığı ve Güvenliği Kanunu ile ilgili değildir.";

/// Reply when the retrieved context lacks the answer
pub const NOT_FOUND: &str = "Bu bilgi kanun metninde yer almamaktadır.";

/// Separator between passages in the context block
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// Generation sampling defaults
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Builds the message list sent to the chat model
pub struct PromptBuilder;

impl PromptBuilder {
    /// Passage texts in reranked order, blank-line separated
    pub fn build_context(passages: &[Passage]) -> String {
        passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    }

    /// Rules in priority order: context only, refusal, not found, cite articles
    pub fn grounded_prompt(question: &str, context: &str) -> String {
        format!(
            "Based on the following excerpts from Law 6331, answer the question.\n\n\
             CRITICAL INSTRUCTIONS:\n\
             1. ONLY use the information provided below.\n\
             2. If the question is NOT related to Law 6331, respond: \"{refusal}\"\n\
             3. If the answer is not in the context, respond: \"{not_found}\"\n\
             4. Always cite the specific article number (Madde X). Do NOT cite page numbers.\n\
             5. Provide detailed and accurate answers.\n\n\
             Law 6331 Content:\n\
             {context}\n\n\
             Question: {question}\n\n\
             Answer (must include article number):",
            refusal = REFUSAL,
            not_found = NOT_FOUND,
            context = context,
            question = question,
        )
    }

    /// Persona, plus the running synopsis when one exists
    pub fn system_message(summary: Option<&str>) -> ChatMessage {
        match summary.filter(|s| !s.trim().is_empty()) {
            Some(summary) => ChatMessage::system(format!(
                "{}\n\nSummary of the earlier conversation:\n{}",
                SYSTEM_PERSONA, summary
            )),
            None => ChatMessage::system(SYSTEM_PERSONA),
        }
    }

    /// `[system] + prior turns + [grounded prompt]`
    ///
    /// The live question appears only inside the grounded prompt.
    pub fn build_messages(
        question: &str,
        passages: &[Passage],
        prior_turns: &[Message],
        summary: Option<&str>,
    ) -> Vec<ChatMessage> {
        let context = Self::build_context(passages);

        let mut messages = Vec::with_capacity(prior_turns.len() + 2);
        messages.push(Self::system_message(summary));
        messages.extend(prior_turns.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(Self::grounded_prompt(question, &context)));
        messages
    }
}

/// Generated answer text with usage metadata
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Calls the chat model with the grounded prompt
#[derive(Clone)]
pub struct AnswerGenerator {
    chat: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: u32,
}

impl AnswerGenerator {
    pub fn new(chat: Arc<dyn ChatModel>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            chat,
            temperature,
            max_tokens,
        }
    }

    /// Answer `question` from `passages`
    ///
    /// `history` already holds the live question as its last turn; it is
    /// left out of the prior turns.
    pub async fn generate(
        &self,
        question: &str,
        passages: &[Passage],
        history: &ConversationMemory,
    ) -> Result<GeneratedAnswer> {
        let prior = history.prior_turns();
        let messages = PromptBuilder::build_messages(question, passages, &prior, history.summary());
        tracing::debug!(
            model = self.chat.model(),
            prior_turns = prior.len(),
            passages = passages.len(),
            "Requesting answer"
        );

        let request = ChatRequest::new(messages, self.temperature, self.max_tokens);
        let completion = self.chat.complete(&request).await.map_err(|e| match e {
            RagError::Generation(_) | RagError::Timeout { .. } => e,
            other => RagError::Generation(other.to_string()),
        })?;

        Ok(GeneratedAnswer {
            text: completion.content,
            usage: completion.usage,
        })
    }
}
