//! Conversation summarization for the `summarize` memory strategy
//!
//! Turns pushed out of the window are folded into a running synopsis
//! with one chat call. A failed call keeps the previous synopsis and
//! leaves the turns parked for the next attempt.

use std::sync::Arc;

use crate::errors::{RagError, Result};
use crate::memory::ConversationMemory;
use crate::models::{ChatModel, ChatRequest};
use crate::types::{Message, Role};

const SUMMARY_TEMPERATURE: f32 = 0.2;

/// Condenses evicted turns with the chat model
#[derive(Clone)]
pub struct ConversationSummarizer {
    chat: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl ConversationSummarizer {
    pub fn new(chat: Arc<dyn ChatModel>, max_tokens: u32) -> Self {
        Self { chat, max_tokens }
    }

    pub fn build_prompt(previous: Option<&str>, turns: &[Message]) -> String {
        let mut prompt = String::from(
            "Aşağıdaki konuşmayı kısa ve öz bir şekilde özetle. \
             Kullanıcının sorduğu konuları ve cevaplarda geçen madde numaralarını koru.\n\n",
        );

        if let Some(previous) = previous.filter(|s| !s.trim().is_empty()) {
            prompt.push_str("Önceki özet:\n");
            prompt.push_str(previous.trim());
            prompt.push_str("\n\n");
        }

        prompt.push_str("Konuşma:\n");
        for turn in turns {
            let speaker = match turn.role() {
                Role::User => "Kullanıcı",
                Role::Assistant => "Asistan",
            };
            prompt.push_str(speaker);
            prompt.push_str(": ");
            prompt.push_str(turn.content().trim());
            prompt.push('\n');
        }
        prompt.push_str("\nÖzet:");
        prompt
    }

    /// Merge `turns` into `previous`
    pub async fn summarize(&self, previous: Option<&str>, turns: &[Message]) -> Result<String> {
        let request = ChatRequest::single(
            Self::build_prompt(previous, turns),
            SUMMARY_TEMPERATURE,
            self.max_tokens,
        );

        let completion = self
            .chat
            .complete(&request)
            .await
            .map_err(|e| RagError::Summarization(e.to_string()))?;

        let summary = completion.content.trim().to_string();
        if summary.is_empty() {
            return Err(RagError::Summarization("Model returned an empty summary".to_string()));
        }
        Ok(summary)
    }

    /// Fold parked turns into the memory's synopsis. Returns true when updated.
    pub async fn refresh(&self, memory: &mut ConversationMemory) -> bool {
        if !memory.has_pending_summary() {
            return false;
        }

        let turns = memory.take_pending();
        let previous = memory.summary().map(str::to_string);
        match self.summarize(previous.as_deref(), &turns).await {
            Ok(summary) => {
                tracing::debug!(folded = turns.len(), "Conversation summary updated");
                memory.set_summary(summary);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Keeping previous conversation summary");
                memory.restore_pending(turns);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStrategy;
    use crate::models::ChatCompletion;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingChat {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            match &self.reply {
                Some(text) => Ok(ChatCompletion::new(text.clone())),
                None => Err(RagError::Generation("503".to_string())),
            }
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    fn chat(reply: Option<&str>) -> Arc<RecordingChat> {
        Arc::new(RecordingChat {
            reply: reply.map(str::to_string),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn memory_with_evictions() -> ConversationMemory {
        let mut memory = ConversationMemory::with_strategy(2, MemoryStrategy::Summarize);
        memory.append(Message::user("Risk değerlendirmesi kim yapar?"));
        memory.append(Message::assistant("Madde 10 uyarınca işveren."));
        memory.append(Message::user("Ceza nedir?"));
        memory.append(Message::assistant("Madde 26."));
        memory
    }

    #[test]
    fn test_prompt_includes_previous_summary_and_turns() {
        let prompt = ConversationSummarizer::build_prompt(
            Some("Önceki konu: Madde 4"),
            &[Message::user("soru"), Message::assistant("cevap")],
        );
        assert!(prompt.contains("Önceki özet:\nÖnceki konu: Madde 4"));
        assert!(prompt.contains("Kullanıcı: soru\nAsistan: cevap\n"));
        assert!(prompt.ends_with("Özet:"));
    }

    #[tokio::test]
    async fn test_refresh_sets_summary() {
        let backend = chat(Some("  İşveren yükümlülükleri (Madde 10) konuşuldu. "));
        let summarizer = ConversationSummarizer::new(backend.clone(), 256);
        let mut memory = memory_with_evictions();

        assert!(summarizer.refresh(&mut memory).await);
        assert_eq!(memory.summary(), Some("İşveren yükümlülükleri (Madde 10) konuşuldu."));
        assert!(!memory.has_pending_summary());
        assert!(backend.prompts.lock().unwrap()[0].contains("Madde 10 uyarınca işveren."));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_summary() {
        let summarizer = ConversationSummarizer::new(chat(None), 256);
        let mut memory = memory_with_evictions();
        memory.set_summary("eski özet".to_string());

        assert!(!summarizer.refresh(&mut memory).await);
        assert_eq!(memory.summary(), Some("eski özet"));
        assert!(memory.has_pending_summary());
    }

    #[tokio::test]
    async fn test_repeated_blank_summaries_keep_backlog_bounded() {
        let backend = chat(Some("   "));
        let summarizer = ConversationSummarizer::new(backend.clone(), 256);
        let mut memory = ConversationMemory::with_strategy(10, MemoryStrategy::Summarize);

        for n in 0..200 {
            memory.append(Message::user(format!("soru {}", n)));
            assert!(!summarizer.refresh(&mut memory).await);
            memory.append(Message::assistant(format!("cevap {}", n)));
            assert!(memory.len() <= 10);
            assert!(memory.pending_len() <= 10);
        }

        assert!(memory.summary().is_none());
        let last_prompt = backend.prompts.lock().unwrap().pop().unwrap();
        assert!(!last_prompt.contains("soru 0\n"));
    }

    #[tokio::test]
    async fn test_nothing_pending_skips_call() {
        let backend = chat(Some("özet"));
        let summarizer = ConversationSummarizer::new(backend.clone(), 256);
        let mut memory = ConversationMemory::with_strategy(10, MemoryStrategy::Summarize);

        assert!(!summarizer.refresh(&mut memory).await);
        assert!(backend.prompts.lock().unwrap().is_empty());
    }
}
