//! Bounded conversation memory
//!
//! Ordered log of user/assistant turns with a sliding-window cap:
//! - `len() <= max_history` after every public call returns
//! - eviction drops from the head (oldest first)
//! - every append triggers its own eviction check
//!
//! Under [`MemoryStrategy::Summarize`] evicted turns are parked until the
//! caller folds them into the running synopsis. The parked backlog is capped
//! at `max_history` too; the oldest parked turns are dropped first.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::errors::RagError;
use crate::types::{MemoryStats, Message, Role};

/// Default cap: 5 questions + 5 answers
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// What happens to turns pushed out of the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    /// Evicted turns are dropped
    #[default]
    SlidingWindow,
    /// Evicted turns are condensed into a synopsis
    Summarize,
}

impl MemoryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStrategy::SlidingWindow => "sliding_window",
            MemoryStrategy::Summarize => "summarize",
        }
    }
}

impl fmt::Display for MemoryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sliding_window" | "sliding-window" => Ok(MemoryStrategy::SlidingWindow),
            "summarize" | "summarise" => Ok(MemoryStrategy::Summarize),
            other => Err(RagError::ConfigError(format!(
                "Unknown memory strategy '{}' (expected sliding_window or summarize)",
                other
            ))),
        }
    }
}

/// Saved memory state, used to undo a turn that never got an answer
#[derive(Debug, Clone)]
pub struct MemoryCheckpoint {
    messages: VecDeque<Message>,
    summary: Option<String>,
    pending: Vec<Message>,
}

/// Sliding-window conversation memory owned by one pipeline
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    messages: VecDeque<Message>,
    max_history: usize,
    strategy: MemoryStrategy,
    /// Synopsis of turns that left the window (summarize strategy only)
    summary: Option<String>,
    /// Evicted turns not yet folded into `summary`
    pending: Vec<Message>,
}

impl ConversationMemory {
    /// Create memory with the default cap and sliding-window strategy
    pub fn new() -> Self {
        Self::with_strategy(DEFAULT_MAX_HISTORY, MemoryStrategy::SlidingWindow)
    }

    /// Create memory with custom cap and strategy
    pub fn with_strategy(max_history: usize, strategy: MemoryStrategy) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_history + 1),
            max_history,
            strategy,
            summary: None,
            pending: Vec::new(),
        }
    }

    /// Append a turn, then run the eviction check
    ///
    /// # Complexity
    /// O(1) amortized push, O(evicted) eviction
    pub fn append(&mut self, message: Message) -> usize {
        self.messages.push_back(message);
        self.evict()
    }

    /// Drop head messages until the window fits. Returns how many left.
    pub fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.messages.len() > self.max_history {
            if let Some(oldest) = self.messages.pop_front() {
                if self.strategy == MemoryStrategy::Summarize {
                    self.pending.push(oldest);
                }
                evicted += 1;
            }
        }
        self.trim_pending();
        if evicted > 0 {
            tracing::debug!(
                evicted,
                retained = self.messages.len(),
                strategy = %self.strategy,
                "Conversation window shifted"
            );
        }
        evicted
    }

    /// Empty the conversation unconditionally
    pub fn reset(&mut self) {
        self.messages.clear();
        self.summary = None;
        self.pending.clear();
    }

    pub fn stats(&self) -> MemoryStats {
        let memory_usage_percent = if self.max_history > 0 {
            self.messages.len() as f64 / self.max_history as f64 * 100.0
        } else {
            0.0
        };

        MemoryStats {
            total_messages: self.messages.len(),
            max_allowed: self.max_history,
            memory_strategy: self.strategy,
            memory_usage_percent,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn strategy(&self) -> MemoryStrategy {
        self.strategy
    }

    pub fn messages(&self) -> &VecDeque<Message> {
        &self.messages
    }

    /// Turns in chronological order
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Every turn except a trailing user question (the live one)
    pub fn prior_turns(&self) -> Vec<Message> {
        let end = match self.messages.back() {
            Some(last) if last.role() == Role::User => self.messages.len() - 1,
            _ => self.messages.len(),
        };
        self.messages.range(..end).cloned().collect()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn set_summary(&mut self, summary: String) {
        self.summary = Some(summary);
    }

    pub fn has_pending_summary(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take evicted turns awaiting summarization
    pub fn take_pending(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.pending)
    }

    /// Put turns back when summarization could not run; oldest stay first
    pub fn restore_pending(&mut self, mut turns: Vec<Message>) {
        turns.append(&mut self.pending);
        self.pending = turns;
        self.trim_pending();
    }

    /// Keep at most `max_history` parked turns, dropping the oldest
    fn trim_pending(&mut self) {
        let excess = self.pending.len().saturating_sub(self.max_history);
        if excess > 0 {
            self.pending.drain(..excess);
            tracing::warn!(
                dropped = excess,
                retained = self.pending.len(),
                "Summary backlog full, dropping oldest turns"
            );
        }
    }

    pub fn checkpoint(&self) -> MemoryCheckpoint {
        MemoryCheckpoint {
            messages: self.messages.clone(),
            summary: self.summary.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: MemoryCheckpoint) {
        self.messages = checkpoint.messages;
        self.summary = checkpoint.summary;
        self.pending = checkpoint.pending;
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(memory: &mut ConversationMemory, n: usize) {
        memory.append(Message::user(format!("q{}", n)));
        memory.append(Message::assistant(format!("a{}", n)));
    }

    #[test]
    fn test_sliding_window_keeps_most_recent() {
        let mut memory = ConversationMemory::with_strategy(3, MemoryStrategy::SlidingWindow);

        for i in 0..5 {
            memory.append(Message::user(format!("m{}", i)));
            assert!(memory.len() <= 3);
        }

        let contents: Vec<&str> = memory.messages().iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_seven_pairs_leave_last_five_pairs() {
        let mut memory = ConversationMemory::with_strategy(10, MemoryStrategy::SlidingWindow);
        for n in 1..=7 {
            exchange(&mut memory, n);
        }

        assert_eq!(memory.len(), 10);
        assert_eq!(memory.messages()[0].content(), "q3");
        assert_eq!(memory.messages()[0].role(), Role::User);
        assert_eq!(memory.messages()[9].content(), "a7");
    }

    #[test]
    fn test_append_reports_evictions() {
        let mut memory = ConversationMemory::with_strategy(2, MemoryStrategy::SlidingWindow);
        assert_eq!(memory.append(Message::user("a")), 0);
        assert_eq!(memory.append(Message::user("b")), 0);
        assert_eq!(memory.append(Message::user("c")), 1);
    }

    #[test]
    fn test_reset_empties_everything() {
        let mut memory = ConversationMemory::with_strategy(4, MemoryStrategy::Summarize);
        for n in 0..5 {
            exchange(&mut memory, n);
        }
        memory.set_summary("özet".to_string());

        memory.reset();
        assert!(memory.is_empty());
        assert!(memory.summary().is_none());
        assert!(!memory.has_pending_summary());
    }

    #[test]
    fn test_stats() {
        let mut memory = ConversationMemory::with_strategy(10, MemoryStrategy::SlidingWindow);
        for n in 0..3 {
            exchange(&mut memory, n);
        }

        let stats = memory.stats();
        assert_eq!(stats.total_messages, 6);
        assert_eq!(stats.max_allowed, 10);
        assert_eq!(stats.memory_strategy, MemoryStrategy::SlidingWindow);
        assert!((stats.memory_usage_percent - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_capacity_reports_zero_usage() {
        let mut memory = ConversationMemory::with_strategy(0, MemoryStrategy::SlidingWindow);
        memory.append(Message::user("dropped"));
        assert!(memory.is_empty());
        assert_eq!(memory.stats().memory_usage_percent, 0.0);
    }

    #[test]
    fn test_prior_turns_excludes_live_question() {
        let mut memory = ConversationMemory::new();
        exchange(&mut memory, 1);
        memory.append(Message::user("live"));

        let prior = memory.prior_turns();
        assert_eq!(prior.len(), 2);
        assert_eq!(prior[1].content(), "a1");

        memory.append(Message::assistant("answer"));
        assert_eq!(memory.prior_turns().len(), 4);
    }

    #[test]
    fn test_summarize_parks_evicted_turns() {
        let mut memory = ConversationMemory::with_strategy(2, MemoryStrategy::Summarize);
        exchange(&mut memory, 1);
        exchange(&mut memory, 2);

        assert_eq!(memory.len(), 2);
        let pending = memory.take_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].content(), "q1");
        assert!(!memory.has_pending_summary());
    }

    #[test]
    fn test_sliding_window_discards_evicted_turns() {
        let mut memory = ConversationMemory::with_strategy(2, MemoryStrategy::SlidingWindow);
        exchange(&mut memory, 1);
        exchange(&mut memory, 2);
        assert!(!memory.has_pending_summary());
    }

    #[test]
    fn test_restore_pending_keeps_order() {
        let mut memory = ConversationMemory::with_strategy(2, MemoryStrategy::Summarize);
        for text in ["a", "b", "c"] {
            memory.append(Message::user(text));
        }
        let first = memory.take_pending();
        memory.append(Message::user("d"));

        memory.restore_pending(first);
        let all = memory.take_pending();
        let contents: Vec<&str> = all.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[test]
    fn test_pending_backlog_is_capped() {
        let mut memory = ConversationMemory::with_strategy(4, MemoryStrategy::Summarize);
        for n in 1..=20 {
            exchange(&mut memory, n);
            let unsummarized = memory.take_pending();
            memory.restore_pending(unsummarized);
            assert!(memory.pending_len() <= 4);
        }

        let backlog = memory.take_pending();
        let contents: Vec<&str> = backlog.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["q17", "a17", "q18", "a18"]);
    }

    #[test]
    fn test_checkpoint_restore() {
        let mut memory = ConversationMemory::with_strategy(2, MemoryStrategy::SlidingWindow);
        exchange(&mut memory, 1);
        let checkpoint = memory.checkpoint();

        memory.append(Message::user("orphan"));
        assert_eq!(memory.messages()[0].content(), "a1");

        memory.restore(checkpoint);
        assert_eq!(memory.to_vec(), vec![Message::user("q1"), Message::assistant("a1")]);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "sliding_window".parse::<MemoryStrategy>().unwrap(),
            MemoryStrategy::SlidingWindow
        );
        assert_eq!(
            "SUMMARIZE".parse::<MemoryStrategy>().unwrap(),
            MemoryStrategy::Summarize
        );
        assert!("fifo".parse::<MemoryStrategy>().is_err());
    }
}
