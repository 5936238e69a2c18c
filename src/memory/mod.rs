//! Conversation memory
//!
//! Components:
//! - Conversation: sliding-window log of user/assistant turns
//! - Summary: condenses evicted turns when the summarize strategy is active

pub mod conversation;
pub mod summary;

pub use conversation::{ConversationMemory, MemoryCheckpoint, MemoryStrategy, DEFAULT_MAX_HISTORY};
pub use summary::ConversationSummarizer;
