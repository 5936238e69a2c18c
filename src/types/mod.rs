//! Type definitions module
//!
//! Conversation turns, retrieved passages and caller-facing payloads.

pub mod messages;
pub mod passage;
pub mod response;

// Re-export commonly used types
pub use messages::{ChatMessage, ChatRole, Message, Role};
pub use passage::{MetadataFilter, Passage, PassageMetadata, RankedPassage, RetrievalRequest};
pub use response::{
    AnswerPayload, AnswerStatus, CollectionStats, HealthReport, HealthStatus, MemoryStats, APOLOGY,
};
