//! lexrag - retrieval-augmented question answering over a legal corpus
//!
//! Answers questions about Turkish Occupational Health and Safety Law 6331
//! by grounding a chat model in passages from a pre-built vector index.
//!
//! # Architecture
//!
//! - **Retrieval**: query expansion, broad ANN search, cross-encoder rerank
//! - **Memory**: bounded per-session conversation (sliding window or summary)
//! - **Answering**: grounded prompt, chat completion, citation block
//! - **Interface**: CLI, REPL and diagnostics

pub mod errors;
pub mod types;

// Re-export commonly used types
pub use errors::{RagError, Result};

pub mod cli;
pub mod config;
pub mod doctor;
pub mod memory;
pub mod models;
pub mod rag;
pub mod repl;
pub mod session;
pub mod telemetry;
