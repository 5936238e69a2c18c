//! Error types for lexrag
//!
//! One enum covers every failure the answering pipeline can hit. Callers
//! use [`RagError::class`] to tell a degraded-but-served request apart from
//! a failed request or a process that must not start.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error or timeout is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Expansion,
    Embedding,
    VectorSearch,
    Reranking,
    Generation,
    Summarization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Expansion => "query expansion",
            Stage::Embedding => "embedding",
            Stage::VectorSearch => "vector search",
            Stage::Reranking => "reranking",
            Stage::Generation => "generation",
            Stage::Summarization => "summarization",
        };
        f.write_str(name)
    }
}

/// How far a failure propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Handled locally; the request continues with a fallback
    Recoverable,
    /// The current question fails; the process keeps serving
    RequestFatal,
    /// The pipeline must not be constructed
    StartupFatal,
}

/// Main error type for the answering pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Query expansion call failed or returned nothing usable
    #[error("Query expansion failed: {0}")]
    Expansion(String),

    /// Query embedding failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Vector store unreachable, index missing, or malformed response
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Relevance model inference failed
    #[error("Reranking failed: {0}")]
    Reranking(String),

    /// Chat completion failed
    #[error("Chat completion failed: {0}")]
    Generation(String),

    /// Conversation summarization failed
    #[error("Summarization failed: {0}")]
    Summarization(String),

    /// Startup readiness check failed
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Embedding model and index disagree on dimensionality
    #[error("Embedding dimension mismatch: index expects {expected}, model produces {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stage exceeded its deadline
    #[error("{stage} timed out after {duration_ms}ms")]
    Timeout { stage: Stage, duration_ms: u64 },

    /// Blank question text
    #[error("Question cannot be empty")]
    EmptyQuestion,

    /// Session key not registered
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

impl RagError {
    /// Classify the error per the failure taxonomy
    pub fn class(&self) -> FailureClass {
        match self {
            RagError::Expansion(_) | RagError::Summarization(_) => FailureClass::Recoverable,
            RagError::Timeout { stage, .. } => match stage {
                Stage::Expansion | Stage::Summarization => FailureClass::Recoverable,
                _ => FailureClass::RequestFatal,
            },
            RagError::Initialization(_)
            | RagError::ConfigError(_)
            | RagError::DimensionMismatch { .. } => FailureClass::StartupFatal,
            _ => FailureClass::RequestFatal,
        }
    }

    /// True when the pipeline can continue with a fallback
    pub fn is_recoverable(&self) -> bool {
        self.class() == FailureClass::Recoverable
    }

    /// Stage the error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RagError::Expansion(_) => Some(Stage::Expansion),
            RagError::Embedding(_) => Some(Stage::Embedding),
            RagError::VectorStore(_) => Some(Stage::VectorSearch),
            RagError::Reranking(_) => Some(Stage::Reranking),
            RagError::Generation(_) => Some(Stage::Generation),
            RagError::Summarization(_) => Some(Stage::Summarization),
            RagError::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(format!("{:#}", err))
    }
}
