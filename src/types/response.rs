//! Payloads exposed to callers (CLI, or any outer transport)

use serde::{Deserialize, Serialize};

use crate::errors::RagError;
use crate::memory::MemoryStrategy;

/// Fixed apology shown for any unrecoverable failure
pub const APOLOGY: &str = "Üzgünüm, bir hata oluştu.";

/// Outcome of one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Success,
    Error,
}

/// Answer payload: model completion followed by the citation block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: String,
    pub status: AnswerStatus,
}

impl AnswerPayload {
    pub fn success(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            status: AnswerStatus::Success,
        }
    }

    /// Generic failure; the error itself is never exposed
    pub fn failure() -> Self {
        Self {
            answer: APOLOGY.to_string(),
            status: AnswerStatus::Error,
        }
    }

    pub fn from_result(result: Result<String, RagError>) -> Self {
        match result {
            Ok(answer) => Self::success(answer),
            Err(_) => Self::failure(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AnswerStatus::Success
    }
}

/// Conversation memory statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_messages: usize,
    pub max_allowed: usize,
    pub memory_strategy: MemoryStrategy,
    pub memory_usage_percent: f64,
}

/// Vector collection statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_documents: u64,
    pub database_id: String,
    pub collection_id: String,
}

/// Vector store health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Read-only health report for the vector store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub connectivity: String,
    pub document_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn healthy(document_count: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            connectivity: "connected".to_string(),
            document_count: Some(document_count),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            connectivity: "unreachable".to_string(),
            document_count: None,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
