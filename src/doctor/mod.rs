//! Doctor command for system diagnostics
//!
//! Read-only checks against the configured vector store, chat endpoint and
//! local model cache. Nothing here loads a model or mutates the index.

use colored::Colorize;
use std::sync::Arc;

use crate::config::Config;
use crate::models::hub::local_model_dir;
use crate::models::ChatClient;
use crate::rag::retrieval::{QdrantIndex, SimilarityMetric, VectorIndex};

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    config: Config,
    index: Option<Arc<dyn VectorIndex>>,
    chat: Option<ChatClient>,
}

impl Doctor {
    /// Build clients from `config`; construction failures become failed checks
    pub fn new(config: Config) -> Self {
        let index = QdrantIndex::connect(
            &config.vector_store.url,
            config.vector_store.api_key.clone(),
            &config.vector_store.collection,
            config.vector_store_timeout(),
        )
        .ok()
        .map(|index| Arc::new(index) as Arc<dyn VectorIndex>);

        let chat = ChatClient::new(
            config.chat.base_url.clone(),
            config.chat.api_key.clone(),
            config.chat.model.clone(),
            config.chat_timeout(),
        )
        .ok();

        Self { config, index, chat }
    }

    /// Doctor over an explicit index and no chat endpoint
    pub fn with_index(config: Config, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            config,
            index: Some(index),
            chat: None,
        }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = vec![self.check_config()];

        checks.push(self.check_vector_store().await);
        checks.push(self.check_collection().await);
        checks.push(self.check_vector_params().await);
        if self.chat.is_some() {
            checks.push(self.check_chat_endpoint().await);
        }
        checks.push(self.check_api_key());
        checks.push(self.check_model_cache("Embedding Model", &self.config.embedding.model));
        checks.push(self.check_model_cache("Reranker Model", &self.config.reranker.model));

        checks
    }

    fn check_config(&self) -> HealthCheck {
        match self.config.validate() {
            Ok(()) => HealthCheck::new("Configuration", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Configuration", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_vector_store(&self) -> HealthCheck {
        let Some(index) = &self.index else {
            return HealthCheck::new(
                "Vector Store",
                HealthStatus::Fail("Could not create a Qdrant client".to_string()),
            );
        };

        match index.ping().await {
            Ok(()) => HealthCheck::new("Vector Store", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Vector Store", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_collection(&self) -> HealthCheck {
        let Some(index) = &self.index else {
            return HealthCheck::new("Collection", HealthStatus::Fail("No vector store".to_string()));
        };

        match index.count().await {
            Ok(0) => HealthCheck::new(
                "Collection",
                HealthStatus::Fail(format!("'{}' is empty", index.collection_id())),
            ),
            Ok(_) => HealthCheck::new("Collection", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Collection", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_vector_params(&self) -> HealthCheck {
        let Some(index) = &self.index else {
            return HealthCheck::new("Vector Params", HealthStatus::Fail("No vector store".to_string()));
        };

        match index.vector_params().await {
            Ok(Some(params)) if params.dimension != self.config.embedding.dimension => {
                HealthCheck::new(
                    "Vector Params",
                    HealthStatus::Fail(format!(
                        "Index has {} dimensions, embedding model is configured for {}",
                        params.dimension, self.config.embedding.dimension
                    )),
                )
            }
            Ok(Some(params)) if params.metric != SimilarityMetric::Cosine => HealthCheck::new(
                "Vector Params",
                HealthStatus::Fail(format!("Index uses {:?} distance, expected cosine", params.metric)),
            ),
            Ok(Some(_)) => HealthCheck::new("Vector Params", HealthStatus::Pass),
            Ok(None) => HealthCheck::new(
                "Vector Params",
                HealthStatus::Warn("Index does not declare its vector shape".to_string()),
            ),
            Err(e) => HealthCheck::new("Vector Params", HealthStatus::Fail(e.to_string())),
        }
    }

    async fn check_chat_endpoint(&self) -> HealthCheck {
        match &self.chat {
            Some(chat) if chat.is_available().await => HealthCheck::new("Chat Endpoint", HealthStatus::Pass),
            Some(chat) => HealthCheck::new(
                "Chat Endpoint",
                HealthStatus::Fail(format!("{} is not reachable", chat.base_url())),
            ),
            None => HealthCheck::new(
                "Chat Endpoint",
                HealthStatus::Fail("Could not create an HTTP client".to_string()),
            ),
        }
    }

    fn check_api_key(&self) -> HealthCheck {
        if self.config.chat.api_key.is_some() {
            HealthCheck::new("API Key", HealthStatus::Pass)
        } else {
            HealthCheck::new(
                "API Key",
                HealthStatus::Warn("No chat API key set (OPENROUTER_API_KEY)".to_string()),
            )
        }
    }

    fn check_model_cache(&self, name: &str, repo_id: &str) -> HealthCheck {
        let cached = self
            .config
            .model_cache_dir()
            .map(|dir| local_model_dir(&dir, repo_id).is_dir())
            .unwrap_or(false);

        if cached {
            HealthCheck::new(name, HealthStatus::Pass)
        } else {
            HealthCheck::new(
                name,
                HealthStatus::Warn(format!("{} not cached; downloaded on first start", repo_id)),
            )
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n🔍 lexrag System Diagnostics\n");
        println!("{:<20} Status", "Check");
        println!("{}", "=".repeat(50));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "✅ PASS".green().to_string(),
                HealthStatus::Warn(msg) => format!("⚠️  WARN: {}", msg).yellow().to_string(),
                HealthStatus::Fail(msg) => format!("❌ FAIL: {}", msg).red().to_string(),
            };
            println!("{:<20} {}", check.name, status);
        }

        println!();
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::retrieval::InMemoryIndex;
    use crate::types::{Passage, PassageMetadata};

    fn find<'a>(checks: &'a [HealthCheck], name: &str) -> &'a HealthStatus {
        &checks.iter().find(|c| c.name == name).unwrap().status
    }

    #[test]
    fn test_overall_status_pass() {
        let checks = vec![
            HealthCheck::new("Test 1", HealthStatus::Pass),
            HealthCheck::new("Test 2", HealthStatus::Warn("warning".to_string())),
        ];
        assert!(Doctor::overall_status(&checks));
    }

    #[test]
    fn test_overall_status_fail() {
        let checks = vec![
            HealthCheck::new("Test 1", HealthStatus::Pass),
            HealthCheck::new("Test 2", HealthStatus::Fail("error".to_string())),
        ];
        assert!(!Doctor::overall_status(&checks));
    }

    #[tokio::test]
    async fn test_empty_collection_fails() {
        let doctor = Doctor::with_index(Config::default(), Arc::new(InMemoryIndex::new("documents", 384)));
        let checks = doctor.run_diagnostics().await;

        assert_eq!(find(&checks, "Vector Store"), &HealthStatus::Pass);
        assert!(matches!(find(&checks, "Collection"), HealthStatus::Fail(_)));
        assert_eq!(find(&checks, "Vector Params"), &HealthStatus::Pass);
        assert!(checks.iter().all(|c| c.name != "Chat Endpoint"));
        assert!(!Doctor::overall_status(&checks));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails() {
        let mut index = InMemoryIndex::new("documents", 3);
        index
            .insert(
                vec![1.0, 0.0, 0.0],
                Passage {
                    id: "1".to_string(),
                    text: "MADDE 1".to_string(),
                    metadata: PassageMetadata::default(),
                    score: 0.0,
                },
            )
            .unwrap();

        let doctor = Doctor::with_index(Config::default(), Arc::new(index));
        let checks = doctor.run_diagnostics().await;

        assert_eq!(find(&checks, "Collection"), &HealthStatus::Pass);
        assert!(matches!(find(&checks, "Vector Params"), HealthStatus::Fail(msg) if msg.contains("384")));
    }

    #[test]
    fn test_invalid_config_fails() {
        let mut config = Config::default();
        config.retrieval.rerank_k = 100;
        let doctor = Doctor::with_index(config, Arc::new(InMemoryIndex::new("documents", 384)));
        assert!(matches!(doctor.check_config().status, HealthStatus::Fail(_)));
    }
}
